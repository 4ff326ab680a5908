mod cli;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;

use teamhub::config::Config;
use teamhub::domains::{self, cart, preferences, profile, tasks, AppState};
use teamhub::logging::init_tracing;
use teamhub::persistence::{KeyValueStore, PersistenceMirror};
use teamhub::{Action, Dispatched, Store};

use cli::{CartCommand, Cli, Command, ProfileCommand, TasksCommand, ThemeCommand};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    let filter = if cli.verbose { "debug" } else { config.logging.filter.as_str() };
    init_tracing(filter);

    let storage: Arc<dyn KeyValueStore> = Arc::new(config.storage());
    let store = domains::open(storage.as_ref())?;
    let mirror = PersistenceMirror::new(store.clone(), Arc::clone(&storage))?;
    domains::attach_mirror(&mirror, config.mirror_options());

    let outcome = run(&store, cli.command);
    // Persist whatever was applied, even if a later step failed.
    mirror.flush().await;

    let stats = mirror.stats();
    tracing::debug!(
        writes = stats.writes,
        write_failures = stats.write_failures,
        version = store.version(),
        "session finished"
    );
    outcome
}

fn run(store: &Store<AppState>, command: Command) -> Result<()> {
    match command {
        Command::Tasks(command) => run_tasks(store, command),
        Command::Cart(command) => run_cart(store, command),
        Command::Theme(command) => run_theme(store, command),
        Command::Profile(command) => run_profile(store, command),
    }
}

fn dispatch(store: &Store<AppState>, action: Action) -> Result<()> {
    let kind = action.kind().to_string();
    match store.dispatch(action)? {
        Dispatched::Applied { changed: false, .. } => tracing::debug!(kind = %kind, "no change"),
        Dispatched::Applied { version, .. } => tracing::debug!(kind = %kind, version, "applied"),
        Dispatched::Queued => tracing::debug!(kind = %kind, "queued"),
    }
    Ok(())
}

fn now_millis() -> Result<u64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the Unix epoch")?;
    Ok(elapsed.as_millis() as u64)
}

fn run_tasks(store: &Store<AppState>, command: TasksCommand) -> Result<()> {
    match command {
        TasksCommand::Add { text, priority } => {
            let task = tasks::NewTask {
                id: uuid::Uuid::new_v4().to_string(),
                text,
                priority: Some(priority.into()),
                created_at: now_millis()?,
            };
            dispatch(store, tasks::actions::add(&task)?)?;
            println!("{}", task.id);
        }
        TasksCommand::List {
            search,
            filter,
            sort_by,
        } => {
            dispatch(store, tasks::actions::set_filter(filter.into())?)?;
            dispatch(store, tasks::actions::set_sort(sort_by.into())?)?;
            for task in domains::visible_tasks(store, &search).iter() {
                let mark = if task.completed { "x" } else { " " };
                println!("[{}] {}  {:<6}  {}", mark, task.id, task.priority, task.text);
            }
        }
        TasksCommand::Toggle { id } => dispatch(store, tasks::actions::toggle(&id))?,
        TasksCommand::Delete { id } => dispatch(store, tasks::actions::delete(&id))?,
        TasksCommand::Edit { id, text } => dispatch(store, tasks::actions::edit(&id, &text)?)?,
        TasksCommand::ClearCompleted => dispatch(store, tasks::actions::clear_completed())?,
        TasksCommand::Stats => {
            println!("{}", serde_json::to_string_pretty(&*domains::task_stats(store))?);
        }
    }
    Ok(())
}

fn run_cart(store: &Store<AppState>, command: CartCommand) -> Result<()> {
    match command {
        CartCommand::Add { id, name, price } => {
            dispatch(store, cart::actions::add_item(&cart::Product { id, name, price })?)?
        }
        CartCommand::Remove { id } => dispatch(store, cart::actions::remove_item(id))?,
        CartCommand::Qty { id, quantity } => {
            dispatch(store, cart::actions::update_quantity(id, quantity)?)?
        }
        CartCommand::Clear => dispatch(store, cart::actions::clear())?,
        CartCommand::Show => {
            for item in &store.state().cart.items {
                println!(
                    "{:>4}  {:<24} {:>3} x {:>8.2}",
                    item.id, item.name, item.quantity, item.price
                );
            }
            let totals = domains::cart_totals(store);
            println!("{} item(s), total {:.2}", totals.items, totals.price);
        }
    }
    Ok(())
}

fn run_theme(store: &Store<AppState>, command: ThemeCommand) -> Result<()> {
    if let ThemeCommand::Toggle = command {
        dispatch(store, preferences::actions::toggle_theme())?;
    }
    println!("{}", store.state().preferences.theme);
    Ok(())
}

fn run_profile(store: &Store<AppState>, command: ProfileCommand) -> Result<()> {
    if let ProfileCommand::Select { id } = command {
        dispatch(store, profile::actions::select_user(id)?)?;
    }
    println!("{}", store.state().profile.selected_user_id);
    Ok(())
}
