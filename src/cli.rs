//! CLI command definitions and subcommands

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use teamhub::domains::tasks::{Filter, Priority, SortBy};

/// TeamHub - tasks, cart, preferences and profile backed by a reactive store
#[derive(Parser)]
#[command(
    name = "teamhub",
    about = "TeamHub intranet state from the command line",
    version,
    after_help = "State is stored as JSON files under the configured persistence directory."
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage the task list
    #[command(subcommand)]
    Tasks(TasksCommand),

    /// Manage the shopping cart
    #[command(subcommand)]
    Cart(CartCommand),

    /// Show or switch the colour theme
    #[command(subcommand)]
    Theme(ThemeCommand),

    /// Choose which team member's profile is shown
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Subcommand)]
pub enum TasksCommand {
    /// Add a task
    Add {
        /// Task text
        text: String,

        /// Task priority
        #[arg(short, long, value_enum, default_value = "medium")]
        priority: PriorityArg,
    },

    /// List visible tasks
    List {
        /// Case-insensitive text search
        #[arg(short, long, default_value = "")]
        search: String,

        /// Status filter
        #[arg(short, long, value_enum, default_value = "all")]
        filter: FilterArg,

        /// Sort order
        #[arg(long = "sort", value_enum, default_value = "date")]
        sort_by: SortArg,
    },

    /// Toggle a task between active and completed
    Toggle { id: String },

    /// Delete a task
    Delete { id: String },

    /// Change a task's text
    Edit { id: String, text: String },

    /// Remove every completed task
    ClearCompleted,

    /// Show task counts
    Stats,
}

#[derive(Subcommand)]
pub enum CartCommand {
    /// Add one unit of a product
    Add {
        id: u32,
        name: String,
        price: f64,
    },

    /// Remove a product entirely
    Remove { id: u32 },

    /// Set a product's quantity (0 or less removes it)
    #[command(allow_negative_numbers = true)]
    Qty { id: u32, quantity: i64 },

    /// Empty the cart
    Clear,

    /// Show cart contents and totals
    Show,
}

#[derive(Subcommand)]
pub enum ThemeCommand {
    /// Switch between light and dark
    Toggle,

    /// Print the current theme
    Show,
}

#[derive(Subcommand)]
pub enum ProfileCommand {
    /// Select a member by id
    Select { id: u32 },

    /// Print the selected member id
    Show,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PriorityArg {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FilterArg {
    All,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortArg {
    Date,
    Priority,
    Name,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::High => Priority::High,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::Low => Priority::Low,
        }
    }
}

impl From<FilterArg> for Filter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => Filter::All,
            FilterArg::Active => Filter::Active,
            FilterArg::Completed => Filter::Completed,
        }
    }
}

impl From<SortArg> for SortBy {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Date => SortBy::Date,
            SortArg::Priority => SortBy::Priority,
            SortArg::Name => SortBy::Name,
        }
    }
}
