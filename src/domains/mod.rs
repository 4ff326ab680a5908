//! TeamHub application state: cart, tasks, preferences and the member
//! profile as slices of one Store.

pub mod cart;
pub mod preferences;
pub mod profile;
pub mod tasks;

use std::sync::Arc;

use crate::persistence::{KeyValueStore, MirrorOptions, PersistenceMirror};
use crate::reducer::ReducerRegistry;
use crate::store::{Store, StoreError};

use cart::{CartState, CartTotals};
use preferences::{Preferences, Theme};
use profile::{ProfileState, DEFAULT_USER_ID};
use tasks::{Task, TaskState, TaskStats};

/// Storage key for cart items.
pub const CART_KEY: &str = "teamhub-cart";
/// Storage key for the task list. Filter and sort order are not persisted.
pub const TASKS_KEY: &str = "taskmanager-tasks";
pub const THEME_KEY: &str = "theme";
/// Storage key for the selected member id. The profile form is not persisted.
pub const SELECTED_USER_KEY: &str = "selectedUserId";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    pub cart: Arc<CartState>,
    pub tasks: Arc<TaskState>,
    pub preferences: Arc<Preferences>,
    pub profile: Arc<ProfileState>,
}

fn cart_of(state: &AppState) -> &Arc<CartState> {
    &state.cart
}

fn set_cart(state: &mut AppState, cart: Arc<CartState>) {
    state.cart = cart;
}

fn tasks_of(state: &AppState) -> &Arc<TaskState> {
    &state.tasks
}

fn set_tasks(state: &mut AppState, tasks: Arc<TaskState>) {
    state.tasks = tasks;
}

fn preferences_of(state: &AppState) -> &Arc<Preferences> {
    &state.preferences
}

fn set_preferences(state: &mut AppState, preferences: Arc<Preferences>) {
    state.preferences = preferences;
}

fn profile_of(state: &AppState) -> &Arc<ProfileState> {
    &state.profile
}

fn set_profile(state: &mut AppState, profile: Arc<ProfileState>) {
    state.profile = profile;
}

pub fn registry() -> Result<ReducerRegistry<AppState>, StoreError> {
    let mut registry = ReducerRegistry::new();
    registry
        .add_slice(cart::slice::<AppState>(cart_of, set_cart)?)?
        .add_slice(tasks::slice::<AppState>(tasks_of, set_tasks)?)?
        .add_slice(preferences::slice::<AppState>(preferences_of, set_preferences)?)?
        .add_slice(profile::slice::<AppState>(profile_of, set_profile)?)?;
    Ok(registry)
}

/// Build the application Store, seeded from whatever `storage` holds.
pub fn open(storage: &dyn KeyValueStore) -> Result<Store<AppState>, StoreError> {
    let store = Store::builder(registry()?, AppState::default())
        .hydrate(storage, TASKS_KEY, Vec::<Task>::new(), |state, tasks| {
            state.tasks = Arc::new(TaskState {
                tasks,
                ..TaskState::default()
            });
        })
        .hydrate(storage, CART_KEY, CartState::default(), |state, cart| {
            state.cart = Arc::new(cart);
        })
        .hydrate(storage, THEME_KEY, Theme::default(), |state, theme| {
            state.preferences = Arc::new(Preferences { theme });
        })
        .hydrate(storage, SELECTED_USER_KEY, DEFAULT_USER_ID, |state, id| {
            state.profile = Arc::new(ProfileState {
                selected_user_id: id,
                ..ProfileState::default()
            });
        })
        .build();
    Ok(store)
}

/// Mirror the persisted parts of the state under their storage keys.
pub fn attach_mirror(mirror: &PersistenceMirror<AppState>, options: MirrorOptions) {
    mirror.attach(TASKS_KEY, |s: &AppState| s.tasks.tasks.clone(), options);
    mirror.attach(CART_KEY, |s: &AppState| CartState::clone(&s.cart), options);
    mirror.attach(THEME_KEY, |s: &AppState| s.preferences.theme, options);
    mirror.attach(SELECTED_USER_KEY, |s: &AppState| s.profile.selected_user_id, options);
}

pub fn visible_tasks(store: &Store<AppState>, search: &str) -> Arc<Vec<Task>> {
    let search = search.to_string();
    store.view(
        "visible_tasks",
        move |s: &AppState| (Arc::clone(&s.tasks), search),
        |(state, search): &(Arc<TaskState>, String)| {
            tasks::visible_tasks(&state.tasks, state.filter, state.sort_by, search)
        },
    )
}

pub fn task_stats(store: &Store<AppState>) -> Arc<TaskStats> {
    store.view(
        "task_stats",
        |s: &AppState| s.tasks.tasks.clone(),
        |tasks: &Vec<Task>| tasks::stats(tasks),
    )
}

pub fn cart_totals(store: &Store<AppState>) -> Arc<CartTotals> {
    store.view(
        "cart_totals",
        |s: &AppState| Arc::clone(&s.cart),
        |cart: &Arc<CartState>| cart::totals(cart),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStorage;

    fn mug() -> cart::Product {
        cart::Product {
            id: 2,
            name: "JavaScript Mug".to_string(),
            price: 12.0,
        }
    }

    #[test]
    fn cart_action_leaves_other_slices_untouched() {
        let store = open(&MemoryStorage::new()).unwrap();
        let before = store.state();
        store.dispatch(cart::actions::add_item(&mug()).unwrap()).unwrap();
        let after = store.state();
        assert_eq!(after.cart.items.len(), 1);
        assert!(Arc::ptr_eq(&before.tasks, &after.tasks));
        assert!(Arc::ptr_eq(&before.preferences, &after.preferences));
        assert!(Arc::ptr_eq(&before.profile, &after.profile));
    }

    #[test]
    fn profile_edit_flows_through_app_store() {
        let store = open(&MemoryStorage::new()).unwrap();
        let alice = profile::User {
            id: 2,
            first_name: "Alice".to_string(),
            last_name: "Martin".to_string(),
            email: "alice@teamhub.dev".to_string(),
            ..profile::User::default()
        };
        store.dispatch(profile::actions::select_user(2).unwrap()).unwrap();
        store.dispatch(profile::actions::set_user(&alice).unwrap()).unwrap();
        store.dispatch(profile::actions::start_edit()).unwrap();
        store
            .dispatch(profile::actions::update_field("email", "alice@").unwrap())
            .unwrap();

        let errors = profile::validate(store.state().profile.edited.as_ref().unwrap());
        assert!(errors.contains_key("email"));
        store.dispatch(profile::actions::set_errors(&errors).unwrap()).unwrap();

        let state = store.state();
        assert_eq!(state.profile.selected_user_id, 2);
        assert!(state.profile.editing);
        assert_eq!(state.profile.user.as_ref().unwrap().email, "alice@teamhub.dev");
        assert_eq!(state.profile.errors, errors);
    }

    #[test]
    fn open_hydrates_each_key() {
        let storage = MemoryStorage::new();
        storage.set(THEME_KEY, "\"dark\"").unwrap();
        storage
            .set(
                TASKS_KEY,
                r#"[{"id":"t1","text":"Ship it","priority":"high","completed":false,"created_at":5}]"#,
            )
            .unwrap();
        storage.set(CART_KEY, "not json").unwrap();
        storage.set(SELECTED_USER_KEY, "3").unwrap();

        let store = open(&storage).unwrap();
        let state = store.state();
        assert_eq!(state.preferences.theme, Theme::Dark);
        assert_eq!(state.tasks.tasks.len(), 1);
        assert!(state.cart.items.is_empty());
        assert_eq!(state.profile.selected_user_id, 3);
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn views_recompute_only_for_their_slice() {
        let store = open(&MemoryStorage::new()).unwrap();
        let totals = cart_totals(&store);
        store
            .dispatch(preferences::actions::toggle_theme())
            .unwrap();
        assert!(Arc::ptr_eq(&totals, &cart_totals(&store)));

        store.dispatch(cart::actions::add_item(&mug()).unwrap()).unwrap();
        assert_eq!(cart_totals(&store).items, 1);
    }

    #[test]
    fn visible_tasks_follow_search() {
        let store = open(&MemoryStorage::new()).unwrap();
        for (id, text) in [("a", "Review PR"), ("b", "Lunch")] {
            let task = tasks::NewTask {
                id: id.to_string(),
                text: text.to_string(),
                priority: None,
                created_at: 1,
            };
            store.dispatch(tasks::actions::add(&task).unwrap()).unwrap();
        }
        assert_eq!(visible_tasks(&store, "").len(), 2);
        let found = visible_tasks(&store, "pr");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a");
        assert_eq!(task_stats(&store).total, 2);
    }
}
