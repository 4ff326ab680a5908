//! Task manager: tasks with priorities, a status filter and a sort order.
//!
//! Task ids and creation times arrive in the `ADD_TASK` payload; the
//! reducers never read the clock.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::reducer::{ReducerRegistry, Slice};
use crate::store::{Action, ReducerError, StoreError};

pub const SET_TASKS: &str = "SET_TASKS";
pub const ADD_TASK: &str = "ADD_TASK";
pub const TOGGLE_TASK: &str = "TOGGLE_TASK";
pub const DELETE_TASK: &str = "DELETE_TASK";
pub const EDIT_TASK: &str = "EDIT_TASK";
pub const SET_FILTER: &str = "SET_FILTER";
pub const SET_SORT: &str = "SET_SORT";
pub const CLEAR_COMPLETED: &str = "CLEAR_COMPLETED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.pad(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Newest first.
    #[default]
    Date,
    Priority,
    Name,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    pub priority: Priority,
    pub completed: bool,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskState {
    pub tasks: Vec<Task>,
    pub filter: Filter,
    pub sort_by: SortBy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    /// High-priority tasks not yet completed.
    pub high_priority: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    pub created_at: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextEdit {
    id: String,
    text: String,
}

type TaskReducer = fn(&Arc<TaskState>, &Action) -> Result<Arc<TaskState>, ReducerError>;

fn reducers() -> [(&'static str, TaskReducer); 8] {
    [
        (SET_TASKS, set_tasks),
        (ADD_TASK, add_task),
        (TOGGLE_TASK, toggle_task),
        (DELETE_TASK, delete_task),
        (EDIT_TASK, edit_task),
        (SET_FILTER, set_filter),
        (SET_SORT, set_sort),
        (CLEAR_COMPLETED, clear_completed),
    ]
}

pub fn registry() -> Result<ReducerRegistry<TaskState>, StoreError> {
    let mut registry = ReducerRegistry::new();
    for (kind, reducer) in reducers() {
        registry.register(kind, reducer)?;
    }
    Ok(registry)
}

pub fn slice<S>(
    get: fn(&S) -> &Arc<TaskState>,
    set: fn(&mut S, Arc<TaskState>),
) -> Result<Slice<S, TaskState>, StoreError> {
    reducers()
        .into_iter()
        .try_fold(Slice::new("tasks", get, set), |slice, (kind, reducer)| slice.on(kind, reducer))
}

fn with_tasks(state: &TaskState, tasks: Vec<Task>) -> Arc<TaskState> {
    Arc::new(TaskState {
        tasks,
        ..state.clone()
    })
}

fn set_tasks(state: &Arc<TaskState>, action: &Action) -> Result<Arc<TaskState>, ReducerError> {
    let tasks: Vec<Task> = action.payload_as()?;
    Ok(with_tasks(state, tasks))
}

fn add_task(state: &Arc<TaskState>, action: &Action) -> Result<Arc<TaskState>, ReducerError> {
    let new: NewTask = action.payload_as()?;
    let text = new.text.trim();
    if text.is_empty() {
        return Err(ReducerError::rejected(ADD_TASK, "task text is empty"));
    }
    if state.tasks.iter().any(|task| task.id == new.id) {
        return Err(ReducerError::rejected(ADD_TASK, format!("duplicate task id '{}'", new.id)));
    }
    let mut tasks = state.tasks.clone();
    tasks.push(Task {
        id: new.id,
        text: text.to_string(),
        priority: new.priority.unwrap_or_default(),
        completed: false,
        created_at: new.created_at,
    });
    Ok(with_tasks(state, tasks))
}

fn toggle_task(state: &Arc<TaskState>, action: &Action) -> Result<Arc<TaskState>, ReducerError> {
    let id: String = action.payload_as()?;
    if !state.tasks.iter().any(|task| task.id == id) {
        return Ok(Arc::clone(state));
    }
    let tasks = state
        .tasks
        .iter()
        .map(|task| {
            if task.id == id {
                Task {
                    completed: !task.completed,
                    ..task.clone()
                }
            } else {
                task.clone()
            }
        })
        .collect();
    Ok(with_tasks(state, tasks))
}

fn delete_task(state: &Arc<TaskState>, action: &Action) -> Result<Arc<TaskState>, ReducerError> {
    let id: String = action.payload_as()?;
    if !state.tasks.iter().any(|task| task.id == id) {
        return Ok(Arc::clone(state));
    }
    let tasks = state.tasks.iter().filter(|task| task.id != id).cloned().collect();
    Ok(with_tasks(state, tasks))
}

fn edit_task(state: &Arc<TaskState>, action: &Action) -> Result<Arc<TaskState>, ReducerError> {
    let edit: TextEdit = action.payload_as()?;
    let text = edit.text.trim();
    if text.is_empty() {
        return Err(ReducerError::rejected(EDIT_TASK, "task text is empty"));
    }
    if !state.tasks.iter().any(|task| task.id == edit.id && task.text != text) {
        return Ok(Arc::clone(state));
    }
    let tasks = state
        .tasks
        .iter()
        .map(|task| {
            if task.id == edit.id {
                Task {
                    text: text.to_string(),
                    ..task.clone()
                }
            } else {
                task.clone()
            }
        })
        .collect();
    Ok(with_tasks(state, tasks))
}

fn set_filter(state: &Arc<TaskState>, action: &Action) -> Result<Arc<TaskState>, ReducerError> {
    let filter: Filter = action.payload_as()?;
    if state.filter == filter {
        return Ok(Arc::clone(state));
    }
    Ok(Arc::new(TaskState {
        filter,
        ..TaskState::clone(state)
    }))
}

fn set_sort(state: &Arc<TaskState>, action: &Action) -> Result<Arc<TaskState>, ReducerError> {
    let sort_by: SortBy = action.payload_as()?;
    if state.sort_by == sort_by {
        return Ok(Arc::clone(state));
    }
    Ok(Arc::new(TaskState {
        sort_by,
        ..TaskState::clone(state)
    }))
}

fn clear_completed(state: &Arc<TaskState>, _action: &Action) -> Result<Arc<TaskState>, ReducerError> {
    if !state.tasks.iter().any(|task| task.completed) {
        return Ok(Arc::clone(state));
    }
    let tasks = state.tasks.iter().filter(|task| !task.completed).cloned().collect();
    Ok(with_tasks(state, tasks))
}

/// Tasks matching `search` (case-insensitive) and `filter`, sorted.
pub fn visible_tasks(tasks: &[Task], filter: Filter, sort_by: SortBy, search: &str) -> Vec<Task> {
    let needle = search.trim().to_lowercase();
    let mut result: Vec<Task> = tasks
        .iter()
        .filter(|task| needle.is_empty() || task.text.to_lowercase().contains(&needle))
        .filter(|task| match filter {
            Filter::All => true,
            Filter::Active => !task.completed,
            Filter::Completed => task.completed,
        })
        .cloned()
        .collect();
    result.sort_by(|a, b| compare(a, b, sort_by));
    result
}

fn compare(a: &Task, b: &Task, sort_by: SortBy) -> Ordering {
    match sort_by {
        SortBy::Priority => a.priority.rank().cmp(&b.priority.rank()),
        SortBy::Name => a.text.to_lowercase().cmp(&b.text.to_lowercase()),
        SortBy::Date => b.created_at.cmp(&a.created_at),
    }
}

pub fn stats(tasks: &[Task]) -> TaskStats {
    let completed = tasks.iter().filter(|t| t.completed).count();
    TaskStats {
        total: tasks.len(),
        active: tasks.len() - completed,
        completed,
        high_priority: tasks
            .iter()
            .filter(|t| t.priority == Priority::High && !t.completed)
            .count(),
    }
}

pub mod actions {
    use super::*;

    pub fn add(task: &NewTask) -> Result<Action, StoreError> {
        Action::from_payload(ADD_TASK, task)
    }

    pub fn set_all(tasks: &[Task]) -> Result<Action, StoreError> {
        Action::from_payload(SET_TASKS, &tasks)
    }

    pub fn toggle(id: &str) -> Action {
        Action::with_payload(TOGGLE_TASK, serde_json::Value::from(id))
    }

    pub fn delete(id: &str) -> Action {
        Action::with_payload(DELETE_TASK, serde_json::Value::from(id))
    }

    pub fn edit(id: &str, text: &str) -> Result<Action, StoreError> {
        Action::from_payload(
            EDIT_TASK,
            &TextEdit {
                id: id.to_string(),
                text: text.to_string(),
            },
        )
    }

    pub fn set_filter(filter: Filter) -> Result<Action, StoreError> {
        Action::from_payload(SET_FILTER, &filter)
    }

    pub fn set_sort(sort_by: SortBy) -> Result<Action, StoreError> {
        Action::from_payload(SET_SORT, &sort_by)
    }

    pub fn clear_completed() -> Action {
        Action::new(CLEAR_COMPLETED)
    }
}
