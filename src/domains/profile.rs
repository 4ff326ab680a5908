//! Team member profile: which member is selected, and the edit form for
//! their details.
//!
//! Editing works on a copy (`edited`). `SAVE_SUCCESS` commits it and
//! `CANCEL_EDIT` throws it away. Saving itself happens outside the Store;
//! the caller brackets it with `SAVE_START` and `SAVE_SUCCESS`/`SAVE_ERROR`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::reducer::{ReducerRegistry, Slice};
use crate::store::{Action, ReducerError, StoreError};

pub const SELECT_USER: &str = "SELECT_USER";
pub const SET_USER: &str = "SET_USER";
pub const START_EDIT: &str = "START_EDIT";
pub const CANCEL_EDIT: &str = "CANCEL_EDIT";
pub const UPDATE_FIELD: &str = "UPDATE_FIELD";
pub const SET_ERRORS: &str = "SET_ERRORS";
pub const SAVE_START: &str = "SAVE_START";
pub const SAVE_SUCCESS: &str = "SAVE_SUCCESS";
pub const SAVE_ERROR: &str = "SAVE_ERROR";
pub const CLEAR_MESSAGE: &str = "CLEAR_MESSAGE";

/// Member selected when nothing has been stored yet.
pub const DEFAULT_USER_ID: u32 = 1;

pub const SAVED_MESSAGE: &str = "Profile updated";

/// Error key used for failures not tied to one field.
pub const GENERAL_ERROR: &str = "general";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub bio: String,
}

impl User {
    /// Fields the edit form may change, by their wire name.
    pub const EDITABLE: [&'static str; 5] = ["firstName", "lastName", "email", "phone", "bio"];

    fn field_mut(&mut self, field: &str) -> Option<&mut String> {
        match field {
            "firstName" => Some(&mut self.first_name),
            "lastName" => Some(&mut self.last_name),
            "email" => Some(&mut self.email),
            "phone" => Some(&mut self.phone),
            "bio" => Some(&mut self.bio),
            _ => None,
        }
    }
}

/// Field name to message.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileState {
    pub selected_user_id: u32,
    pub user: Option<User>,
    pub edited: Option<User>,
    pub editing: bool,
    pub saving: bool,
    pub errors: FieldErrors,
    pub message: Option<String>,
}

impl Default for ProfileState {
    fn default() -> Self {
        Self {
            selected_user_id: DEFAULT_USER_ID,
            user: None,
            edited: None,
            editing: false,
            saving: false,
            errors: FieldErrors::new(),
            message: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FieldChange {
    field: String,
    value: String,
}

type ProfileReducer = fn(&Arc<ProfileState>, &Action) -> Result<Arc<ProfileState>, ReducerError>;

fn reducers() -> [(&'static str, ProfileReducer); 10] {
    [
        (SELECT_USER, select_user),
        (SET_USER, set_user),
        (START_EDIT, start_edit),
        (CANCEL_EDIT, cancel_edit),
        (UPDATE_FIELD, update_field),
        (SET_ERRORS, set_errors),
        (SAVE_START, save_start),
        (SAVE_SUCCESS, save_success),
        (SAVE_ERROR, save_error),
        (CLEAR_MESSAGE, clear_message),
    ]
}

pub fn registry() -> Result<ReducerRegistry<ProfileState>, StoreError> {
    let mut registry = ReducerRegistry::new();
    for (kind, reducer) in reducers() {
        registry.register(kind, reducer)?;
    }
    Ok(registry)
}

pub fn slice<S>(
    get: fn(&S) -> &Arc<ProfileState>,
    set: fn(&mut S, Arc<ProfileState>),
) -> Result<Slice<S, ProfileState>, StoreError> {
    reducers()
        .into_iter()
        .try_fold(Slice::new("profile", get, set), |slice, (kind, reducer)| slice.on(kind, reducer))
}

fn select_user(state: &Arc<ProfileState>, action: &Action) -> Result<Arc<ProfileState>, ReducerError> {
    let id: u32 = action.payload_as()?;
    if state.selected_user_id == id {
        return Ok(Arc::clone(state));
    }
    Ok(Arc::new(ProfileState {
        selected_user_id: id,
        ..ProfileState::clone(state)
    }))
}

/// Loading a member replaces both the stored and the edited copy.
fn set_user(state: &Arc<ProfileState>, action: &Action) -> Result<Arc<ProfileState>, ReducerError> {
    let user: User = action.payload_as()?;
    if state.user.as_ref() == Some(&user) && state.edited.as_ref() == Some(&user) {
        return Ok(Arc::clone(state));
    }
    Ok(Arc::new(ProfileState {
        user: Some(user.clone()),
        edited: Some(user),
        ..ProfileState::clone(state)
    }))
}

fn start_edit(state: &Arc<ProfileState>, _action: &Action) -> Result<Arc<ProfileState>, ReducerError> {
    if state.user.is_none() {
        return Err(ReducerError::rejected(START_EDIT, "no member loaded"));
    }
    Ok(Arc::new(ProfileState {
        editing: true,
        ..reset_form(state)
    }))
}

fn cancel_edit(state: &Arc<ProfileState>, _action: &Action) -> Result<Arc<ProfileState>, ReducerError> {
    let next = ProfileState {
        editing: false,
        ..reset_form(state)
    };
    if next == **state {
        return Ok(Arc::clone(state));
    }
    Ok(Arc::new(next))
}

fn reset_form(state: &ProfileState) -> ProfileState {
    ProfileState {
        edited: state.user.clone(),
        errors: FieldErrors::new(),
        message: None,
        ..state.clone()
    }
}

/// Sets one field on the edited copy and clears that field's error.
fn update_field(state: &Arc<ProfileState>, action: &Action) -> Result<Arc<ProfileState>, ReducerError> {
    let change: FieldChange = action.payload_as()?;
    let mut next = ProfileState::clone(state);
    let edited = next
        .edited
        .as_mut()
        .ok_or_else(|| ReducerError::rejected(UPDATE_FIELD, "no member loaded"))?;
    let slot = edited.field_mut(&change.field).ok_or_else(|| {
        ReducerError::rejected(
            UPDATE_FIELD,
            format!("unknown field '{}', expected one of {:?}", change.field, User::EDITABLE),
        )
    })?;
    *slot = change.value;
    next.errors.remove(&change.field);
    if next == **state {
        return Ok(Arc::clone(state));
    }
    Ok(Arc::new(next))
}

fn set_errors(state: &Arc<ProfileState>, action: &Action) -> Result<Arc<ProfileState>, ReducerError> {
    let errors: FieldErrors = action.payload_as()?;
    if state.errors == errors {
        return Ok(Arc::clone(state));
    }
    Ok(Arc::new(ProfileState {
        errors,
        ..ProfileState::clone(state)
    }))
}

fn save_start(state: &Arc<ProfileState>, _action: &Action) -> Result<Arc<ProfileState>, ReducerError> {
    Ok(Arc::new(ProfileState {
        saving: true,
        message: None,
        ..ProfileState::clone(state)
    }))
}

fn save_success(state: &Arc<ProfileState>, _action: &Action) -> Result<Arc<ProfileState>, ReducerError> {
    let edited = state
        .edited
        .clone()
        .ok_or_else(|| ReducerError::rejected(SAVE_SUCCESS, "nothing to save"))?;
    Ok(Arc::new(ProfileState {
        user: Some(edited),
        saving: false,
        editing: false,
        message: Some(SAVED_MESSAGE.to_string()),
        ..ProfileState::clone(state)
    }))
}

fn save_error(state: &Arc<ProfileState>, action: &Action) -> Result<Arc<ProfileState>, ReducerError> {
    let reason: String = action.payload_as()?;
    Ok(Arc::new(ProfileState {
        saving: false,
        errors: FieldErrors::from([(GENERAL_ERROR.to_string(), reason)]),
        ..ProfileState::clone(state)
    }))
}

fn clear_message(state: &Arc<ProfileState>, _action: &Action) -> Result<Arc<ProfileState>, ReducerError> {
    if state.message.is_none() {
        return Ok(Arc::clone(state));
    }
    Ok(Arc::new(ProfileState {
        message: None,
        ..ProfileState::clone(state)
    }))
}

/// Form validation. An empty map means the member can be saved.
pub fn validate(user: &User) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if user.first_name.trim().is_empty() {
        errors.insert("firstName".to_string(), "First name is required".to_string());
    }
    if user.last_name.trim().is_empty() {
        errors.insert("lastName".to_string(), "Last name is required".to_string());
    }
    if user.email.trim().is_empty() {
        errors.insert("email".to_string(), "Email is required".to_string());
    } else if !is_email(&user.email) {
        errors.insert("email".to_string(), "Email is invalid".to_string());
    }
    if !user.phone.chars().all(|c| c.is_ascii_digit() || c == ' ') {
        errors.insert(
            "phone".to_string(),
            "Phone may only contain digits and spaces".to_string(),
        );
    }
    errors
}

/// `local@domain.tld`, no whitespace, exactly one `@`.
fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

pub mod actions {
    use super::*;

    pub fn select_user(id: u32) -> Result<Action, StoreError> {
        Action::from_payload(SELECT_USER, &id)
    }

    pub fn set_user(user: &User) -> Result<Action, StoreError> {
        Action::from_payload(SET_USER, user)
    }

    pub fn start_edit() -> Action {
        Action::new(START_EDIT)
    }

    pub fn cancel_edit() -> Action {
        Action::new(CANCEL_EDIT)
    }

    pub fn update_field(field: &str, value: &str) -> Result<Action, StoreError> {
        Action::from_payload(
            UPDATE_FIELD,
            &FieldChange {
                field: field.to_string(),
                value: value.to_string(),
            },
        )
    }

    pub fn set_errors(errors: &FieldErrors) -> Result<Action, StoreError> {
        Action::from_payload(SET_ERRORS, errors)
    }

    pub fn save_start() -> Action {
        Action::new(SAVE_START)
    }

    pub fn save_success() -> Action {
        Action::new(SAVE_SUCCESS)
    }

    pub fn save_error(reason: &str) -> Result<Action, StoreError> {
        Action::from_payload(SAVE_ERROR, &reason)
    }

    pub fn clear_message() -> Action {
        Action::new(CLEAR_MESSAGE)
    }
}
