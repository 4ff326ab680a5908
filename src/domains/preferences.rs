//! User preferences. Currently just the colour theme.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::reducer::{ReducerRegistry, Slice};
use crate::store::{Action, ReducerError, StoreError};

pub const TOGGLE_THEME: &str = "TOGGLE_THEME";
pub const SET_THEME: &str = "SET_THEME";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    pub theme: Theme,
}

type PreferencesReducer = fn(&Arc<Preferences>, &Action) -> Result<Arc<Preferences>, ReducerError>;

fn reducers() -> [(&'static str, PreferencesReducer); 2] {
    [(TOGGLE_THEME, toggle_theme), (SET_THEME, set_theme)]
}

pub fn registry() -> Result<ReducerRegistry<Preferences>, StoreError> {
    let mut registry = ReducerRegistry::new();
    for (kind, reducer) in reducers() {
        registry.register(kind, reducer)?;
    }
    Ok(registry)
}

pub fn slice<S>(
    get: fn(&S) -> &Arc<Preferences>,
    set: fn(&mut S, Arc<Preferences>),
) -> Result<Slice<S, Preferences>, StoreError> {
    reducers()
        .into_iter()
        .try_fold(Slice::new("preferences", get, set), |slice, (kind, reducer)| {
            slice.on(kind, reducer)
        })
}

fn toggle_theme(state: &Arc<Preferences>, _action: &Action) -> Result<Arc<Preferences>, ReducerError> {
    Ok(Arc::new(Preferences {
        theme: state.theme.toggled(),
    }))
}

fn set_theme(state: &Arc<Preferences>, action: &Action) -> Result<Arc<Preferences>, ReducerError> {
    let theme: Theme = action.payload_as()?;
    if state.theme == theme {
        return Ok(Arc::clone(state));
    }
    Ok(Arc::new(Preferences { theme }))
}

pub mod actions {
    use super::*;

    pub fn toggle_theme() -> Action {
        Action::new(TOGGLE_THEME)
    }

    pub fn set_theme(theme: Theme) -> Result<Action, StoreError> {
        Action::from_payload(SET_THEME, &theme)
    }
}
