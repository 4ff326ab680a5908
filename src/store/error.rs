//! Store error taxonomy.

use thiserror::Error;

use super::subscription::SubscriptionId;

/// Errors a reducer reports for a single action.
///
/// Reducers validate their own payloads; the Store never inspects them.
#[derive(Debug, Error)]
pub enum ReducerError {
    #[error("invalid payload for '{kind}': {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("action '{kind}' rejected: {reason}")]
    Rejected { kind: String, reason: String },
}

impl ReducerError {
    pub fn rejected(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            kind: kind.into(),
            reason: reason.into(),
        }
    }
}

/// A subscriber callback that returned an error during a notification round.
#[derive(Debug)]
pub struct SubscriberFailure {
    pub subscription: SubscriptionId,
    pub error: anyhow::Error,
}

/// Errors surfaced by the Store and its registry.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("action kind must not be empty")]
    EmptyKind,

    #[error("a reducer for action kind '{kind}' is already registered in {owner}")]
    DuplicateKind { kind: String, owner: String },

    #[error("slice '{slice}' claims state key '{key}' already owned by slice '{owner}'")]
    SliceConflict {
        slice: String,
        key: String,
        owner: String,
    },

    #[error("failed to encode payload for '{kind}': {source}")]
    PayloadEncoding {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("reducer for '{kind}' failed: {source}")]
    ReducerFailure {
        kind: String,
        #[source]
        source: ReducerError,
    },

    #[error("{} subscriber(s) failed while notifying '{kind}'", .failures.len())]
    SubscriberFailure {
        kind: String,
        failures: Vec<SubscriberFailure>,
    },

    #[error("{} errors while draining dispatch queue", .0.len())]
    Aggregate(Vec<StoreError>),
}

impl StoreError {
    /// Collapse the errors of one drain into a single value.
    pub(crate) fn collect(mut errors: Vec<StoreError>) -> Option<StoreError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(StoreError::Aggregate(errors)),
        }
    }
}
