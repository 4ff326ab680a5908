//! Actions: descriptions of intended state transitions.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{ReducerError, StoreError};

/// A tagged request for a state transition.
///
/// Actions are immutable once built and are consumed by exactly one
/// dispatch. The payload is opaque to the Store; each reducer decodes
/// the shape it expects with [`Action::payload_as`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl Action {
    /// Action without a payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Value::Null,
        }
    }

    pub fn with_payload(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Encode a typed payload.
    pub fn from_payload<P: Serialize>(kind: impl Into<String>, payload: &P) -> Result<Self, StoreError> {
        let kind = kind.into();
        let payload = serde_json::to_value(payload).map_err(|source| StoreError::PayloadEncoding {
            kind: kind.clone(),
            source,
        })?;
        Ok(Self { kind, payload })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Decode the payload into the shape a reducer expects.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ReducerError> {
        T::deserialize(&self.payload).map_err(|source| ReducerError::InvalidPayload {
            kind: self.kind.clone(),
            source,
        })
    }
}
