//! Request payloads as seen by matchers and scripted responses.

use crate::error::MockError;
use serde::Serialize;
use serde_json::Value;

/// The request side of an intercepted call, projected to JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPayload {
    Single(Value),
    /// Streamed requests in the order they were produced.
    Multi(Vec<Value>),
}

impl RequestPayload {
    pub fn single<M: Serialize>(message: &M) -> Result<Self, MockError> {
        serde_json::to_value(message)
            .map(RequestPayload::Single)
            .map_err(MockError::Encode)
    }

    pub fn multi<M: Serialize>(messages: &[M]) -> Result<Self, MockError> {
        messages
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map(RequestPayload::Multi)
            .map_err(MockError::Encode)
    }

    /// Single payloads as-is, streamed payloads as a JSON array.
    pub fn to_value(&self) -> Value {
        match self {
            RequestPayload::Single(value) => value.clone(),
            RequestPayload::Multi(values) => Value::Array(values.clone()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RequestPayload::Single(_) => 1,
            RequestPayload::Multi(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
