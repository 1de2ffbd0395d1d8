//! Request matchers evaluated against the JSON projection of a request.

use super::payload::RequestPayload;
use crate::error::MockError;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Closure matcher over the request value.
pub type MatchPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Matcher for a single request or for the ordered list of streamed requests.
///
/// Streamed payloads are matched as a JSON array.
#[derive(Clone)]
pub enum RequestMatcher {
    /// Exact deep equality.
    Equals(Value),
    /// Every expected field present with a matching value; extra fields allowed.
    Including(Value),
    Predicate(MatchPredicate),
}

impl RequestMatcher {
    /// Exact matcher for a typed message.
    pub fn message<M: Serialize>(message: &M) -> Result<Self, MockError> {
        serde_json::to_value(message)
            .map(RequestMatcher::Equals)
            .map_err(MockError::Encode)
    }

    /// Exact matcher for a sequence of streamed messages.
    pub fn messages<M: Serialize>(messages: &[M]) -> Result<Self, MockError> {
        serde_json::to_value(messages)
            .map(RequestMatcher::Equals)
            .map_err(MockError::Encode)
    }

    pub fn including(expected: Value) -> Self {
        RequestMatcher::Including(expected)
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        RequestMatcher::Predicate(Arc::new(f))
    }

    pub fn matches(&self, payload: &RequestPayload) -> bool {
        let actual = payload.to_value();
        match self {
            RequestMatcher::Equals(expected) => actual == *expected,
            RequestMatcher::Including(expected) => json_includes(&actual, expected),
            RequestMatcher::Predicate(predicate) => predicate(&actual),
        }
    }
}

impl fmt::Debug for RequestMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestMatcher::Equals(v) => f.debug_tuple("Equals").field(v).finish(),
            RequestMatcher::Including(v) => f.debug_tuple("Including").field(v).finish(),
            RequestMatcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<Value> for RequestMatcher {
    fn from(expected: Value) -> Self {
        RequestMatcher::Equals(expected)
    }
}

/// Partial JSON comparison: objects need only the expected keys.
fn json_includes(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| json_includes(x, y))
        }
        (Value::Object(a), Value::Object(b)) => b.iter().all(|(key, expected_val)| {
            a.get(key)
                .is_some_and(|actual_val| json_includes(actual_val, expected_val))
        }),
        _ => actual == expected,
    }
}
