//! Request stubs and their scripted responses.

use super::matcher::RequestMatcher;
use super::payload::RequestPayload;
use crate::call::CallView;
use crate::error::MockError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tonic::{Code, Status};

// ============================================================================
// Scripted statuses
// ============================================================================

/// A gRPC error as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedStatus {
    #[serde(deserialize_with = "deserialize_code")]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl ScriptedStatus {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code: code as i32,
            message: message.into(),
        }
    }

    pub fn code(&self) -> Code {
        Code::from_i32(self.code)
    }

    pub fn to_status(&self) -> Status {
        Status::new(self.code(), self.message.clone())
    }
}

impl From<ScriptedStatus> for Status {
    fn from(status: ScriptedStatus) -> Self {
        status.to_status()
    }
}

/// Parse a canonical status name such as `UNAVAILABLE` or `NotFound`.
pub fn code_from_name(name: &str) -> Option<Code> {
    let normalized: String = name
        .chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let code = match normalized.as_str() {
        "OK" => Code::Ok,
        "CANCELLED" | "CANCELED" => Code::Cancelled,
        "UNKNOWN" => Code::Unknown,
        "INVALIDARGUMENT" => Code::InvalidArgument,
        "DEADLINEEXCEEDED" => Code::DeadlineExceeded,
        "NOTFOUND" => Code::NotFound,
        "ALREADYEXISTS" => Code::AlreadyExists,
        "PERMISSIONDENIED" => Code::PermissionDenied,
        "RESOURCEEXHAUSTED" => Code::ResourceExhausted,
        "FAILEDPRECONDITION" => Code::FailedPrecondition,
        "ABORTED" => Code::Aborted,
        "OUTOFRANGE" => Code::OutOfRange,
        "UNIMPLEMENTED" => Code::Unimplemented,
        "INTERNAL" => Code::Internal,
        "UNAVAILABLE" => Code::Unavailable,
        "DATALOSS" => Code::DataLoss,
        "UNAUTHENTICATED" => Code::Unauthenticated,
        _ => return None,
    };
    Some(code)
}

/// Deserialize a status code from either a number or a canonical name
fn deserialize_code<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .filter(|n| (0..=16).contains(n))
            .ok_or_else(|| D::Error::custom(format!("invalid gRPC status code: {n}"))),
        Value::String(s) => code_from_name(&s)
            .map(|c| c as i32)
            .ok_or_else(|| D::Error::custom(format!("unknown gRPC status name: {s}"))),
        _ => Err(D::Error::custom("code must be a number or a status name")),
    }
}

// ============================================================================
// Scripted responses
// ============================================================================

/// Closure producing a response from the request and the call view.
pub type ResponseFn = Arc<dyn Fn(&RequestPayload, &CallView) -> Result<Value, Status> + Send + Sync>;

/// One scripted answer to a matched call.
///
/// For response-streaming calls a `Message` holding a JSON array is streamed
/// element by element. An `Error` is raised as given, metadata and details
/// included.
#[derive(Clone)]
pub enum ScriptedResponse {
    Message(Value),
    Error(Status),
    Dynamic(ResponseFn),
}

impl ScriptedResponse {
    pub fn message<M: Serialize>(message: &M) -> Result<Self, MockError> {
        serde_json::to_value(message)
            .map(ScriptedResponse::Message)
            .map_err(MockError::Encode)
    }

    pub fn messages<M: Serialize>(messages: &[M]) -> Result<Self, MockError> {
        serde_json::to_value(messages)
            .map(ScriptedResponse::Message)
            .map_err(MockError::Encode)
    }

    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&RequestPayload, &CallView) -> Result<Value, Status> + Send + Sync + 'static,
    {
        ScriptedResponse::Dynamic(Arc::new(f))
    }

    pub fn evaluate(&self, payload: &RequestPayload, view: &CallView) -> Result<Value, MockError> {
        match self {
            ScriptedResponse::Message(value) => Ok(value.clone()),
            ScriptedResponse::Error(status) => Err(MockError::Status(status.clone())),
            ScriptedResponse::Dynamic(f) => f(payload, view).map_err(MockError::Status),
        }
    }
}

impl fmt::Debug for ScriptedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptedResponse::Message(v) => f.debug_tuple("Message").field(v).finish(),
            ScriptedResponse::Error(s) => f.debug_tuple("Error").field(s).finish(),
            ScriptedResponse::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<Value> for ScriptedResponse {
    fn from(value: Value) -> Self {
        ScriptedResponse::Message(value)
    }
}

impl From<Status> for ScriptedResponse {
    fn from(status: Status) -> Self {
        ScriptedResponse::Error(status)
    }
}

impl From<ScriptedStatus> for ScriptedResponse {
    fn from(status: ScriptedStatus) -> Self {
        ScriptedResponse::Error(status.to_status())
    }
}

// ============================================================================
// Response sequence
// ============================================================================

fn split(v: u64) -> (u32, u32) {
    ((v >> 32) as u32, v as u32)
}

fn join(resp_idx: u32, repeat_idx: u32) -> u64 {
    (u64::from(resp_idx) << 32) | u64::from(repeat_idx)
}

/// Step to the next response.
///
/// Once every response is used the cursor rests at `response_count`, so a
/// response appended later is the next one served.
fn advance(
    (resp_idx, repeat_idx): (u32, u32),
    response_count: u32,
    repeat_count: u32,
) -> (u32, u32) {
    if resp_idx >= response_count {
        return (response_count, 0);
    }
    let repeat_idx = repeat_idx.saturating_add(1);
    if repeat_idx >= repeat_count {
        (resp_idx + 1, 0)
    } else {
        (resp_idx, repeat_idx)
    }
}

#[derive(Debug, Clone)]
struct SequencedResponse {
    response: ScriptedResponse,
    repeat: u32,
}

/// Ordered responses consumed one per evaluation.
///
/// The cursor packs the response index and the repeat index into one
/// `AtomicU64` so concurrent evaluations never observe a torn position.
#[derive(Default)]
pub struct ResponseSequence {
    entries: RwLock<Vec<SequencedResponse>>,
    cursor: AtomicU64,
}

impl ResponseSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: ScriptedResponse) {
        self.entries.write().push(SequencedResponse {
            response,
            repeat: 1,
        });
    }

    /// Serve the most recently pushed response `times` times before moving on.
    pub fn repeat_last(&self, times: u32) {
        if let Some(last) = self.entries.write().last_mut() {
            last.repeat = times.max(1);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Take the current response and advance.
    ///
    /// Past the end the last response is served again.
    pub fn next_response(&self) -> Option<ScriptedResponse> {
        let entries = self.entries.read();
        if entries.is_empty() {
            return None;
        }
        let count = entries.len() as u32;
        let old = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                let (resp_idx, repeat_idx) = split(v);
                let repeat_count = entries
                    .get(resp_idx as usize)
                    .map_or(1, |entry| entry.repeat.max(1));
                let (resp_idx, repeat_idx) = advance((resp_idx, repeat_idx), count, repeat_count);
                Some(join(resp_idx, repeat_idx))
            })
            .unwrap_or_else(|v| v);
        let idx = (split(old).0).min(count - 1) as usize;
        Some(entries[idx].response.clone())
    }

    pub fn reset(&self) {
        self.cursor.store(0, Ordering::Relaxed);
    }
}

impl fmt::Debug for ResponseSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (response_idx, repeat_idx) = split(self.cursor.load(Ordering::Relaxed));
        f.debug_struct("ResponseSequence")
            .field("responses", &self.len())
            .field("response_idx", &response_idx)
            .field("repeat_idx", &repeat_idx)
            .finish()
    }
}

// ============================================================================
// Request stub
// ============================================================================

/// A registered expectation: method, optional matcher, scripted responses.
///
/// A stub without a matcher answers every request to its method.
#[derive(Debug)]
pub struct RequestStub {
    method: String,
    matcher: Option<RequestMatcher>,
    responses: ResponseSequence,
}

impl RequestStub {
    /// Start a stub for a gRPC method path such as `/hello.Hello/Hello`.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            matcher: None,
            responses: ResponseSequence::new(),
        }
    }

    pub fn with(mut self, matcher: impl Into<RequestMatcher>) -> Self {
        self.matcher = Some(matcher.into());
        self
    }

    pub fn returns(self, response: impl Into<ScriptedResponse>) -> Self {
        self.responses.push(response.into());
        self
    }

    pub fn raises(self, status: impl Into<Status>) -> Self {
        self.responses.push(ScriptedResponse::Error(status.into()));
        self
    }

    pub fn responds_with<F>(self, f: F) -> Self
    where
        F: Fn(&RequestPayload, &CallView) -> Result<Value, Status> + Send + Sync + 'static,
    {
        self.responses.push(ScriptedResponse::dynamic(f));
        self
    }

    /// Repeat the last scripted response `n` times before the next one.
    pub fn times(self, n: u32) -> Self {
        self.responses.repeat_last(n);
        self
    }

    /// Append a response to a stub that is already registered.
    pub fn then_return(&self, response: impl Into<ScriptedResponse>) -> &Self {
        self.responses.push(response.into());
        self
    }

    /// Append an error to a stub that is already registered.
    pub fn then_raise(&self, status: impl Into<Status>) -> &Self {
        self.responses.push(ScriptedResponse::Error(status.into()));
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn matcher(&self) -> Option<&RequestMatcher> {
        self.matcher.as_ref()
    }

    pub fn response_count(&self) -> usize {
        self.responses.len()
    }

    pub fn matches(&self, method: &str, payload: &RequestPayload) -> bool {
        self.method == method && self.matcher.as_ref().is_none_or(|m| m.matches(payload))
    }

    /// Produce the next scripted answer for a matched call.
    pub fn evaluate(&self, payload: &RequestPayload, view: &CallView) -> Result<Value, MockError> {
        let response = self
            .responses
            .next_response()
            .ok_or_else(|| MockError::UnscriptedStub {
                method: self.method.clone(),
            })?;
        response.evaluate(payload, view)
    }
}
