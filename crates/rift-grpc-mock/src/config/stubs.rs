//! Stub definitions loaded from configuration.

use crate::registry::{RequestMatcher, RequestStub, ScriptedStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stub as written in a config file
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StubDefinition {
    /// gRPC method path, e.g. `/hello.Hello/Hello`
    pub method: String,

    /// Request predicate; absent matches any request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestPredicate>,

    #[serde(default)]
    pub responses: Vec<ResponseDefinition>,
}

/// Request predicate: exactly one of `equals` or `including`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPredicate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub including: Option<Value>,
}

/// Scripted response: exactly one of `is` or `error`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDefinition {
    /// Response message as JSON; an array streams one message per element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ScriptedStatus>,

    /// Times to serve this response before moving to the next one
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

fn default_repeat() -> u32 {
    1
}

/// Whether `method` looks like `/package.Service/Method`.
pub fn is_method_path(method: &str) -> bool {
    let Some(path) = method.strip_prefix('/') else {
        return false;
    };
    let mut parts = path.split('/');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(service), Some(name), None) if !service.is_empty() && !name.is_empty()
    )
}

impl RequestPredicate {
    pub fn to_matcher(&self) -> Option<RequestMatcher> {
        match (&self.equals, &self.including) {
            (Some(expected), _) => Some(RequestMatcher::Equals(expected.clone())),
            (None, Some(expected)) => Some(RequestMatcher::Including(expected.clone())),
            (None, None) => None,
        }
    }
}

impl StubDefinition {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !is_method_path(&self.method) {
            anyhow::bail!(
                "Invalid stub method '{}'. Expected a gRPC path like '/package.Service/Method'",
                self.method
            );
        }

        if let Some(ref request) = self.request {
            if request.equals.is_some() == request.including.is_some() {
                anyhow::bail!(
                    "Stub '{}': request must set exactly one of 'equals' or 'including'",
                    self.method
                );
            }
        }

        for (i, response) in self.responses.iter().enumerate() {
            if response.is.is_some() == response.error.is_some() {
                anyhow::bail!(
                    "Stub '{}' response {}: set exactly one of 'is' or 'error'",
                    self.method,
                    i
                );
            }
            if response.repeat == 0 {
                anyhow::bail!(
                    "Stub '{}' response {}: repeat must be at least 1",
                    self.method,
                    i
                );
            }
        }

        Ok(())
    }

    pub fn to_stub(&self) -> RequestStub {
        let mut stub = RequestStub::new(&self.method);
        if let Some(matcher) = self.request.as_ref().and_then(RequestPredicate::to_matcher) {
            stub = stub.with(matcher);
        }
        for response in &self.responses {
            stub = match (&response.is, &response.error) {
                (Some(value), _) => stub.returns(value.clone()),
                (None, Some(status)) => stub.raises(status.to_status()),
                (None, None) => continue,
            };
            if response.repeat > 1 {
                stub = stub.times(response.repeat);
            }
        }
        stub
    }
}
