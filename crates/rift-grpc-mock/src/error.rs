//! Error types surfaced to callers of intercepted gRPC calls.

use tonic::Status;

/// Errors returned by [`MockedClient`](crate::MockedClient) calls.
///
/// Scripted errors and real-transport errors both arrive as
/// [`MockError::Status`], so a test cannot tell a stubbed failure from a
/// network one. Only [`MockError::NetConnectNotAllowed`] is synthesized here.
#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("Real gRPC connections are disabled. {method} is requested")]
    NetConnectNotAllowed { method: String },

    #[error(transparent)]
    Status(#[from] Status),

    #[error("Stub for {method} matched but has no scripted response")]
    UnscriptedStub { method: String },

    #[error("Scripted response for {method} does not decode into the response type: {source}")]
    ResponseDecode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode message for matching: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },
}

impl MockError {
    /// The gRPC status carried by this error, if it is a status error.
    pub fn status(&self) -> Option<&Status> {
        match self {
            MockError::Status(status) => Some(status),
            _ => None,
        }
    }

    pub fn is_net_connect_not_allowed(&self) -> bool {
        matches!(self, MockError::NetConnectNotAllowed { .. })
    }
}
