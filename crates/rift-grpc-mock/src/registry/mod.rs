//! Stub registry: register expectations and resolve intercepted calls.
//!
//! - `payload` - JSON projection of a single or streamed request
//! - `matcher` - request matchers (equals, including, predicate)
//! - `stub` - request stubs and scripted response sequences

mod matcher;
mod payload;
mod stub;

pub use matcher::{MatchPredicate, RequestMatcher};
pub use payload::RequestPayload;
pub use stub::{
    code_from_name, RequestStub, ResponseFn, ResponseSequence, ScriptedResponse, ScriptedStatus,
};

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Registered stubs, newest first.
#[derive(Debug, Default)]
pub struct StubRegistry {
    stubs: RwLock<Vec<Arc<RequestStub>>>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stub; it takes precedence over earlier matching stubs.
    ///
    /// The returned handle can still append responses.
    pub fn register(&self, stub: RequestStub) -> Arc<RequestStub> {
        let stub = Arc::new(stub);
        debug!(method = %stub.method(), responses = stub.response_count(), "Registered stub");
        self.stubs.write().insert(0, Arc::clone(&stub));
        stub
    }

    /// Most recently registered stub matching the call, if any.
    ///
    /// Matchers run on a snapshot, so a predicate may register stubs itself.
    pub fn resolve(&self, method: &str, payload: &RequestPayload) -> Option<Arc<RequestStub>> {
        let snapshot = self.stubs.read().clone();
        snapshot
            .into_iter()
            .find(|stub| stub.matches(method, payload))
    }

    pub fn reset(&self) {
        self.stubs.write().clear();
    }

    pub fn len(&self) -> usize {
        self.stubs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.read().is_empty()
    }
}
