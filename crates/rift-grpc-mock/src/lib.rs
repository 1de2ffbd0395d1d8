//! Rift gRPC mock: stub outgoing gRPC client calls in tests.
//!
//! Wrap a real transport in a [`MockedClient`] that shares an
//! `Arc<MockContext>` with the test. While the context is enabled, calls are
//! answered from registered [`RequestStub`]s; calls no stub answers reach the
//! network only when the context's [`NetConnectConfig`] allows the target.

pub mod adapter;
pub mod call;
pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod permission;
pub mod registry;
pub mod transport;

pub use adapter::MockedClient;
pub use call::{CallOptions, CallShape, CallView, Invocation, MockedCall, Operation, RequestArity};
pub use config::MockConfig;
pub use context::MockContext;
pub use error::MockError;
pub use permission::{is_connection_allowed, AllowSpec, NetConnectConfig, TargetUri};
pub use registry::{
    RequestMatcher, RequestPayload, RequestStub, ScriptedResponse, ScriptedStatus, StubRegistry,
};
pub use transport::{GrpcMessage, GrpcTransport, RequestStream, ResponseStream, TonicTransport};
