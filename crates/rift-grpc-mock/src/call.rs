//! Synthetic call objects handed out for stubbed calls.
//!
//! - `CallOptions`: metadata, timeout and the deferred-operation flag
//! - `MockedCall`: per-invocation stand-in for the transport call
//! - `CallView`: what a scripted evaluator can see of the call
//! - `Operation`: deferred handle, evaluated on `execute`
//! - `Invocation`: either a ready result or an operation

use crate::error::MockError;
use futures::future::BoxFuture;
use futures::Future;
use std::fmt;
use std::time::Duration;
use tonic::metadata::MetadataMap;
use tonic::Request;

/// The four gRPC call shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallShape {
    Unary,
    ClientStreaming,
    ServerStreaming,
    BidiStreaming,
}

impl CallShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallShape::Unary => "unary",
            CallShape::ClientStreaming => "client_streaming",
            CallShape::ServerStreaming => "server_streaming",
            CallShape::BidiStreaming => "bidi_streaming",
        }
    }

    /// Whether the caller sends a stream of requests.
    pub fn streams_requests(&self) -> bool {
        matches!(self, CallShape::ClientStreaming | CallShape::BidiStreaming)
    }
}

impl fmt::Display for CallShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call options supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub metadata: MetadataMap,
    /// Forwarded as the gRPC deadline on pass-through; ignored by stubs.
    pub timeout: Option<Duration>,
    /// Return an [`Operation`] instead of the result.
    pub return_op: bool,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, metadata: MetadataMap) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn as_operation(mut self) -> Self {
        self.return_op = true;
        self
    }

    /// Wrap `message` in a request carrying these options.
    pub fn to_request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        *request.metadata_mut() = self.metadata.clone();
        if let Some(timeout) = self.timeout {
            request.set_timeout(timeout);
        }
        request
    }
}

/// Request arity exposed by a [`CallView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestArity {
    Single,
    Multi,
}

/// Read-only view of a mocked call for scripted evaluators.
#[derive(Debug, Clone)]
pub struct CallView {
    shape: CallShape,
    arity: RequestArity,
    metadata: MetadataMap,
    timeout: Option<Duration>,
}

impl CallView {
    pub fn shape(&self) -> CallShape {
        self.shape
    }

    pub fn arity(&self) -> RequestArity {
        self.arity
    }

    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// ASCII metadata value by key, if present and valid UTF-8.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.to_str().ok())
    }
}

/// Stand-in for the transport call object of one intercepted invocation.
#[derive(Debug)]
pub struct MockedCall {
    shape: CallShape,
    metadata: MetadataMap,
    timeout: Option<Duration>,
}

impl MockedCall {
    pub fn new(shape: CallShape, options: &CallOptions) -> Self {
        Self {
            shape,
            metadata: options.metadata.clone(),
            timeout: options.timeout,
        }
    }

    pub fn shape(&self) -> CallShape {
        self.shape
    }

    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    pub fn single_req_view(&self) -> CallView {
        self.view(RequestArity::Single)
    }

    pub fn multi_req_view(&self) -> CallView {
        self.view(RequestArity::Multi)
    }

    /// View matching the request arity of this call's shape.
    pub fn view_for_shape(&self) -> CallView {
        if self.shape.streams_requests() {
            self.multi_req_view()
        } else {
            self.single_req_view()
        }
    }

    /// Deferred handle that runs `execute` only when asked to.
    pub fn operation<T, F>(&self, execute: F) -> Operation<T>
    where
        F: Future<Output = Result<T, MockError>> + Send + 'static,
    {
        Operation::new(self.metadata.clone(), self.timeout, execute)
    }

    fn view(&self, arity: RequestArity) -> CallView {
        CallView {
            shape: self.shape,
            arity,
            metadata: self.metadata.clone(),
            timeout: self.timeout,
        }
    }
}

/// A call that has not run yet.
///
/// Nothing is evaluated until [`Operation::execute`] is awaited, and then on
/// the caller's task.
pub struct Operation<T> {
    metadata: MetadataMap,
    timeout: Option<Duration>,
    execute: BoxFuture<'static, Result<T, MockError>>,
}

impl<T> Operation<T> {
    pub fn new<F>(metadata: MetadataMap, timeout: Option<Duration>, execute: F) -> Self
    where
        F: Future<Output = Result<T, MockError>> + Send + 'static,
    {
        Self {
            metadata,
            timeout,
            execute: Box::pin(execute),
        }
    }

    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run the call and return its result.
    pub async fn execute(self) -> Result<T, MockError> {
        self.execute.await
    }
}

impl<T> fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("metadata", &self.metadata)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Result of an intercepted call: ready, or deferred when
/// [`CallOptions::return_op`] was set.
#[derive(Debug)]
pub enum Invocation<T> {
    Ready(T),
    Deferred(Operation<T>),
}

impl<T> Invocation<T> {
    /// Resolve to the call result, executing a deferred operation.
    pub async fn into_result(self) -> Result<T, MockError> {
        match self {
            Invocation::Ready(value) => Ok(value),
            Invocation::Deferred(operation) => operation.execute().await,
        }
    }

    pub fn into_ready(self) -> Option<T> {
        match self {
            Invocation::Ready(value) => Some(value),
            Invocation::Deferred(_) => None,
        }
    }

    pub fn into_operation(self) -> Option<Operation<T>> {
        match self {
            Invocation::Ready(_) => None,
            Invocation::Deferred(operation) => Some(operation),
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Invocation::Deferred(_))
    }
}
