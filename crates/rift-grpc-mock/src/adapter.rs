//! Call-interception adapter.
//!
//! [`MockedClient`] wraps a real [`GrpcTransport`] and routes every call:
//!
//! 1. Mocking disabled: forward to the transport untouched.
//! 2. Drain streamed requests, then resolve a stub for the method.
//! 3. Stub found: answer from its scripted responses, never touching the
//!    network.
//! 4. No stub: forward if the connection policy allows the transport's
//!    target, otherwise fail with [`MockError::NetConnectNotAllowed`].
//!
//! Drained request streams are replayed from a buffer on pass-through, so the
//! real server sees every request but not incrementally.

use crate::call::{CallOptions, CallShape, Invocation, MockedCall, Operation};
use crate::context::MockContext;
use crate::error::MockError;
use crate::metrics::{record_call, Disposition};
use crate::permission::is_connection_allowed;
use crate::registry::{RequestPayload, RequestStub};
use crate::transport::{GrpcMessage, GrpcTransport, ResponseStream};
use futures::{stream, Future, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// A gRPC client whose calls go through the mock context first.
pub struct MockedClient<T> {
    transport: Arc<T>,
    context: Arc<MockContext>,
}

impl<T> Clone for MockedClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            context: Arc::clone(&self.context),
        }
    }
}

impl<T> std::fmt::Debug for MockedClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockedClient")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl<T> MockedClient<T>
where
    T: GrpcTransport + 'static,
{
    pub fn new(transport: T, context: Arc<MockContext>) -> Self {
        Self {
            transport: Arc::new(transport),
            context,
        }
    }

    pub fn context(&self) -> &Arc<MockContext> {
        &self.context
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn unary<Req, Resp>(
        &self,
        method: &str,
        request: Req,
        options: CallOptions,
    ) -> Result<Invocation<Resp>, MockError>
    where
        Req: GrpcMessage + Serialize,
        Resp: GrpcMessage + DeserializeOwned,
    {
        let shape = CallShape::Unary;
        if self.context.is_enabled() {
            let payload = RequestPayload::single(&request)?;
            if let Some(stubbed) = self.route(method, shape, payload, &options)? {
                return stubbed.answer(options.return_op, decode_message::<Resp>).await;
            }
        } else {
            record_call(method, shape, Disposition::Passthrough);
        }

        let transport = Arc::clone(&self.transport);
        let method = method.to_string();
        let request = options.to_request(request);
        settle(&options, async move {
            let response = transport.unary::<Req, Resp>(&method, request).await?;
            Ok(response.into_inner())
        })
        .await
    }

    pub async fn client_streaming<Req, Resp, S>(
        &self,
        method: &str,
        requests: S,
        options: CallOptions,
    ) -> Result<Invocation<Resp>, MockError>
    where
        Req: GrpcMessage + Serialize,
        Resp: GrpcMessage + DeserializeOwned,
        S: Stream<Item = Req> + Send + 'static,
    {
        let shape = CallShape::ClientStreaming;
        let requests = if self.context.is_enabled() {
            let drained: Vec<Req> = requests.collect().await;
            let payload = RequestPayload::multi(&drained)?;
            if let Some(stubbed) = self.route(method, shape, payload, &options)? {
                return stubbed.answer(options.return_op, decode_message::<Resp>).await;
            }
            stream::iter(drained).boxed()
        } else {
            record_call(method, shape, Disposition::Passthrough);
            requests.boxed()
        };

        let transport = Arc::clone(&self.transport);
        let method = method.to_string();
        let requests = options.to_request(requests);
        settle(&options, async move {
            let response = transport
                .client_streaming::<Req, Resp>(&method, requests)
                .await?;
            Ok(response.into_inner())
        })
        .await
    }

    pub async fn server_streaming<Req, Resp>(
        &self,
        method: &str,
        request: Req,
        options: CallOptions,
    ) -> Result<Invocation<ResponseStream<Resp>>, MockError>
    where
        Req: GrpcMessage + Serialize,
        Resp: GrpcMessage + DeserializeOwned,
    {
        let shape = CallShape::ServerStreaming;
        if self.context.is_enabled() {
            let payload = RequestPayload::single(&request)?;
            if let Some(stubbed) = self.route(method, shape, payload, &options)? {
                return stubbed.answer(options.return_op, decode_stream::<Resp>).await;
            }
        } else {
            record_call(method, shape, Disposition::Passthrough);
        }

        let transport = Arc::clone(&self.transport);
        let method = method.to_string();
        let request = options.to_request(request);
        settle(&options, async move {
            let response = transport
                .server_streaming::<Req, Resp>(&method, request)
                .await?;
            Ok(response.into_inner())
        })
        .await
    }

    pub async fn bidi_streaming<Req, Resp, S>(
        &self,
        method: &str,
        requests: S,
        options: CallOptions,
    ) -> Result<Invocation<ResponseStream<Resp>>, MockError>
    where
        Req: GrpcMessage + Serialize,
        Resp: GrpcMessage + DeserializeOwned,
        S: Stream<Item = Req> + Send + 'static,
    {
        let shape = CallShape::BidiStreaming;
        let requests = if self.context.is_enabled() {
            let drained: Vec<Req> = requests.collect().await;
            let payload = RequestPayload::multi(&drained)?;
            if let Some(stubbed) = self.route(method, shape, payload, &options)? {
                return stubbed.answer(options.return_op, decode_stream::<Resp>).await;
            }
            stream::iter(drained).boxed()
        } else {
            record_call(method, shape, Disposition::Passthrough);
            requests.boxed()
        };

        let transport = Arc::clone(&self.transport);
        let method = method.to_string();
        let requests = options.to_request(requests);
        settle(&options, async move {
            let response = transport.streaming::<Req, Resp>(&method, requests).await?;
            Ok(response.into_inner())
        })
        .await
    }

    /// Stub for the call, `None` to pass through, or the blocking error.
    fn route(
        &self,
        method: &str,
        shape: CallShape,
        payload: RequestPayload,
        options: &CallOptions,
    ) -> Result<Option<StubbedCall>, MockError> {
        if let Some(stub) = self.context.registry().resolve(method, &payload) {
            debug!(method, shape = %shape, requests = payload.len(), "Answering call from stub");
            record_call(method, shape, Disposition::Stubbed);
            return Ok(Some(StubbedCall {
                method: method.to_string(),
                stub,
                payload,
                call: MockedCall::new(shape, options),
            }));
        }

        let endpoint = self.transport.target();
        if is_connection_allowed(&self.context.net_connect_config(), endpoint) {
            debug!(method, shape = %shape, endpoint, "No stub matched, passing call through");
            record_call(method, shape, Disposition::Passthrough);
            Ok(None)
        } else {
            warn!(method, shape = %shape, endpoint, "Blocked real gRPC connection");
            record_call(method, shape, Disposition::Blocked);
            Err(MockError::NetConnectNotAllowed {
                method: method.to_string(),
            })
        }
    }
}

/// A call matched by a stub, ready to be answered.
struct StubbedCall {
    method: String,
    stub: Arc<RequestStub>,
    payload: RequestPayload,
    call: MockedCall,
}

impl StubbedCall {
    /// Evaluate the stub now, or hand back an operation that will.
    async fn answer<V, D>(self, return_op: bool, decode: D) -> Result<Invocation<V>, MockError>
    where
        V: Send + 'static,
        D: FnOnce(&str, Value) -> Result<V, MockError> + Send + 'static,
    {
        let StubbedCall {
            method,
            stub,
            payload,
            call,
        } = self;
        let view = call.view_for_shape();
        let evaluate = async move {
            let value = stub.evaluate(&payload, &view)?;
            decode(&method, value)
        };
        if return_op {
            Ok(Invocation::Deferred(call.operation(evaluate)))
        } else {
            evaluate.await.map(Invocation::Ready)
        }
    }
}

/// Run a pass-through call now, or wrap it in an operation.
async fn settle<V, F>(options: &CallOptions, execute: F) -> Result<Invocation<V>, MockError>
where
    F: Future<Output = Result<V, MockError>> + Send + 'static,
{
    if options.return_op {
        Ok(Invocation::Deferred(Operation::new(
            options.metadata.clone(),
            options.timeout,
            execute,
        )))
    } else {
        execute.await.map(Invocation::Ready)
    }
}

fn decode_message<Resp: DeserializeOwned>(method: &str, value: Value) -> Result<Resp, MockError> {
    serde_json::from_value(value).map_err(|source| MockError::ResponseDecode {
        method: method.to_string(),
        source,
    })
}

/// A JSON array streams element by element; anything else is one item.
fn decode_stream<Resp>(method: &str, value: Value) -> Result<ResponseStream<Resp>, MockError>
where
    Resp: DeserializeOwned + Send + 'static,
{
    let values = match value {
        Value::Array(values) => values,
        other => vec![other],
    };
    let messages = values
        .into_iter()
        .map(|value| decode_message::<Resp>(method, value))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(stream::iter(messages.into_iter().map(Ok)).boxed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Reply {
        msg: String,
    }

    #[tokio::test]
    async fn test_decode_stream_splits_arrays() {
        let stream = decode_stream::<Reply>("/m", json!([{"msg": "a"}, {"msg": "b"}])).unwrap();
        let replies: Vec<_> = stream.map(|r| r.unwrap().msg).collect().await;
        assert_eq!(replies, vec!["a", "b"]);

        let single = decode_stream::<Reply>("/m", json!({"msg": "only"})).unwrap();
        assert_eq!(single.count().await, 1);
    }

    #[test]
    fn test_decode_failure_names_method() {
        let err = decode_message::<Reply>("/hello.Hello/Hello", json!({"msg": 7})).unwrap_err();
        assert!(matches!(err, MockError::ResponseDecode { ref method, .. } if method == "/hello.Hello/Hello"));
    }
}
