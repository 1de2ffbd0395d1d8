//! Shared fixtures: `Hello` messages and a fake transport that records calls.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use prost::Message;
use rift_grpc_mock::{
    CallOptions, CallShape, GrpcMessage, GrpcTransport, MockContext, MockError, MockedClient,
    RequestStream, ResponseStream,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status};

pub const HELLO: &str = "/hello.Hello/Hello";
pub const HELLO_CLIENT_STREAM: &str = "/hello.Hello/HelloClientStream";
pub const HELLO_SERVER_STREAM: &str = "/hello.Hello/HelloServerStream";
pub const HELLO_STREAM: &str = "/hello.Hello/HelloStream";

pub const ALL_SHAPES: [CallShape; 4] = [
    CallShape::Unary,
    CallShape::ClientStreaming,
    CallShape::ServerStreaming,
    CallShape::BidiStreaming,
];

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct HelloRequest {
    #[prost(string, tag = "1")]
    #[serde(default)]
    pub msg: String,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct HelloResponse {
    #[prost(string, tag = "1")]
    #[serde(default)]
    pub msg: String,
}

pub fn hello(msg: &str) -> HelloRequest {
    HelloRequest {
        msg: msg.to_string(),
    }
}

/// One call that reached the fake server.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub shape: CallShape,
    pub method: String,
    pub requests: Vec<String>,
    pub user: Option<String>,
    pub has_deadline: bool,
}

/// Fake transport: records calls and either replies or fails like a closed port.
pub struct RecordingTransport {
    target: String,
    reply: HelloResponse,
    failure: Option<Status>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingTransport {
    /// A server at `target` that answers every call with `from server`.
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            reply: HelloResponse {
                msg: "from server".to_string(),
            },
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Nothing listens at `target`.
    pub fn unreachable(target: &str) -> Self {
        Self {
            failure: Some(Status::unavailable("failed to connect to all addresses")),
            ..Self::new(target)
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    fn record<Req: GrpcMessage>(
        &self,
        shape: CallShape,
        method: &str,
        metadata: &MetadataMap,
        requests: &[Req],
    ) {
        let requests = requests
            .iter()
            .map(|r| {
                HelloRequest::decode(r.encode_to_vec().as_slice())
                    .map(|h| h.msg)
                    .unwrap_or_default()
            })
            .collect();
        self.calls.lock().push(RecordedCall {
            shape,
            method: method.to_string(),
            requests,
            user: metadata
                .get("x-user")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            has_deadline: metadata.get("grpc-timeout").is_some(),
        });
    }

    fn reply<Resp: GrpcMessage>(&self) -> Result<Resp, Status> {
        if let Some(status) = &self.failure {
            return Err(status.clone());
        }
        Resp::decode(self.reply.encode_to_vec().as_slice()).map_err(|e| Status::internal(e.to_string()))
    }
}

#[async_trait]
impl GrpcTransport for RecordingTransport {
    fn target(&self) -> &str {
        &self.target
    }

    async fn unary<Req, Resp>(
        &self,
        method: &str,
        request: Request<Req>,
    ) -> Result<Response<Resp>, Status>
    where
        Req: GrpcMessage,
        Resp: GrpcMessage,
    {
        let (metadata, _, message) = request.into_parts();
        self.record(CallShape::Unary, method, &metadata, &[message]);
        self.reply().map(Response::new)
    }

    async fn client_streaming<Req, Resp>(
        &self,
        method: &str,
        requests: Request<RequestStream<Req>>,
    ) -> Result<Response<Resp>, Status>
    where
        Req: GrpcMessage,
        Resp: GrpcMessage,
    {
        let (metadata, _, requests) = requests.into_parts();
        let requests: Vec<Req> = requests.collect().await;
        self.record(CallShape::ClientStreaming, method, &metadata, &requests);
        self.reply().map(Response::new)
    }

    async fn server_streaming<Req, Resp>(
        &self,
        method: &str,
        request: Request<Req>,
    ) -> Result<Response<ResponseStream<Resp>>, Status>
    where
        Req: GrpcMessage,
        Resp: GrpcMessage,
    {
        let (metadata, _, message) = request.into_parts();
        self.record(CallShape::ServerStreaming, method, &metadata, &[message]);
        let reply: Resp = self.reply()?;
        Ok(Response::new(stream::iter(vec![Ok(reply)]).boxed()))
    }

    async fn streaming<Req, Resp>(
        &self,
        method: &str,
        requests: Request<RequestStream<Req>>,
    ) -> Result<Response<ResponseStream<Resp>>, Status>
    where
        Req: GrpcMessage,
        Resp: GrpcMessage,
    {
        let (metadata, _, requests) = requests.into_parts();
        let requests: Vec<Req> = requests.collect().await;
        self.record(CallShape::BidiStreaming, method, &metadata, &requests);
        let reply: Resp = self.reply()?;
        Ok(Response::new(stream::iter(vec![Ok(reply)]).boxed()))
    }
}

/// Enabled context with net connect allowed, like a fresh test setup.
pub fn enabled_context() -> Arc<MockContext> {
    let context = Arc::new(MockContext::new());
    context.enable();
    context.allow_net_connect();
    context
}

/// A client for a server that is not running.
pub fn hello_client(target: &str, context: &Arc<MockContext>) -> MockedClient<RecordingTransport> {
    MockedClient::new(RecordingTransport::unreachable(target), Arc::clone(context))
}

/// Send one `msg` with the given call shape and collect the reply messages.
pub async fn send_message(
    client: &MockedClient<RecordingTransport>,
    msg: &str,
    shape: CallShape,
    options: CallOptions,
) -> Result<Vec<String>, MockError> {
    match shape {
        CallShape::Unary => {
            let reply: HelloResponse = client
                .unary(HELLO, hello(msg), options)
                .await?
                .into_result()
                .await?;
            Ok(vec![reply.msg])
        }
        CallShape::ClientStreaming => {
            let reply: HelloResponse = client
                .client_streaming(HELLO_CLIENT_STREAM, stream::iter(vec![hello(msg)]), options)
                .await?
                .into_result()
                .await?;
            Ok(vec![reply.msg])
        }
        CallShape::ServerStreaming => {
            let replies: ResponseStream<HelloResponse> = client
                .server_streaming(HELLO_SERVER_STREAM, hello(msg), options)
                .await?
                .into_result()
                .await?;
            collect_replies(replies).await
        }
        CallShape::BidiStreaming => {
            let replies: ResponseStream<HelloResponse> = client
                .bidi_streaming(HELLO_STREAM, stream::iter(vec![hello(msg)]), options)
                .await?
                .into_result()
                .await?;
            collect_replies(replies).await
        }
    }
}

pub async fn collect_replies(
    replies: ResponseStream<HelloResponse>,
) -> Result<Vec<String>, MockError> {
    let replies: Vec<Result<HelloResponse, Status>> = replies.collect().await;
    replies
        .into_iter()
        .map(|r| r.map(|reply| reply.msg).map_err(MockError::from))
        .collect()
}

pub fn is_unavailable(result: &Result<Vec<String>, MockError>) -> bool {
    matches!(result, Err(e) if e.status().map(Status::code) == Some(tonic::Code::Unavailable))
}

pub fn is_blocked(result: &Result<Vec<String>, MockError>) -> bool {
    matches!(result, Err(e) if e.is_net_connect_not_allowed())
}
