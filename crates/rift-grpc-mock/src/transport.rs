//! The real-transport seam the mock adapter decorates.
//!
//! [`GrpcTransport`] exposes the four gRPC call shapes the way generated
//! tonic clients drive them. [`TonicTransport`] is the production
//! implementation over a `tonic` channel.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request, Response, Status};

/// Stream of outgoing request messages.
pub type RequestStream<T> = BoxStream<'static, T>;

/// Stream of incoming response messages.
pub type ResponseStream<T> = BoxStream<'static, Result<T, Status>>;

/// Messages a transport can encode and decode.
pub trait GrpcMessage: prost::Message + Default + 'static {}

impl<T> GrpcMessage for T where T: prost::Message + Default + 'static {}

/// A gRPC transport addressing one target.
#[async_trait]
pub trait GrpcTransport: Send + Sync {
    /// The endpoint calls go to, e.g. `localhost:50051`.
    fn target(&self) -> &str;

    async fn unary<Req, Resp>(
        &self,
        method: &str,
        request: Request<Req>,
    ) -> Result<Response<Resp>, Status>
    where
        Req: GrpcMessage,
        Resp: GrpcMessage;

    async fn client_streaming<Req, Resp>(
        &self,
        method: &str,
        requests: Request<RequestStream<Req>>,
    ) -> Result<Response<Resp>, Status>
    where
        Req: GrpcMessage,
        Resp: GrpcMessage;

    async fn server_streaming<Req, Resp>(
        &self,
        method: &str,
        request: Request<Req>,
    ) -> Result<Response<ResponseStream<Resp>>, Status>
    where
        Req: GrpcMessage,
        Resp: GrpcMessage;

    async fn streaming<Req, Resp>(
        &self,
        method: &str,
        requests: Request<RequestStream<Req>>,
    ) -> Result<Response<ResponseStream<Resp>>, Status>
    where
        Req: GrpcMessage,
        Resp: GrpcMessage;
}

/// Transport over a tonic [`Channel`] using the prost codec.
#[derive(Clone)]
pub struct TonicTransport {
    target: String,
    inner: tonic::client::Grpc<Channel>,
}

impl TonicTransport {
    pub fn new(target: impl Into<String>, channel: Channel) -> Self {
        Self {
            target: target.into(),
            inner: tonic::client::Grpc::new(channel),
        }
    }

    /// Build a transport whose channel connects on first use.
    ///
    /// Targets without a scheme are dialed over plain HTTP/2.
    pub fn connect_lazy(target: impl Into<String>) -> Result<Self, tonic::transport::Error> {
        let target = target.into();
        let uri = if target.contains("://") {
            target.clone()
        } else {
            format!("http://{target}")
        };
        let channel = Endpoint::from_shared(uri)?.connect_lazy();
        Ok(Self::new(target, channel))
    }

    async fn ready_client(&self) -> Result<tonic::client::Grpc<Channel>, Status> {
        let mut client = self.inner.clone();
        client
            .ready()
            .await
            .map_err(|e| Status::new(Code::Unknown, format!("Service was not ready: {e}")))?;
        Ok(client)
    }
}

impl std::fmt::Debug for TonicTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TonicTransport")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

fn method_path(method: &str) -> Result<PathAndQuery, Status> {
    method
        .parse::<PathAndQuery>()
        .map_err(|e| Status::internal(format!("invalid gRPC method path '{method}': {e}")))
}

#[async_trait]
impl GrpcTransport for TonicTransport {
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
        let path = method_path(method)?;
        let mut client = self.ready_client().await?;
        client
            .unary(request, path, ProstCodec::<Req, Resp>::default())
            .await
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
        let path = method_path(method)?;
        let mut client = self.ready_client().await?;
        client
            .client_streaming(requests, path, ProstCodec::<Req, Resp>::default())
            .await
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
        let path = method_path(method)?;
        let mut client = self.ready_client().await?;
        let response = client
            .server_streaming(request, path, ProstCodec::<Req, Resp>::default())
            .await?;
        Ok(response.map(|stream| stream.boxed()))
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
        let path = method_path(method)?;
        let mut client = self.ready_client().await?;
        let response = client
            .streaming(requests, path, ProstCodec::<Req, Resp>::default())
            .await?;
        Ok(response.map(|stream| stream.boxed()))
    }
}
