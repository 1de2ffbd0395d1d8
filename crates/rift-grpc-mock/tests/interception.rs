//! Interception across the four call shapes: pass-through, blocking and the
//! allow-list variants, mirrored for every shape.

mod common;

use common::*;
use regex::Regex;
use rift_grpc_mock::{
    AllowSpec, CallOptions, CallShape, MockContext, MockError, MockedClient, RequestStub,
};
use std::sync::Arc;
use tracing_test::traced_test;

async fn send_all(client: &MockedClient<RecordingTransport>) -> Vec<Result<Vec<String>, MockError>> {
    let mut results = Vec::new();
    for shape in ALL_SHAPES {
        results.push(send_message(client, "hello!", shape, CallOptions::new()).await);
    }
    results
}

async fn assert_all_pass_through(client: &MockedClient<RecordingTransport>) {
    for (shape, result) in ALL_SHAPES.iter().zip(send_all(client).await) {
        assert!(is_unavailable(&result), "{shape}: expected Unavailable, got {result:?}");
    }
    assert_eq!(client.transport().calls().len(), ALL_SHAPES.len());
}

async fn assert_all_blocked(client: &MockedClient<RecordingTransport>) {
    for (shape, result) in ALL_SHAPES.iter().zip(send_all(client).await) {
        assert!(is_blocked(&result), "{shape}: expected NetConnectNotAllowed, got {result:?}");
    }
    assert!(client.transport().calls().is_empty());
}

fn blocked_except(target: &str, allow: Option<AllowSpec>) -> MockedClient<RecordingTransport> {
    let context = enabled_context();
    context.disable_net_connect(false, allow);
    hello_client(target, &context)
}

#[tokio::test]
async fn test_net_connect_allowed_reaches_server() {
    let client = hello_client("localhost:8000", &enabled_context());
    assert_all_pass_through(&client).await;
}

#[tokio::test]
async fn test_disabled_mocking_is_transparent() {
    let context = Arc::new(MockContext::new());
    context.disable_net_connect(false, None);
    context.register(RequestStub::new(HELLO).returns(serde_json::json!({"msg": "stub"})));

    let client = MockedClient::new(RecordingTransport::new("example.com:8000"), context);
    for shape in ALL_SHAPES {
        let replies = send_message(&client, "hello!", shape, CallOptions::new())
            .await
            .unwrap();
        assert_eq!(replies, vec!["from server"]);
    }

    let calls = client.transport().calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(
        calls.iter().map(|c| c.shape).collect::<Vec<_>>(),
        ALL_SHAPES.to_vec()
    );
    assert!(calls.iter().all(|c| c.requests == vec!["hello!"]));
}

#[tokio::test]
#[traced_test]
async fn test_disable_net_connect_blocks_every_shape() {
    let client = blocked_except("localhost:8000", None);
    assert_all_blocked(&client).await;
    assert!(logs_contain("Blocked real gRPC connection"));
}

#[tokio::test]
async fn test_blocked_error_names_method() {
    let client = blocked_except("localhost:8000", None);
    let err = send_message(&client, "hello!", CallShape::Unary, CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Real gRPC connections are disabled. /hello.Hello/Hello is requested"
    );
}

#[tokio::test]
async fn test_allow_after_disable_reaches_server() {
    let context = enabled_context();
    context.disable_net_connect(false, None);
    context.allow_net_connect();
    assert_all_pass_through(&hello_client("localhost:8000", &context)).await;
}

#[tokio::test]
async fn test_disable_allow_disable_blocks() {
    let context = enabled_context();
    context.disable_net_connect(false, None);
    context.allow_net_connect();
    context.disable_net_connect(false, None);
    assert_all_blocked(&hello_client("localhost:8000", &context)).await;
}

#[tokio::test]
async fn test_localhost_exception() {
    let context = enabled_context();
    context.disable_net_connect(true, None);

    assert_all_pass_through(&hello_client("localhost:8000", &context)).await;
    assert_all_blocked(&hello_client("example.com:8000", &context)).await;
}

#[tokio::test]
async fn test_allow_none_and_empty_list_block() {
    assert_all_blocked(&blocked_except("example.com:8000", None)).await;
    assert_all_blocked(&blocked_except("example.com:8000", Some(AllowSpec::Any(vec![])))).await;
}

#[tokio::test]
async fn test_allow_string() {
    assert_all_pass_through(&blocked_except("example.com:8000", Some("example.com".into()))).await;
    assert_all_pass_through(&blocked_except("example.com:8000", Some("example.com:8000".into()))).await;
    assert_all_blocked(&blocked_except("example.com:8000", Some("example.com:8888".into()))).await;
    assert_all_blocked(&blocked_except("example.com:8000", Some("exmple.com".into()))).await;
}

#[tokio::test]
async fn test_allow_list_of_strings() {
    let allowed = AllowSpec::Any(vec![
        AllowSpec::from("http://example.com:8000"),
        AllowSpec::from("foo.com"),
    ]);
    assert_all_pass_through(&blocked_except("example.com:8000", Some(allowed))).await;

    let denied = AllowSpec::Any(vec![AllowSpec::from("exmple.com"), AllowSpec::from("foo.com")]);
    assert_all_blocked(&blocked_except("example.com:8000", Some(denied))).await;
}

#[tokio::test]
async fn test_allow_list_of_predicates() {
    let allowed = AllowSpec::Any(vec![AllowSpec::predicate(|uri| uri.host().starts_with("ex"))]);
    assert_all_pass_through(&blocked_except("example.com:8000", Some(allowed))).await;

    let denied = AllowSpec::Any(vec![AllowSpec::predicate(|uri| uri.host().starts_with("ax"))]);
    assert_all_blocked(&blocked_except("example.com:8000", Some(denied))).await;
}

#[tokio::test]
async fn test_allow_list_of_patterns() {
    let allowed = AllowSpec::Any(vec![
        AllowSpec::from(Regex::new("ex").unwrap()),
        AllowSpec::from(Regex::new("foo").unwrap()),
    ]);
    assert_all_pass_through(&blocked_except("example.com:8000", Some(allowed))).await;

    let denied = AllowSpec::Any(vec![
        AllowSpec::from(Regex::new("ax").unwrap()),
        AllowSpec::from(Regex::new("foo").unwrap()),
    ]);
    assert_all_blocked(&blocked_except("example.com:8000", Some(denied))).await;
}

#[tokio::test]
async fn test_pass_through_forwards_metadata_and_deadline() {
    let mut metadata = tonic::metadata::MetadataMap::new();
    metadata.insert("x-user", "alice".parse().unwrap());
    let options = CallOptions::new()
        .with_metadata(metadata)
        .with_timeout(std::time::Duration::from_millis(100));

    let client = hello_client("localhost:8000", &enabled_context());
    let _ = send_message(&client, "hello!", CallShape::ClientStreaming, options).await;

    let calls = client.transport().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, HELLO_CLIENT_STREAM);
    assert_eq!(calls[0].user.as_deref(), Some("alice"));
    assert!(calls[0].has_deadline);
}
