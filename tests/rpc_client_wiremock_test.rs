//! RPC client tests against a non-conforming server
//!
//! Uses a `wiremock` mock server to feed the client responses a real
//! Lockstep server would never produce, verifying that contract violations
//! are classified as protocol errors rather than panics or misreported
//! invocation failures.

use std::time::Duration;

use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use lockstep::rpc::{CallFailure, RpcClient};

fn client_for(uri: &str) -> RpcClient {
    let url = url::Url::parse(&format!("{}/rpc", uri)).expect("mock url");
    RpcClient::new("mock", url, Duration::from_secs(2))
}

#[tokio::test]
async fn test_non_json_body_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("this is not json"))
        .mount(&server)
        .await;

    let failure = client_for(&server.uri()).ping().await.unwrap_err();
    assert!(matches!(failure, CallFailure::Protocol(_)));
}

#[tokio::test]
async fn test_mismatched_response_id_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            br#"{"jsonrpc":"2.0","id":999,"result":{}}"#.to_vec(),
            "application/json",
        ))
        .mount(&server)
        .await;

    let failure = client_for(&server.uri()).ping().await.unwrap_err();
    match failure {
        CallFailure::Protocol(message) => assert!(message.contains("does not match")),
        other => panic!("expected protocol error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_error_without_kind_tag_is_protocol_error() {
    let server = MockServer::start().await;
    // A generic JSON-RPC error that is not part of the invocation failure
    // taxonomy must not masquerade as one.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32603,"message":"internal error"}}"#
                .to_vec(),
            "application/json",
        ))
        .mount(&server)
        .await;

    let failure = client_for(&server.uri()).ping().await.unwrap_err();
    match failure {
        CallFailure::Protocol(message) => assert!(message.contains("-32603")),
        other => panic!("expected protocol error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_neither_result_nor_error_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            br#"{"jsonrpc":"2.0","id":1}"#.to_vec(),
            "application/json",
        ))
        .mount(&server)
        .await;

    let failure = client_for(&server.uri()).ping().await.unwrap_err();
    match failure {
        CallFailure::Protocol(message) => {
            assert!(message.contains("neither result nor error"))
        }
        other => panic!("expected protocol error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delayed_response_is_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(30))
                .set_body_raw(
                    br#"{"jsonrpc":"2.0","id":1,"result":{}}"#.to_vec(),
                    "application/json",
                ),
        )
        .mount(&server)
        .await;

    let url = url::Url::parse(&format!("{}/rpc", server.uri())).unwrap();
    let client = RpcClient::new("slow", url, Duration::from_millis(300));
    let failure = client.ping().await.unwrap_err();
    assert!(matches!(failure, CallFailure::Timeout { .. }));
}
