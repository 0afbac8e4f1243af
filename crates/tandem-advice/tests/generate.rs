//! Integration tests for the advice client against an in-process fake
//! provider.

use axum::extract::Path;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tandem_advice::{AdviceClient, AdviceError};
use tokio::net::TcpListener;

async fn spawn_provider(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn generate_extracts_candidate_text() {
    let app = Router::new().route(
        "/v1beta/models/{*call}",
        post(|Path(call): Path<String>, Json(body): Json<Value>| async move {
            assert_eq!(call, "advisor-1:generateContent");
            let prompt = body["contents"][0]["parts"][0]["text"]
                .as_str()
                .unwrap_or_default();
            assert!(prompt.contains("Speaker 0"));
            Json(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "  Ask what blocked them this week.  "}]}
                }]
            }))
        }),
    );
    let addr = spawn_provider(app).await;

    let client = AdviceClient::new(format!("http://{addr}"), "test-key", "advisor-1");
    let text = client
        .generate("Conversation log:\nSpeaker 0: hello")
        .await
        .expect("generation should succeed");

    assert_eq!(text, "Ask what blocked them this week.");
}

#[tokio::test]
async fn provider_error_status_is_surfaced() {
    let app = Router::new().route(
        "/v1beta/models/{*call}",
        post(|| async { (axum::http::StatusCode::TOO_MANY_REQUESTS, "quota exceeded") }),
    );
    let addr = spawn_provider(app).await;

    let client = AdviceClient::new(format!("http://{addr}"), "test-key", "advisor-1");
    match client.generate("prompt").await {
        Err(AdviceError::Provider(detail)) => {
            assert!(detail.contains("429"), "detail was: {detail}")
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_candidates_are_an_error() {
    let app = Router::new().route(
        "/v1beta/models/{*call}",
        post(|| async { Json(json!({"candidates": []})) }),
    );
    let addr = spawn_provider(app).await;

    let client = AdviceClient::new(format!("http://{addr}"), "test-key", "advisor-1");
    assert!(matches!(
        client.generate("prompt").await,
        Err(AdviceError::EmptyResponse)
    ));
}

#[tokio::test]
async fn unreachable_provider_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = AdviceClient::new(format!("http://{addr}"), "test-key", "advisor-1");
    assert!(matches!(
        client.generate("prompt").await,
        Err(AdviceError::Http(_))
    ));
}
