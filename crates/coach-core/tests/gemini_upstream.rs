use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use coach_core::prompt::{COACH_SYSTEM_PROMPT, continue_prompt};
use coach_core::response::FALLBACK_TEXT;
use coach_core::{Core, Credential, GeminiUpstream, ProxyConfig};
use httpmock::prelude::*;
use serde_json::{Value, json};
use tower::ServiceExt;

const MODEL: &str = "test-model";
const API_KEY: &str = "test-key";
const GENERATE_PATH: &str = "/v1beta/models/test-model:generateContent";

fn config(base_url: String) -> ProxyConfig {
    ProxyConfig {
        model: MODEL.to_string(),
        base_url,
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        ..ProxyConfig::default()
    }
}

fn app(config: ProxyConfig, api_key: Option<&str>) -> axum::Router {
    let upstream = GeminiUpstream::new(&config).unwrap();
    let credential = Credential::from_optional(api_key.map(str::to_string));
    Core::new(config, credential, Arc::new(upstream)).router()
}

async fn post(app: axum::Router, body: Value) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method("POST")
        .uri("/api/ai")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn test_feedback_sends_key_header_and_system_instruction() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(GENERATE_PATH)
                .header("x-goog-api-key", API_KEY)
                .json_body(json!({
                    "contents": [{ "role": "user", "parts": [{ "text": "My essay." }] }],
                    "systemInstruction": { "parts": [{ "text": COACH_SYSTEM_PROMPT }] }
                }));
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"candidates":[{"content":{"parts":[{"text":"Hello"}]}}]}"#);
        })
        .await;

    let (status, body) = post(
        app(config(server.base_url()), Some(API_KEY)),
        json!({ "text": "My essay.", "mode": "feedback", "attachSystemPrompt": true }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({ "text": "Hello" }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_continue_sends_wrapped_text() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH).json_body(json!({
                "contents": [{ "role": "user", "parts": [{ "text": continue_prompt("The cat sat.") }] }]
            }));
            then.status(200)
                .body(r#"{"candidates":[{"content":{"parts":[{"text":"Then it slept."}]}}]}"#);
        })
        .await;

    let (status, body) = post(
        app(config(server.base_url()), Some(API_KEY)),
        json!({ "prompt": "The cat sat.", "action": "continue", "useSystemPrompt": true }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["text"], "Then it slept.");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_upstream_error_forwarded_unchanged() {
    let server = MockServer::start_async().await;
    let raw = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH);
            then.status(429)
                .header("content-type", "application/json")
                .body(raw);
        })
        .await;

    let (status, body) = post(
        app(config(server.base_url()), Some(API_KEY)),
        json!({ "text": "Hi", "mode": "raw" }),
    )
    .await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, raw.as_bytes());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_success_without_candidates_falls_back() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH);
            then.status(200).body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#);
        })
        .await;

    let (status, body) = post(
        app(config(server.base_url()), Some(API_KEY)),
        json!({ "text": "Hi" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["text"], FALLBACK_TEXT);
}

#[tokio::test]
async fn test_success_with_error_object_is_surfaced() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH);
            then.status(200).body(r#"{"error":{"message":"model overloaded"}}"#);
        })
        .await;

    let (status, body) = post(
        app(config(server.base_url()), Some(API_KEY)),
        json!({ "text": "Hi" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["text"], "Error from API: model overloaded");
}

#[tokio::test]
async fn test_missing_credential_never_calls_upstream() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH);
            then.status(200);
        })
        .await;

    let (status, body) = post(
        app(config(server.base_url()), None),
        json!({ "text": "Hi" }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"]["message"].is_string());
    assert_eq!(mock.hits_async().await, 0);
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH);
            then.status(200)
                .delay(Duration::from_secs(3))
                .body(r#"{"candidates":[]}"#);
        })
        .await;

    let config = ProxyConfig {
        timeout: Duration::from_millis(300),
        ..config(server.base_url())
    };
    let (status, body) = post(app(config, Some(API_KEY)), json!({ "text": "Hi" })).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    // Nothing listens on port 1.
    let (status, body) = post(
        app(config("http://127.0.0.1:1".to_string()), Some(API_KEY)),
        json!({ "text": "Hi" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"]["message"], "Failed to reach the AI service.");
}
