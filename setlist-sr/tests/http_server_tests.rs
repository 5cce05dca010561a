//! HTTP server and routing integration tests
//!
//! Exercises the router end to end with mock backing services: health
//! reporting, request validation, and the SSE playlist stream.

mod helpers;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use setlist_sr::{build_router, AppState};

use helpers::{candidate, track, GenerationScript, MockCatalog, MockSuggestionSource, MockTokens};

/// App state backed by mocks; the generation script and catalog library are
/// supplied per test.
fn test_app_state(script: Vec<GenerationScript>, library: Vec<&str>) -> AppState {
    let tracks = library
        .into_iter()
        .map(|name| track(name, "Tangerine Dream", 1974))
        .collect();
    AppState::new(
        Arc::new(MockSuggestionSource::new(script)),
        Arc::new(MockCatalog::with_library(tracks)),
        Arc::new(MockTokens::new()),
    )
}

#[tokio::test]
async fn test_health_endpoint_reports_module_identity() {
    let app = build_router(test_app_state(Vec::new(), Vec::new()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("application/json"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["module"], "setlist-sr");
    assert!(health["version"].is_string());
    assert!(health["uptime_seconds"].is_number());
    assert_eq!(health["sessions_completed"], 0);
    assert!(health.get("last_error").is_none());
}

#[tokio::test]
async fn test_health_tracks_completed_sessions() {
    // One session that resolves its song, then one that fails outright.
    let state = test_app_state(
        vec![
            GenerationScript::Batch(vec![candidate("Phaedra", "Tangerine Dream")]),
            GenerationScript::Fail,
            GenerationScript::Fail,
        ],
        vec!["Phaedra"],
    );

    let response = build_router(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/playlist/stream")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "prompt": "berlin school", "count": 1 }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body).contains("event: complete"));

    let response = build_router(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/playlist/stream")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "prompt": "anything" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body).contains("event: error"));

    let response = build_router(state)
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let health: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(health["sessions_completed"], 2);
    assert!(health["last_error"]
        .as_str()
        .unwrap()
        .contains("no usable suggestions"));
}

#[tokio::test]
async fn test_playlist_stream_rejects_empty_prompt() {
    let app = build_router(test_app_state(Vec::new(), Vec::new()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/playlist/stream")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "prompt": "   " }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"]["code"], "BAD_REQUEST");
    assert!(error["error"]["message"]
        .as_str()
        .unwrap()
        .contains("prompt"));
}

#[tokio::test]
async fn test_playlist_stream_rejects_missing_prompt_field() {
    let app = build_router(test_app_state(Vec::new(), Vec::new()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/playlist/stream")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "count": 5 }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_playlist_stream_emits_song_and_complete_events() {
    let script = vec![GenerationScript::Batch(vec![
        candidate("Phaedra", "Tangerine Dream"),
        candidate("Rubycon", "Tangerine Dream"),
    ])];
    let app = build_router(test_app_state(script, vec!["Phaedra", "Rubycon"]));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/playlist/stream")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "prompt": "berlin school", "count": 2 }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/event-stream"));

    // The stream closes after the terminal event, so the whole body can be
    // collected.
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8_lossy(&body);

    assert!(text.contains("event: status"), "stream: {}", text);
    assert!(text.contains("event: checking"), "stream: {}", text);
    assert!(text.contains("event: song"), "stream: {}", text);
    assert!(text.contains("event: complete"), "stream: {}", text);
    assert!(text.contains("\"valid_count\":2"), "stream: {}", text);
    assert!(!text.contains("event: error"), "stream: {}", text);
}

#[tokio::test]
async fn test_playlist_stream_clamps_oversized_count() {
    let script = vec![GenerationScript::Batch(vec![candidate(
        "Phaedra",
        "Tangerine Dream",
    )])];
    let app = build_router(test_app_state(script, vec!["Phaedra"]));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/playlist/stream")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "prompt": "berlin school", "count": 500 }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8_lossy(&body);

    // 500 is clamped to the 50-item ceiling before the session starts.
    assert!(text.contains("\"requested_count\":50"), "stream: {}", text);
    assert!(text.contains("event: complete"), "stream: {}", text);
}

#[tokio::test]
async fn test_playlist_stream_defaults_to_twenty_items() {
    // No count in the request; generation has nothing to offer, so the
    // session completes empty but reports the default quota.
    let app = build_router(test_app_state(Vec::new(), Vec::new()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/playlist/stream")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "prompt": "berlin school" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8_lossy(&body);

    assert!(text.contains("\"requested_count\":20"), "stream: {}", text);
    assert!(text.contains("\"valid_count\":0"), "stream: {}", text);
    assert!(text.contains("event: complete"), "stream: {}", text);
}

#[tokio::test]
async fn test_playlist_stream_reports_terminal_error_event() {
    let script = vec![GenerationScript::Fail, GenerationScript::Fail];
    let app = build_router(test_app_state(script, Vec::new()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/playlist/stream")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "prompt": "anything" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    // The stream itself starts fine; the failure arrives as an event.
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8_lossy(&body);

    assert!(text.contains("event: error"), "stream: {}", text);
    assert!(text.contains("\"needs_reauth\":false"), "stream: {}", text);
    assert!(!text.contains("event: complete"), "stream: {}", text);
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let app = build_router(test_app_state(Vec::new(), Vec::new()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
