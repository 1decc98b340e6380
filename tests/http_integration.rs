//! Integration tests for the assistant HTTP and streaming adapters.
//!
//! Requests go through the full axum router with in-memory collaborators.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;

use aqua_sherpa::adapters::ai::{MockError, MockGenerationProvider, MockResponse};
use aqua_sherpa::adapters::history::InMemoryHistoryLog;
use aqua_sherpa::adapters::http::assistant::{assistant_router, stream_reply, AssistantAppState, ServerMessage};
use aqua_sherpa::application::{ChatRequest, OrchestratorConfig, OrchestratorDeps, RequestOrchestrator};
use aqua_sherpa::domain::assistant::StreamEvent;
use aqua_sherpa::ports::purpose;

// =============================================================================
// Test Infrastructure
// =============================================================================

fn orchestrator(generation: MockGenerationProvider) -> Arc<RequestOrchestrator> {
    let config = OrchestratorConfig {
        enable_weather: false,
        enable_background_search: false,
        ..Default::default()
    };
    let deps = OrchestratorDeps::new(Arc::new(generation), Arc::new(InMemoryHistoryLog::new()));
    Arc::new(RequestOrchestrator::new(deps, config))
}

fn app(state: AssistantAppState) -> Router {
    assistant_router().with_state(state)
}

fn chatty() -> MockGenerationProvider {
    MockGenerationProvider::new()
        .with_fixed_response(purpose::CLASSIFY, MockResponse::Success("other".into()))
        .with_fixed_response(purpose::INTEGRATE, MockResponse::Success("Happy to help with pond 2.".into()))
}

async fn post_chat(app: &Router, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/chat")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// =============================================================================
// Buffered chat
// =============================================================================

#[tokio::test]
async fn chat_response_carries_metadata() {
    let app = app(AssistantAppState::new(orchestrator(chatty())));

    let (status, body) = post_chat(
        &app,
        json!({"session_id": "farm-1", "message": "Thanks!", "context": {"pond": "2"}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["session_id"], "farm-1");
    assert_eq!(body["metadata"]["source"], "chat");
    assert_eq!(body["metadata"]["chat_agent_used"], true);
    assert_eq!(body["metadata"]["streamed"], false);
}

#[tokio::test]
async fn oversized_message_is_rejected() {
    let app = app(AssistantAppState::new(orchestrator(chatty())));

    let (status, body) = post_chat(&app, json!({"session_id": "farm-1", "message": "x".repeat(10_001)})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn error_detail_only_when_verbose() {
    let failing = || {
        MockGenerationProvider::new()
            .with_fixed_response(purpose::CLASSIFY, MockResponse::Success("other".into()))
            .with_fixed_response(
                purpose::CHAT,
                MockResponse::Error(MockError::Unavailable { message: "model overloaded".into() }),
            )
    };

    let quiet = app(AssistantAppState::new(orchestrator(failing())));
    let (status, body) = post_chat(&quiet, json!({"session_id": "s", "message": "Hi"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert!(body["metadata"].get("error").is_none());

    let verbose = app(AssistantAppState::new(orchestrator(failing())).with_verbose_errors(true));
    let (_, body) = post_chat(&verbose, json!({"session_id": "s", "message": "Hi"})).await;
    assert!(body["metadata"]["error"].as_str().unwrap().contains("model overloaded"));
}

// =============================================================================
// History
// =============================================================================

#[tokio::test]
async fn history_limit_returns_latest_turns_in_order() {
    let app = app(AssistantAppState::new(orchestrator(chatty())));
    for message in ["one", "two", "three"] {
        post_chat(&app, json!({"session_id": "farm-2", "message": message})).await;
    }

    let (status, body) = get_json(&app, "/api/sessions/farm-2/history").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["turns"].as_array().unwrap().len(), 6);

    let (_, body) = get_json(&app, "/api/sessions/farm-2/history?limit=2").await;
    let turns = body["turns"].as_array().unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0]["role"], "user");
    assert_eq!(turns[0]["content"], "three");
    assert_eq!(turns[1]["role"], "assistant");
    assert!(turns[0]["sequence"].as_u64() < turns[1]["sequence"].as_u64());
}

#[tokio::test]
async fn unknown_session_has_empty_history() {
    let app = app(AssistantAppState::new(orchestrator(chatty())));

    let (status, body) = get_json(&app, "/api/sessions/nobody/history?limit=500").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["turns"].as_array().unwrap().is_empty());
}

// =============================================================================
// Streaming
// =============================================================================

#[tokio::test]
async fn streamed_reply_matches_buffered_reply() {
    let buffered = app(AssistantAppState::new(orchestrator(chatty())));
    let (_, body) = post_chat(&buffered, json!({"session_id": "farm-3", "message": "Thanks!"})).await;

    let (tx, mut rx) = mpsc::channel(64);
    let request = ChatRequest::new("farm-3", "Thanks!").unwrap();
    let result = stream_reply(&orchestrator(chatty()), request, tx, false).await;

    let mut frames = Vec::new();
    while let Some(message) = rx.recv().await {
        if let ServerMessage::Frame(frame) = message {
            frames.push(frame);
        }
    }

    assert_eq!(frames.first().unwrap().event, StreamEvent::Start);
    assert_eq!(frames.last().unwrap().event, StreamEvent::End);
    assert_eq!(
        frames.iter().filter(|f| f.event == StreamEvent::Start).count(),
        1
    );
    let content: String = frames.iter().filter_map(|f| f.content_text()).collect();
    assert_eq!(content, body["response"].as_str().unwrap());
    assert_eq!(content, result.response);
    assert_eq!(frames.last().unwrap().payload["metadata"]["streamed"], true);
}
