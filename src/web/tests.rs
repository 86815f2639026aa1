use super::*;
use crate::chat::Retriever;
use crate::llm::{ChatMessage, ChatModel, Role};
use crate::store::MovieDocument;
use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, header};
use serde_json::Value;
use tower::ServiceExt;

/// Answers with the number of messages it was given
struct CountingModel {
    fail: bool,
}

impl ChatModel for CountingModel {
    fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        if self.fail {
            anyhow::bail!("model offline");
        }
        Ok(format!("saw {} messages", messages.len()))
    }
}

struct NoDocuments;

#[async_trait]
impl Retriever for NoDocuments {
    async fn retrieve(&self, _query: &str) -> anyhow::Result<Vec<MovieDocument>> {
        Ok(Vec::new())
    }
}

fn state(fail: bool, debug: bool) -> WebState {
    let chain = RagChain::new(Arc::new(CountingModel { fail }), Arc::new(NoDocuments));
    WebState::new(
        chain,
        ChatConfig {
            debug,
            ..ChatConfig::default()
        },
    )
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router
        .oneshot(request)
        .await
        .expect("request should be handled");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .body(Body::empty())
        .expect("request should build")
}

fn session_id(value: &Value) -> Uuid {
    value["session_id"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("response should carry a session id")
}

#[tokio::test]
async fn index_serves_chat_page() {
    let response = build_router(state(false, false))
        .oneshot(get("/"))
        .await
        .expect("request should be handled");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let html = String::from_utf8(bytes.to_vec()).expect("utf-8 page");
    assert!(html.contains("<title>Movie Chat</title>"));
    assert!(html.contains("type 'q' to start a new conversation."));
    assert!(!html.contains("__INPUT_PLACEHOLDER__"));
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, body) = send(build_router(state(false, false)), get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn new_session_starts_with_welcome() {
    let (status, body) = send(build_router(state(false, false)), get("/api/history")).await;

    assert_eq!(status, StatusCode::OK);
    session_id(&body);
    let messages = body["messages"].as_array().expect("messages array");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "ai");
    assert_eq!(messages[0]["content"], WELCOME_MESSAGE);
}

#[tokio::test]
async fn chat_appends_question_and_answer() {
    let state = state(false, false);
    let router = build_router(state.clone());

    let (status, body) = send(
        router.clone(),
        post_json("/api/chat", &serde_json::json!({ "message": "Any heist movies?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reset"], false);
    assert!(body.get("processing_time").is_none());

    // The chain saw the welcome message and the question in its history:
    // rewrite prompt = system + 2 history + input.
    assert_eq!(body["answer"], "saw 4 messages");

    let id = session_id(&body);
    let history = state.sessions.with_session(id, |h| h.clone());
    let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::Ai, Role::Human, Role::Ai]);
    assert_eq!(history.messages()[1].content, "Any heist movies?");
}

#[tokio::test]
async fn quit_message_resets_session() {
    let state = state(false, false);
    let router = build_router(state.clone());

    let (_, first) = send(
        router.clone(),
        post_json("/api/chat", &serde_json::json!({ "message": "hello" })),
    )
    .await;
    let id = session_id(&first);

    let (status, body) = send(
        router,
        post_json(
            "/api/chat",
            &serde_json::json!({ "session_id": id, "message": "q" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reset"], true);
    assert!(body["answer"].is_null());
    assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
    assert_eq!(state.sessions.with_session(id, |h| h.len()), 1);
}

#[tokio::test]
async fn sessions_are_isolated() {
    let state = state(false, false);
    let router = build_router(state.clone());
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    send(
        router.clone(),
        post_json("/api/chat", &serde_json::json!({ "session_id": a, "message": "one" })),
    )
    .await;
    send(
        router.clone(),
        post_json("/api/chat", &serde_json::json!({ "session_id": a, "message": "two" })),
    )
    .await;

    let (_, body) = send(router, get(&format!("/api/history?session_id={}", b))).await;
    assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
    assert_eq!(state.sessions.with_session(a, |h| h.len()), 5);
    // Looking at b's history does not store a session for it
    assert_eq!(state.sessions.len(), 1);
}

#[tokio::test]
async fn reset_endpoint_restores_welcome() {
    let state = state(false, false);
    let router = build_router(state.clone());
    let id = Uuid::new_v4();

    send(
        router.clone(),
        post_json("/api/chat", &serde_json::json!({ "session_id": id, "message": "hi" })),
    )
    .await;
    let (status, body) = send(
        router,
        post_json("/api/reset", &serde_json::json!({ "session_id": id })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(session_id(&body), id);
    assert_eq!(body["messages"][0]["content"], WELCOME_MESSAGE);
    assert_eq!(state.sessions.with_session(id, |h| h.len()), 1);
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let (status, body) = send(
        build_router(state(false, false)),
        post_json("/api/chat", &serde_json::json!({ "message": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "empty_message");
}

#[tokio::test]
async fn chain_errors_keep_the_question() {
    let state = state(true, false);
    let id = Uuid::new_v4();

    let (status, body) = send(
        build_router(state.clone()),
        post_json("/api/chat", &serde_json::json!({ "session_id": id, "message": "hi" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "chain_error");
    assert!(
        body["message"]
            .as_str()
            .is_some_and(|m| m.contains("model offline"))
    );
    assert_eq!(state.sessions.with_session(id, |h| h.len()), 2);
}

#[tokio::test]
async fn debug_mode_reports_processing_time() {
    let (status, body) = send(
        build_router(state(false, true)),
        post_json("/api/chat", &serde_json::json!({ "message": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["processing_time"].is_f64());
}

#[tokio::test]
async fn anonymous_history_requests_store_nothing() {
    let state = state(false, false);
    let router = build_router(state.clone());

    for _ in 0..50 {
        let (status, _) = send(router.clone(), get("/api/history")).await;
        assert_eq!(status, StatusCode::OK);
    }
    let unknown = Uuid::new_v4();
    send(
        router.clone(),
        post_json("/api/reset", &serde_json::json!({ "session_id": unknown })),
    )
    .await;

    assert!(state.sessions.is_empty());
    let (_, body) = send(router, get("/api/health")).await;
    assert_eq!(body["sessions"], 0);
}

#[test]
fn idle_sessions_are_evicted_on_write() {
    let sessions = SessionStore::with_ttl(Duration::ZERO);
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    sessions.with_session(a, |h| h.push(ChatMessage::human("one")));
    sessions.with_session(b, |h| h.push(ChatMessage::human("two")));

    assert_eq!(sessions.len(), 1);
    // An expired session reads back as a fresh greeting
    assert_eq!(sessions.history(a).len(), 1);
}

#[test]
fn active_sessions_are_kept() {
    let sessions = SessionStore::new();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    sessions.with_session(a, |h| h.push(ChatMessage::human("one")));
    sessions.with_session(b, |h| h.push(ChatMessage::human("two")));

    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions.history(a).len(), 2);
}
