use std::time::Instant;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};
use uuid::Uuid;

use super::WebState;
use crate::chat::debug::debug_chat_history;
use crate::chat::prompts::SYSTEM_PROMPT;
use crate::chat::{ChatHistory, DebugObserver};
use crate::llm::{ChatMessage, LlmObserver};
use crate::terminal::QUIT_COMMAND;

#[derive(Debug, Deserialize)]
pub(super) struct SessionQuery {
    session_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatRequest {
    session_id: Option<Uuid>,
    message: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ResetRequest {
    session_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub(super) struct HistoryResponse {
    session_id: Uuid,
    messages: ChatHistory,
}

#[derive(Debug, Serialize)]
pub(super) struct ChatResponse {
    session_id: Uuid,
    /// Set when the message reset the conversation instead of asking a question
    reset: bool,
    answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    processing_time: Option<f64>,
    messages: ChatHistory,
}

fn json_error(status: StatusCode, code: &str, message: impl std::fmt::Display) -> Response {
    (
        status,
        Json(json!({ "error": code, "message": message.to_string() })),
    )
        .into_response()
}

/// GET /api/health
pub(super) async fn health(State(state): State<WebState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "sessions": state.sessions.len() }))
}

/// GET /api/history
pub(super) async fn history(
    State(state): State<WebState>,
    Query(query): Query<SessionQuery>,
) -> Json<HistoryResponse> {
    let session_id = query.session_id.unwrap_or_else(Uuid::new_v4);
    let messages = state.sessions.history(session_id);
    Json(HistoryResponse {
        session_id,
        messages,
    })
}

/// POST /api/reset
pub(super) async fn reset(
    State(state): State<WebState>,
    Json(req): Json<ResetRequest>,
) -> Json<HistoryResponse> {
    let session_id = req.session_id.unwrap_or_else(Uuid::new_v4);
    let messages = state.sessions.reset(session_id);
    debug!("Session {} reset", session_id);
    Json(HistoryResponse {
        session_id,
        messages,
    })
}

/// POST /api/chat
pub(super) async fn chat(State(state): State<WebState>, Json(req): Json<ChatRequest>) -> Response {
    let session_id = req.session_id.unwrap_or_else(Uuid::new_v4);
    let question = req.message.trim();

    if question.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "empty_message", "Message is empty");
    }

    if question == QUIT_COMMAND {
        let messages = state.sessions.reset(session_id);
        return Json(ChatResponse {
            session_id,
            reset: true,
            answer: None,
            processing_time: None,
            messages,
        })
        .into_response();
    }

    // The question is part of the history the chain sees
    let history: Vec<ChatMessage> = state.sessions.with_session(session_id, |history| {
        history.push(ChatMessage::human(question));
        history.messages().to_vec()
    });

    let observer = state
        .settings
        .debug
        .then(|| DebugObserver::new(state.settings.truncate_length));
    let started = Instant::now();

    let result = state
        .chain
        .invoke(
            question,
            &history,
            observer.as_ref().map(|o| o as &dyn LlmObserver),
        )
        .await;

    match result {
        Ok(output) => {
            let elapsed = started.elapsed().as_secs_f64();
            let messages = state.sessions.with_session(session_id, |history| {
                history.push(ChatMessage::ai(output.answer.as_str()));
                history.clone()
            });

            if state.settings.debug {
                let mut dump = vec![ChatMessage::system(SYSTEM_PROMPT)];
                dump.extend(messages.iter().cloned());
                debug_chat_history(&dump, state.settings.truncate_length);
            }

            Json(ChatResponse {
                session_id,
                reset: false,
                answer: Some(output.answer),
                processing_time: state.settings.debug.then_some(elapsed),
                messages,
            })
            .into_response()
        }
        Err(e) => {
            error!("Error during chain execution: {:#}", e);
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "chain_error",
                format!("Error during chain execution: {:#}", e),
            )
        }
    }
}
