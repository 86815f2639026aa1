// Web module
// Browser chat page and the JSON API behind it
//
// GET  /                  chat page
// GET  /api/health
// GET  /api/history?session_id=
// POST /api/chat          {session_id?, message}
// POST /api/reset         {session_id?}

#[cfg(test)]
mod tests;

mod api;
mod page;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tracing::{debug, info};
use uuid::Uuid;

use crate::chat::prompts::WELCOME_MESSAGE;
use crate::chat::{ChatHistory, RagChain};
use crate::config::ChatConfig;

/// Sessions idle for this long are dropped
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
struct Session {
    history: ChatHistory,
    last_seen: Instant,
}

/// Conversations of every browser session, keyed by session id
///
/// A session is only stored once it has been written to. Idle sessions are
/// evicted whenever a session is written.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
    ttl: Duration,
}

impl Default for SessionStore {
    #[inline]
    fn default() -> Self {
        Self::with_ttl(SESSION_TTL)
    }
}

impl SessionStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// The session's conversation, or a fresh greeting for an unknown session
    #[inline]
    pub fn history(&self, id: Uuid) -> ChatHistory {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        match sessions.get_mut(&id) {
            Some(session) if session.last_seen.elapsed() < self.ttl => {
                session.last_seen = Instant::now();
                session.history.clone()
            }
            _ => ChatHistory::with_greeting(WELCOME_MESSAGE),
        }
    }

    /// Run `f` on the session's history, creating it with the welcome message if needed
    #[inline]
    pub fn with_session<T>(&self, id: Uuid, f: impl FnOnce(&mut ChatHistory) -> T) -> T {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);

        let ttl = self.ttl;
        let before = sessions.len();
        sessions.retain(|_, session| session.last_seen.elapsed() < ttl);
        if sessions.len() < before {
            debug!("Evicted {} idle sessions", before - sessions.len());
        }

        let session = sessions.entry(id).or_insert_with(|| Session {
            history: ChatHistory::with_greeting(WELCOME_MESSAGE),
            last_seen: Instant::now(),
        });
        session.last_seen = Instant::now();
        f(&mut session.history)
    }

    /// Forget the session; it starts over from the welcome message
    #[inline]
    pub fn reset(&self, id: Uuid) -> ChatHistory {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        ChatHistory::with_greeting(WELCOME_MESSAGE)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// State shared by every handler
#[derive(Clone)]
pub struct WebState {
    pub chain: RagChain,
    pub sessions: SessionStore,
    pub settings: ChatConfig,
}

impl WebState {
    #[inline]
    pub fn new(chain: RagChain, settings: ChatConfig) -> Self {
        Self {
            chain,
            sessions: SessionStore::new(),
            settings,
        }
    }
}

#[inline]
pub fn build_router(state: WebState) -> Router {
    Router::new()
        .route("/", get(page::index))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .route("/api/health", get(api::health))
        .route("/api/history", get(api::history))
        .route("/api/chat", post(api::chat))
        .route("/api/reset", post(api::reset))
        .with_state(state)
}

/// Serve the chat page until Ctrl-C
#[inline]
pub async fn serve(state: WebState, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Movie chat listening on http://{}", addr);
    eprintln!("Movie chat is running at http://{} (Ctrl-C to stop)", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Web server error")?;

    info!("Movie chat server shut down");
    Ok(())
}
