// LLM module
// Chat messages and the hosted chat-completion deployment

pub mod azure;

use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use azure::AzureChatClient;

/// Who authored a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Human,
    Ai,
}

impl Role {
    /// Role name on the chat-completions wire
    #[inline]
    pub fn api_name(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Human => "user",
            Self::Ai => "assistant",
        }
    }

    /// Display name used in debug dumps
    #[inline]
    pub fn message_type(self) -> &'static str {
        match self {
            Self::System => "SystemMessage",
            Self::Human => "HumanMessage",
            Self::Ai => "AIMessage",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    #[inline]
    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
        }
    }
}

/// A chat-completion model
///
/// Implementations may block on network I/O.
pub trait ChatModel: Send + Sync {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Callbacks fired around model calls
pub trait LlmObserver: Send + Sync {
    /// Called with the model output after every successful completion
    fn on_llm_end(&self, output: &str);
}
