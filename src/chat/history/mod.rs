#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;

/// Ordered turns of one conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// A history opened by the assistant's greeting
    #[inline]
    pub fn with_greeting(greeting: &str) -> Self {
        Self {
            messages: vec![ChatMessage::ai(greeting)],
        }
    }

    #[inline]
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Record a question and the answer it received
    #[inline]
    pub fn push_turn(&mut self, question: &str, answer: &str) {
        self.messages
            .extend([ChatMessage::human(question), ChatMessage::ai(answer)]);
    }

    #[inline]
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[inline]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.messages.iter()
    }
}

impl Extend<ChatMessage> for ChatHistory {
    #[inline]
    fn extend<T: IntoIterator<Item = ChatMessage>>(&mut self, iter: T) {
        self.messages.extend(iter);
    }
}

impl<'a> IntoIterator for &'a ChatHistory {
    type Item = &'a ChatMessage;
    type IntoIter = std::slice::Iter<'a, ChatMessage>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
