
use std::fmt::Write;

use console::style;

use crate::llm::{ChatMessage, LlmObserver};

const RULE: &str = "############################################################################";

/// Content cut to `limit` characters, marked when anything was dropped
#[inline]
pub fn preview(content: &str, limit: usize) -> String {
    if content.chars().count() <= limit {
        return content.to_string();
    }

    let kept: String = content.chars().take(limit).collect();
    format!("{}{}", kept, style("...(truncated)").red())
}

/// Render a conversation dump: message count, then one line per message
#[inline]
pub fn format_chat_history(messages: &[ChatMessage], truncate_length: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n{}",
        style("########################## Chat history ###################################").yellow()
    );
    let _ = writeln!(
        out,
        "{}{}",
        style("Chat history message count:").green(),
        messages.len()
    );
    for (i, message) in messages.iter().enumerate() {
        let _ = writeln!(
            out,
            "{} {}",
            style(format!("{}({}):", message.role.message_type(), i + 1)).green(),
            preview(&message.content, truncate_length)
        );
    }
    let _ = writeln!(out, "{}", style(RULE).yellow());
    out
}

#[inline]
pub fn debug_chat_history(messages: &[ChatMessage], truncate_length: usize) {
    println!("{}", format_chat_history(messages, truncate_length));
}

/// Prints every model response as it arrives
#[derive(Debug, Clone, Copy)]
pub struct DebugObserver {
    truncate_length: usize,
}

impl DebugObserver {
    #[inline]
    pub fn new(truncate_length: usize) -> Self {
        Self { truncate_length }
    }

    #[inline]
    pub fn format_output(&self, output: &str) -> String {
        format!(
            "\n{}\n{}\n {}\n{}\n",
            style("########################## Callback - LLM End ###################################")
                .yellow(),
            style("LLM response:").green(),
            preview(output, self.truncate_length),
            style(RULE).yellow()
        )
    }
}

impl LlmObserver for DebugObserver {
    fn on_llm_end(&self, output: &str) {
        println!("{}", self.format_output(output));
    }
}
