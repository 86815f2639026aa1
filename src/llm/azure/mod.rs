
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};
use url::Url;

use super::{ChatMessage, ChatModel};
use crate::config::AzureConfig;
use crate::transport::AzureTransport;

/// Client for an Azure OpenAI chat-completions deployment
#[derive(Debug, Clone)]
pub struct AzureChatClient {
    transport: AzureTransport,
    endpoint: Url,
    deployment: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageData>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageData {
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl AzureChatClient {
    #[inline]
    pub fn new(config: &AzureConfig) -> Result<Self> {
        let transport = AzureTransport::new(config).context("Failed to create chat transport")?;
        Self::with_transport(transport, config)
    }

    /// Build on a pre-configured transport (custom timeout or retry policy)
    #[inline]
    pub fn with_transport(transport: AzureTransport, config: &AzureConfig) -> Result<Self> {
        let endpoint = transport.deployment_url(
            &config.chat_deployment,
            "chat/completions",
            &config.chat_api_version,
        )?;

        Ok(Self {
            transport,
            endpoint,
            deployment: config.chat_deployment.clone(),
        })
    }

    #[inline]
    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    /// Check that the deployment answers a minimal completion
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for chat deployment {}", self.deployment);

        self.complete(&[ChatMessage::human("Reply with OK.")])
            .context("Chat deployment did not respond")?;

        info!("Health check passed for chat deployment {}", self.deployment);
        Ok(())
    }
}

impl ChatModel for AzureChatClient {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatCompletionRequest {
            messages: messages
                .iter()
                .map(|message| WireMessage {
                    role: message.role.api_name(),
                    content: &message.content,
                })
                .collect(),
        };

        debug!(
            "Sending chat completion to {} with {} messages",
            self.deployment,
            messages.len()
        );

        let request_json =
            serde_json::to_string(&request).context("Failed to serialize chat request")?;
        trace!("Chat request payload: {}", request_json);

        let response_text = self
            .transport
            .post_json(&self.endpoint, &request_json)
            .context("Chat completion request failed")?;

        let response: ChatCompletionResponse = serde_json::from_str(&response_text)
            .context("Failed to parse chat completion response")?;

        if let Some(usage) = &response.usage {
            debug!(
                "Chat completion used {} prompt and {} completion tokens",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow!("Empty or missing content in chat completion response"))
    }
}
