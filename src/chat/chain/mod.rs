
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use itertools::Itertools;
use tracing::{debug, info};

use super::prompts::{CONTEXTUALIZE_PROMPT, system_prompt};
use crate::embeddings::Embedder;
use crate::llm::{ChatMessage, ChatModel, LlmObserver};
use crate::store::{GenreFilter, MovieDocument, MovieVectorStore};

/// Fetches the documents relevant to a question
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<MovieDocument>>;
}

/// Top-k similarity retrieval over the movie index
pub struct VectorStoreRetriever {
    store: Arc<MovieVectorStore>,
    embedder: Arc<dyn Embedder>,
    k: usize,
    filter: Option<GenreFilter>,
}

impl VectorStoreRetriever {
    #[inline]
    pub fn new(store: Arc<MovieVectorStore>, embedder: Arc<dyn Embedder>, k: usize) -> Self {
        Self {
            store,
            embedder,
            k,
            filter: None,
        }
    }

    #[inline]
    pub fn with_filter(mut self, filter: GenreFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

#[async_trait]
impl Retriever for VectorStoreRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<MovieDocument>> {
        let embedder = Arc::clone(&self.embedder);
        let query_text = query.to_string();
        let vector = tokio::task::spawn_blocking(move || embedder.embed_query(&query_text))
            .await
            .context("Embedding task failed")??;

        let results = self
            .store
            .similarity_search_with_score(&vector, self.k, self.filter.as_ref())
            .await
            .context("Similarity search failed")?;

        debug!("Retrieved {} documents for '{}'", results.len(), query);
        Ok(results.into_iter().map(|scored| scored.document).collect())
    }
}

/// Everything produced by one pass through the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOutput {
    pub input: String,
    /// The question actually used for retrieval
    pub standalone_question: String,
    pub context: Vec<MovieDocument>,
    pub answer: String,
}

/// History-aware retrieval followed by a "stuffed" answer prompt
#[derive(Clone)]
pub struct RagChain {
    llm: Arc<dyn ChatModel>,
    retriever: Arc<dyn Retriever>,
}

impl RagChain {
    #[inline]
    pub fn new(llm: Arc<dyn ChatModel>, retriever: Arc<dyn Retriever>) -> Self {
        Self { llm, retriever }
    }

    /// Answer `input` given the conversation so far
    ///
    /// With an empty history the input is used for retrieval as is. Otherwise
    /// the model first rewrites it into a standalone question.
    #[inline]
    pub async fn invoke(
        &self,
        input: &str,
        history: &[ChatMessage],
        observer: Option<&dyn LlmObserver>,
    ) -> Result<ChainOutput> {
        let standalone_question = if history.is_empty() {
            input.to_string()
        } else {
            let messages = Self::contextualize_messages(input, history);
            let question = self
                .complete(messages, observer)
                .await
                .context("Failed to rephrase the question")?;
            debug!("Standalone question: {}", question);
            question
        };

        let context = self
            .retriever
            .retrieve(&standalone_question)
            .await
            .context("Failed to retrieve movies")?;

        let messages = Self::answer_messages(input, history, &context);
        let answer = self
            .complete(messages, observer)
            .await
            .context("Failed to generate an answer")?;

        info!(
            "Answered with {} context documents and {} history messages",
            context.len(),
            history.len()
        );

        Ok(ChainOutput {
            input: input.to_string(),
            standalone_question,
            context,
            answer,
        })
    }

    /// Prompt asking for a question that stands without the history
    #[inline]
    pub fn contextualize_messages(input: &str, history: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(CONTEXTUALIZE_PROMPT));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::human(input));
        messages
    }

    /// Prompt with every retrieved plot stuffed into the system message
    #[inline]
    pub fn answer_messages(
        input: &str,
        history: &[ChatMessage],
        context: &[MovieDocument],
    ) -> Vec<ChatMessage> {
        let context_text = context
            .iter()
            .map(|document| document.page_content.as_str())
            .join("\n\n");

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system_prompt(&context_text)));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::human(input));
        messages
    }

    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        observer: Option<&dyn LlmObserver>,
    ) -> Result<String> {
        let llm = Arc::clone(&self.llm);
        let output = tokio::task::spawn_blocking(move || llm.complete(&messages))
            .await
            .context("Completion task failed")??;

        if let Some(observer) = observer {
            observer.on_llm_end(&output);
        }
        Ok(output)
    }
}
