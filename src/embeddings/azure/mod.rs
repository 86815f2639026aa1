
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::Embedder;
use crate::config::AzureConfig;
use crate::transport::AzureTransport;

/// Client for an Azure OpenAI embeddings deployment
#[derive(Debug, Clone)]
pub struct AzureEmbeddingClient {
    transport: AzureTransport,
    endpoint: Url,
    deployment: String,
    batch_size: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Token usage reported by the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct EmbeddingUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl AzureEmbeddingClient {
    #[inline]
    pub fn new(config: &AzureConfig) -> Result<Self> {
        let transport =
            AzureTransport::new(config).context("Failed to create embeddings transport")?;
        Self::with_transport(transport, config)
    }

    /// Build on a pre-configured transport (custom timeout or retry policy)
    #[inline]
    pub fn with_transport(transport: AzureTransport, config: &AzureConfig) -> Result<Self> {
        let endpoint = transport.deployment_url(
            &config.embedding_deployment,
            "embeddings",
            &config.embedding_api_version,
        )?;

        Ok(Self {
            transport,
            endpoint,
            deployment: config.embedding_deployment.clone(),
            batch_size: config.batch_size as usize,
        })
    }

    #[inline]
    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Check that the deployment answers an embedding request
    #[inline]
    pub fn health_check(&self) -> Result<usize> {
        debug!("Performing health check for embedding deployment {}", self.deployment);

        let vector = self
            .embed_query("health check")
            .context("Embedding deployment did not respond")?;

        info!(
            "Health check passed for embedding deployment {} ({} dimensions)",
            self.deployment,
            vector.len()
        );
        Ok(vector.len())
    }

    /// Embed one request's worth of texts
    #[inline]
    pub fn embed_batch(&self, texts: &[String]) -> Result<(Vec<Vec<f32>>, EmbeddingUsage)> {
        if texts.is_empty() {
            return Ok((Vec::new(), EmbeddingUsage::default()));
        }

        let request_json = serde_json::to_string(&EmbedRequest { input: texts })
            .context("Failed to serialize embedding request")?;

        let response_text = self
            .transport
            .post_json(&self.endpoint, &request_json)
            .with_context(|| format!("Failed to embed batch of {} texts", texts.len()))?;

        let response: EmbedResponse = serde_json::from_str(&response_text)
            .context("Failed to parse embedding response")?;

        if response.data.len() != texts.len() {
            return Err(anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            ));
        }

        // The service may answer out of order; `index` refers to the input position
        let mut ordered: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for item in response.data {
            let slot = ordered
                .get_mut(item.index)
                .ok_or_else(|| anyhow!("Embedding index {} out of range", item.index))?;
            *slot = Some(item.embedding);
        }

        let vectors = ordered
            .into_iter()
            .enumerate()
            .map(|(i, vector)| vector.ok_or_else(|| anyhow!("Missing embedding for input {}", i)))
            .collect::<Result<Vec<_>>>()?;

        Ok((vectors, response.usage.unwrap_or_default()))
    }
}

impl Embedder for AzureEmbeddingClient {
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let (mut vectors, _) = self.embed_batch(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| anyhow!("Embedding response was empty"))
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size.max(1)) {
            let (vectors, usage) = self.embed_batch(chunk)?;
            debug!(
                "Embedded {} texts ({} prompt tokens)",
                vectors.len(),
                usage.prompt_tokens
            );
            results.extend(vectors);
        }

        Ok(results)
    }
}
