// Embeddings module
// Turns plots and questions into vectors using a hosted embedding deployment

pub mod azure;

use anyhow::Result;

pub use azure::{AzureEmbeddingClient, EmbeddingUsage};

/// Produces embedding vectors for text
///
/// Implementations may block on network I/O.
pub trait Embedder: Send + Sync {
    /// Embed a single search query
    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many documents, preserving input order
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
