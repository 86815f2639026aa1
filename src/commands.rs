
use anyhow::{Context, Result};
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::chat::{RagChain, VectorStoreRetriever};
use crate::config::{Config, RetrievalConfig};
use crate::embeddings::{AzureEmbeddingClient, Embedder};
use crate::indexer::{MovieIndexer, format_result};
use crate::llm::AzureChatClient;
use crate::store::{GenreFilter, IndexSchema, MovieVectorStore};
use crate::terminal::run_chat_loop;
use crate::web::{self, WebState};

/// Load the configuration file and apply environment overrides
#[inline]
pub fn load_config() -> Result<Config> {
    Config::load_default().context("Failed to load configuration")
}

fn load_validated_config() -> Result<Config> {
    let config = load_config()?;
    config.validate().context(
        "Configuration is incomplete. Run 'movie-chat config' or set API_KEY and RESOURCE_ENDPOINT",
    )?;
    Ok(config)
}

/// Build the movie index from the raw dataset
#[inline]
pub async fn build_index(dataset: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let config = load_validated_config()?;

    let dataset_path = dataset.unwrap_or_else(|| PathBuf::from(&config.dataset.file_name));
    let export_path = output.unwrap_or_else(|| PathBuf::from(&config.dataset.export_file_name));

    let embedder = AzureEmbeddingClient::new(&config.azure)
        .context("Failed to initialize embedding client")?;

    info!("Building index from {}", dataset_path.display());
    let indexer = MovieIndexer::new(config, Arc::new(embedder));
    indexer
        .create_index(&dataset_path, &export_path, &mut std::io::stdout())
        .await?;

    Ok(())
}

/// One-off similarity search, optionally restricted to a genre
#[inline]
pub async fn search(query: String, genre: Option<String>, k: Option<usize>) -> Result<()> {
    let config = load_validated_config()?;
    let k = resolve_k(&config.retrieval, k)?;

    let embedder = AzureEmbeddingClient::new(&config.azure)
        .context("Failed to initialize embedding client")?;
    let store = MovieVectorStore::from_existing_index(&config).await?;

    let vector = tokio::task::spawn_blocking(move || embedder.embed_query(&query))
        .await
        .context("Embedding task failed")??;

    let filter = genre.as_deref().map(GenreFilter::new);
    let results = store
        .similarity_search_with_score(&vector, k, filter.as_ref())
        .await?;

    if results.is_empty() {
        println!("No matching movies found.");
        return Ok(());
    }

    for result in &results {
        println!("{}", format_result(result));
    }

    Ok(())
}

/// The requested result count, held to the same bounds as the configured one
fn resolve_k(retrieval: &RetrievalConfig, requested: Option<usize>) -> Result<usize> {
    let Some(k) = requested else {
        return Ok(retrieval.k);
    };

    let mut checked = retrieval.clone();
    checked.set_k(k).context("Invalid result count")?;
    Ok(checked.k)
}

/// Wire the hosted models and the existing index into a chain
#[inline]
pub async fn build_chain(config: &Config) -> Result<RagChain> {
    let embedder = AzureEmbeddingClient::new(&config.azure)
        .context("Failed to initialize embedding client")?;
    let llm = AzureChatClient::new(&config.azure).context("Failed to initialize chat client")?;

    let store = MovieVectorStore::from_existing_index(config)
        .await
        .context("Failed to open the movie index")?;

    let retriever = VectorStoreRetriever::new(Arc::new(store), Arc::new(embedder), config.retrieval.k);
    Ok(RagChain::new(Arc::new(llm), Arc::new(retriever)))
}

/// Interactive chat in the terminal
#[inline]
pub async fn run_chat() -> Result<()> {
    let config = load_validated_config()?;
    let chain = build_chain(&config).await?;

    run_chat_loop(
        &chain,
        &config.chat,
        BufReader::new(std::io::stdin()),
        std::io::stdout(),
    )
    .await
}

/// Serve the browser chat page
#[inline]
pub async fn serve_web(host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = load_validated_config()?;

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    let chain = build_chain(&config).await?;
    web::serve(WebState::new(chain, config.chat.clone()), addr).await
}

/// Report the state of the configuration, the hosted deployments and the index
#[inline]
pub async fn show_status() -> Result<()> {
    let config = load_config().unwrap_or_default();

    println!("Movie Chat Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("Configuration:");
    println!("   Directory: {}", config.get_base_dir().display());
    match config.validate() {
        Ok(()) => println!("   OK: endpoint and API key set"),
        Err(e) => println!("   Incomplete: {}", e),
    }

    println!();
    println!("Azure OpenAI:");
    match AzureEmbeddingClient::new(&config.azure) {
        Ok(client) => match client.health_check() {
            Ok(dimension) => println!(
                "   OK: embedding deployment {} ({} dimensions)",
                client.deployment(),
                dimension
            ),
            Err(e) => println!("   Unhealthy: embedding deployment - {:#}", e),
        },
        Err(e) => println!("   Unavailable: embedding client - {:#}", e),
    }
    match AzureChatClient::new(&config.azure) {
        Ok(client) => match client.health_check() {
            Ok(()) => println!("   OK: chat deployment {}", client.deployment()),
            Err(e) => println!("   Unhealthy: chat deployment - {:#}", e),
        },
        Err(e) => println!("   Unavailable: chat client - {:#}", e),
    }

    println!();
    println!("Vector Index:");
    match MovieVectorStore::connect(&config).await {
        Ok(store) => match store.exists().await {
            Ok(true) => match store.count().await {
                Ok(count) => println!("   OK: '{}' holds {} movies", store.table_name(), count),
                Err(e) => println!("   Unreadable: {}", e),
            },
            Ok(false) => println!(
                "   Missing: '{}' not built yet. Run 'movie-chat index'",
                store.table_name()
            ),
            Err(e) => println!("   Unreadable: {}", e),
        },
        Err(e) => println!("   Failed to open LanceDB: {}", e),
    }

    match IndexSchema::read(&config.schema_path()) {
        Ok(schema) => println!(
            "   Schema: {} dimensions, {} metric, built {}",
            schema.dimension, schema.distance_metric, schema.created_at
        ),
        Err(e) => {
            warn!("Index schema unavailable: {:#}", e);
            println!("   Schema: not found at {}", config.schema_path().display());
        }
    }

    Ok(())
}
