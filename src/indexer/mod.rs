// Indexer module
// Builds the movie index: dataset -> filter -> export -> embed -> store -> sample searches


use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::config::Config;
use crate::dataset::{self, DatasetSummary, MovieRecord};
use crate::embeddings::Embedder;
use crate::store::{GenreFilter, IndexSchema, MovieEmbedding, MovieVectorStore, ScoredDocument};

/// Query used to show off the freshly built index
pub const SAMPLE_QUERY: &str = "Spaceships, aliens, and heroes saving America";

/// Genre used for the filtered sample query
pub const SAMPLE_GENRE: &str = "comedy";

const SAMPLE_K: usize = 10;

/// What an index build produced
#[derive(Debug, Clone, PartialEq)]
pub struct IndexReport {
    pub summary: DatasetSummary,
    pub export_path: PathBuf,
    pub schema: IndexSchema,
}

/// Builds the vector index from the raw dataset
pub struct MovieIndexer {
    config: Config,
    embedder: Arc<dyn Embedder>,
}

impl MovieIndexer {
    #[inline]
    pub fn new(config: Config, embedder: Arc<dyn Embedder>) -> Self {
        Self { config, embedder }
    }

    /// Run the whole pipeline, reporting each step on `out`
    #[inline]
    pub async fn create_index<W: Write + Send>(
        &self,
        dataset_path: &Path,
        export_path: &Path,
        out: &mut W,
    ) -> Result<IndexReport> {
        let azure = &self.config.azure;
        writeln!(out, "RESOURCE_ENDPOINT: {}", azure.endpoint)?;
        writeln!(out, "DEPLOYMENT_NAME: {}", azure.embedding_deployment)?;
        writeln!(out, "MODEL_NAME: {}", azure.chat_deployment)?;

        writeln!(out, "Loading dataset {}...", dataset_path.display())?;
        let movies = dataset::load_movies(dataset_path)?;
        let movies = dataset::filter_movies(movies, &self.config.dataset);
        let summary = dataset::summarize(&movies);
        writeln!(out, "Number of movies: {}", summary.movies)?;
        writeln!(out, "Number of tokens required: {}", summary.total_tokens)?;

        writeln!(out, "Creating CSV file with filtered movies and snake_case titles...")?;
        dataset::export_movie_list(&movies, export_path)?;
        writeln!(out, "CSV file created: {}", export_path.display())?;

        writeln!(
            out,
            "Creating document index, this may take 10+ minutes to complete..."
        )?;
        let embeddings = self.embed_movies(movies).await?;

        let mut store = MovieVectorStore::connect(&self.config)
            .await
            .context("Failed to open vector store")?;
        writeln!(out, "Saving schema to {}", store.schema_path().display())?;
        let schema = store
            .create_index(&embeddings)
            .await
            .context("Failed to create index")?;

        writeln!(out, "Running similarity search...")?;
        let results = self.sample_search(&store, None).await?;
        write_results(out, &results)?;

        writeln!(out, "Running hybrid query with filter...")?;
        let filter = GenreFilter::new(SAMPLE_GENRE);
        let results = self.sample_search(&store, Some(&filter)).await?;
        write_results(out, &results)?;

        writeln!(out, "Done!")?;
        info!(
            "Indexed {} movies into '{}'",
            summary.movies, schema.index_name
        );

        Ok(IndexReport {
            summary,
            export_path: export_path.to_path_buf(),
            schema,
        })
    }

    /// Embed every plot, one service batch at a time
    #[inline]
    pub async fn embed_movies(&self, movies: Vec<MovieRecord>) -> Result<Vec<MovieEmbedding>> {
        let batch_size = self.config.azure.batch_size.max(1) as usize;

        let bar = if console::user_attended_stderr() {
            ProgressBar::new(movies.len() as u64).with_style(
                ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding plots {eta}")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };

        let mut embeddings = Vec::with_capacity(movies.len());
        for chunk in movies.chunks(batch_size) {
            let plots: Vec<String> = chunk.iter().map(|movie| movie.plot.clone()).collect();

            let embedder = Arc::clone(&self.embedder);
            let vectors = tokio::task::spawn_blocking(move || embedder.embed_documents(&plots))
                .await
                .context("Embedding task failed")??;

            if vectors.len() != chunk.len() {
                anyhow::bail!(
                    "Embedding service returned {} vectors for {} plots",
                    vectors.len(),
                    chunk.len()
                );
            }

            bar.inc(chunk.len() as u64);
            embeddings.extend(
                vectors
                    .into_iter()
                    .zip(chunk.iter().cloned())
                    .map(|(vector, movie)| MovieEmbedding { vector, movie }),
            );
        }

        bar.finish_and_clear();
        debug!("Embedded {} plots", embeddings.len());
        Ok(embeddings)
    }

    async fn sample_search(
        &self,
        store: &MovieVectorStore,
        filter: Option<&GenreFilter>,
    ) -> Result<Vec<ScoredDocument>> {
        let embedder = Arc::clone(&self.embedder);
        let vector = tokio::task::spawn_blocking(move || embedder.embed_query(SAMPLE_QUERY))
            .await
            .context("Embedding task failed")??;

        Ok(store
            .similarity_search_with_score(&vector, SAMPLE_K, filter)
            .await?)
    }
}

/// `Title (Score: s)` line for a search hit
#[inline]
pub fn format_result(result: &ScoredDocument) -> String {
    format!(
        "{} (Score: {})",
        result.document.metadata.title,
        result.display_score()
    )
}

fn write_results<W: Write>(out: &mut W, results: &[ScoredDocument]) -> Result<()> {
    for result in results {
        writeln!(out, "{}", format_result(result))?;
    }
    Ok(())
}
