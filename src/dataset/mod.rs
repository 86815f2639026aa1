// Dataset module
// Loads the Wikipedia movie plots CSV, cleans and filters it, and exports the filtered list

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use tiktoken_rs::CoreBPE;
use tracing::{debug, info};

use crate::config::DatasetConfig;

/// Where the raw dataset can be downloaded from
pub const DATASET_SOURCE_URL: &str = "https://www.kaggle.com/datasets/jrobischon/wikipedia-movie-plots";

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

// Any character followed by " ," (leftovers of stripped citations)
static DANGLING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r". ,").expect("dangling comma pattern is valid"));

static CL100K: LazyLock<CoreBPE> =
    LazyLock::new(|| tiktoken_rs::cl100k_base().expect("cl100k_base encoding is bundled"));

/// A row of the raw dataset, with the original column headers
#[derive(Debug, Clone, Deserialize)]
struct RawMovieRow {
    #[serde(rename = "Release Year")]
    release_year: String,
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Origin/Ethnicity")]
    origin: String,
    #[serde(rename = "Director", default)]
    director: String,
    #[serde(rename = "Cast", default)]
    cast: String,
    #[serde(rename = "Genre", default)]
    genre: String,
    #[serde(rename = "Wiki Page", default)]
    wiki_page: String,
    #[serde(rename = "Plot")]
    plot: String,
}

/// A movie ready for embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieRecord {
    /// Position of the movie in the raw dataset, assigned before filtering
    pub id: u32,
    pub title: String,
    pub director: String,
    pub cast: String,
    pub genre: String,
    pub wiki_page: String,
    pub plot: String,
    pub year: i32,
    pub origin: String,
    pub n_tokens: usize,
}

/// Size of a filtered dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSummary {
    pub movies: usize,
    pub total_tokens: usize,
}

/// Load every movie from the raw CSV, numbering rows in file order
#[inline]
pub fn load_movies(path: &Path) -> Result<Vec<MovieRecord>> {
    if !path.exists() {
        return Err(anyhow!(
            "The dataset file '{}' was not found. Please download it from {} and place it there.",
            path.display(),
            DATASET_SOURCE_URL
        ));
    }

    info!("Loading dataset {}", path.display());

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open dataset file: {}", path.display()))?;

    let mut movies = Vec::new();
    for (row_index, row) in reader.deserialize::<RawMovieRow>().enumerate() {
        let row = row.with_context(|| format!("Failed to parse dataset row {}", row_index + 1))?;
        let id = u32::try_from(row_index).context("Dataset has too many rows")?;

        let year = row
            .release_year
            .trim()
            .parse::<i32>()
            .with_context(|| format!("Invalid release year in row {}: {}", id, row.release_year))?;

        let n_tokens = count_tokens(&row.plot);
        movies.push(MovieRecord {
            id,
            title: row.title,
            director: row.director,
            cast: row.cast,
            genre: row.genre,
            wiki_page: row.wiki_page,
            plot: row.plot,
            year,
            origin: row.origin,
            n_tokens,
        });
    }

    debug!("Loaded {} movies from {}", movies.len(), path.display());
    Ok(movies)
}

/// Keep recent movies from the configured origins whose cleaned plot fits the token limit
#[inline]
pub fn filter_movies(movies: Vec<MovieRecord>, config: &DatasetConfig) -> Vec<MovieRecord> {
    movies
        .into_iter()
        .filter(|movie| movie.year > config.min_year)
        .filter(|movie| config.origins.iter().any(|origin| *origin == movie.origin))
        .map(|mut movie| {
            movie.plot = normalize_text(&movie.plot);
            movie.n_tokens = count_tokens(&movie.plot);
            movie
        })
        .filter(|movie| movie.n_tokens < config.max_tokens)
        .collect()
}

#[inline]
pub fn summarize(movies: &[MovieRecord]) -> DatasetSummary {
    DatasetSummary {
        movies: movies.len(),
        total_tokens: movies.iter().map(|movie| movie.n_tokens).sum(),
    }
}

/// Clean a plot so it embeds well: single spaces, no stray punctuation, no newlines
#[inline]
pub fn normalize_text(text: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(text, " ");
    let trimmed = collapsed.trim();
    let without_commas = DANGLING_COMMA.replace_all(trimmed, "");

    without_commas
        .replace("..", ".")
        .replace(". .", ".")
        .replace('\n', "")
        .trim()
        .to_string()
}

/// Number of `cl100k_base` tokens in `text`, the encoding of the embedding models
#[inline]
pub fn count_tokens(text: &str) -> usize {
    CL100K.encode_ordinary(text).len()
}

/// Write the filtered movies with snake_case headers; text fields are always quoted
#[inline]
pub fn export_movie_list(movies: &[MovieRecord], path: &Path) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::NonNumeric)
        .from_path(path)
        .with_context(|| format!("Failed to create export file: {}", path.display()))?;

    for movie in movies {
        writer
            .serialize(movie)
            .with_context(|| format!("Failed to write movie {}", movie.id))?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to flush export file: {}", path.display()))?;

    info!("Exported {} movies to {}", movies.len(), path.display());
    Ok(())
}
