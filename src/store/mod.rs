// Vector store module
// LanceDB-backed movie index plus the persisted schema describing it

#[cfg(test)]
mod tests;

pub mod schema;
pub mod vector_store;

use serde::{Deserialize, Serialize};

use crate::dataset::MovieRecord;

pub use schema::IndexSchema;
pub use vector_store::{MovieVectorStore, ScoredDocument};

/// A movie plot with its embedding, ready to be stored
#[derive(Debug, Clone)]
pub struct MovieEmbedding {
    pub vector: Vec<f32>,
    pub movie: MovieRecord,
}

/// Metadata kept alongside each plot in the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub id: String,
    pub title: String,
    pub year: i32,
    pub origin: String,
    pub director: String,
    pub cast: String,
    pub genre: String,
    pub wiki_page: String,
}

/// A retrieved movie: the plot is the page content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieDocument {
    pub page_content: String,
    pub metadata: DocumentMetadata,
}

impl From<&MovieRecord> for MovieDocument {
    fn from(movie: &MovieRecord) -> Self {
        Self {
            page_content: movie.plot.clone(),
            metadata: DocumentMetadata {
                id: movie.id.to_string(),
                title: movie.title.clone(),
                year: movie.year,
                origin: movie.origin.clone(),
                director: movie.director.clone(),
                cast: movie.cast.clone(),
                genre: movie.genre.clone(),
                wiki_page: movie.wiki_page.clone(),
            },
        }
    }
}

/// Restricts a search to movies whose genre mentions the given term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreFilter {
    term: String,
}

impl GenreFilter {
    #[inline]
    pub fn new(term: &str) -> Self {
        Self {
            term: term.trim().to_lowercase(),
        }
    }

    #[inline]
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Case-insensitive SQL containment predicate for the store
    #[inline]
    pub fn to_predicate(&self) -> String {
        let escaped: String = self
            .term
            .chars()
            .filter(|c| *c != '%' && *c != '_')
            .collect::<String>()
            .replace('\'', "''");
        format!("lower(genre) LIKE '%{}%'", escaped)
    }
}
