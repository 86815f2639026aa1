use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Kind of a metadata column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Numeric,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub kind: FieldKind,
}

/// Description of a built index, saved so it can be reopened without re-embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub index_name: String,
    pub vector_field: String,
    pub content_field: String,
    pub dimension: usize,
    pub distance_metric: String,
    pub document_count: u64,
    pub created_at: String,
    pub fields: Vec<SchemaField>,
}

impl IndexSchema {
    /// Schema for the movie index with the given vector dimension
    #[inline]
    pub fn for_movies(index_name: &str, dimension: usize, document_count: u64) -> Self {
        let field = |name: &str, kind| SchemaField {
            name: name.to_string(),
            kind,
        };

        Self {
            index_name: index_name.to_string(),
            vector_field: "vector".to_string(),
            content_field: "content".to_string(),
            dimension,
            distance_metric: "cosine".to_string(),
            document_count,
            created_at: Utc::now().to_rfc3339(),
            fields: vec![
                field("id", FieldKind::Tag),
                field("title", FieldKind::Text),
                field("year", FieldKind::Numeric),
                field("origin", FieldKind::Text),
                field("director", FieldKind::Text),
                field("cast", FieldKind::Text),
                field("genre", FieldKind::Text),
                field("wiki_page", FieldKind::Text),
                field("n_tokens", FieldKind::Numeric),
            ],
        }
    }

    #[inline]
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize index schema")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write index schema: {}", path.display()))?;
        Ok(())
    }

    #[inline]
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!(
                "Index schema not found at {}. Run 'movie-chat index' first.",
                path.display()
            ));
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read index schema: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse index schema: {}", path.display()))
    }
}
