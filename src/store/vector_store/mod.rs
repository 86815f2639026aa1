
use super::{DocumentMetadata, GenreFilter, IndexSchema, MovieDocument, MovieEmbedding};
use crate::{MovieChatError, Result, config::Config};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatchIterator, StringArray,
    UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Movie plot index stored in LanceDB, searched by cosine distance
pub struct MovieVectorStore {
    connection: Connection,
    table_name: String,
    schema_path: PathBuf,
    vector_dimension: Option<usize>,
}

/// A movie returned by a similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: MovieDocument,
    /// Cosine distance, lower is closer
    pub distance: f32,
    /// `1 - distance`, higher is closer
    pub similarity_score: f32,
}

impl ScoredDocument {
    /// Similarity rounded to four decimal places for display
    #[inline]
    pub fn display_score(&self) -> f32 {
        (self.similarity_score * 10_000.0).round() / 10_000.0
    }
}

impl MovieVectorStore {
    /// Connect to the store under the application directory
    ///
    /// The index table is not created here; see [`Self::create_index`].
    #[inline]
    pub async fn connect(config: &Config) -> Result<Self> {
        let db_path = config.vector_database_path();
        debug!("Opening LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(&db_path).map_err(|e| {
            MovieChatError::VectorStore(format!(
                "Failed to create vector database directory: {}",
                e
            ))
        })?;

        let uri = format!("file://{}", db_path.display());

        let connection = match lancedb::connect(&uri).execute().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to connect to LanceDB: {}", e);

                let error_msg = e.to_string().to_lowercase();
                if error_msg.contains("corrupt")
                    || error_msg.contains("invalid")
                    || error_msg.contains("malformed")
                {
                    warn!("Database corruption detected, attempting recovery");
                    Self::attempt_corruption_recovery(&db_path)?;

                    lancedb::connect(&uri).execute().await.map_err(|e| {
                        MovieChatError::VectorStore(format!(
                            "Failed to connect to LanceDB after recovery: {}",
                            e
                        ))
                    })?
                } else {
                    return Err(MovieChatError::VectorStore(format!(
                        "Failed to connect to LanceDB: {}",
                        e
                    )));
                }
            }
        };

        let mut store = Self {
            connection,
            table_name: config.retrieval.index_name.clone(),
            schema_path: config.schema_path(),
            vector_dimension: None,
        };

        if store.exists().await? {
            match store.detect_existing_vector_dimension().await {
                Ok(dim) => {
                    debug!("Detected existing vector dimension: {}", dim);
                    store.vector_dimension = Some(dim);
                }
                Err(e) => warn!("Could not detect vector dimension of existing index: {}", e),
            }
        }

        Ok(store)
    }

    /// Open an index built earlier, checking it against its saved schema
    #[inline]
    pub async fn from_existing_index(config: &Config) -> Result<Self> {
        let store = Self::connect(config).await?;

        let schema = store.read_schema()?;
        if schema.index_name != store.table_name {
            return Err(MovieChatError::VectorStore(format!(
                "Schema at {} describes index '{}', expected '{}'",
                store.schema_path.display(),
                schema.index_name,
                store.table_name
            )));
        }

        if !store.exists().await? {
            return Err(MovieChatError::VectorStore(format!(
                "Index '{}' not found. Run 'movie-chat index' first.",
                store.table_name
            )));
        }

        match store.vector_dimension {
            Some(dim) if dim == schema.dimension => {}
            Some(dim) => {
                return Err(MovieChatError::VectorStore(format!(
                    "Index '{}' holds {}-dimensional vectors but its schema says {}",
                    store.table_name, dim, schema.dimension
                )));
            }
            None => {
                return Err(MovieChatError::VectorStore(format!(
                    "Could not determine vector dimension of index '{}'",
                    store.table_name
                )));
            }
        }

        info!(
            "Opened index '{}' ({} dimensions, {} documents at build time)",
            store.table_name, schema.dimension, schema.document_count
        );
        Ok(store)
    }

    #[inline]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    #[inline]
    pub fn vector_dimension(&self) -> Option<usize> {
        self.vector_dimension
    }

    #[inline]
    pub fn schema_path(&self) -> &Path {
        &self.schema_path
    }

    #[inline]
    pub fn write_schema(&self, schema: &IndexSchema) -> Result<()> {
        schema.write(&self.schema_path)?;
        Ok(())
    }

    #[inline]
    pub fn read_schema(&self) -> Result<IndexSchema> {
        Ok(IndexSchema::read(&self.schema_path)?)
    }

    /// Whether the index table exists
    #[inline]
    pub async fn exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| MovieChatError::VectorStore(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.contains(&self.table_name))
    }

    /// Build the index from scratch: drop any previous table, store every
    /// embedding, and save the schema next to the database
    #[inline]
    pub async fn create_index(&mut self, embeddings: &[MovieEmbedding]) -> Result<IndexSchema> {
        let vector_dim = embeddings
            .first()
            .map(|embedding| embedding.vector.len())
            .ok_or_else(|| {
                MovieChatError::VectorStore("Cannot create an index without documents".to_string())
            })?;

        info!(
            "Creating index '{}' with {} documents of {} dimensions",
            self.table_name,
            embeddings.len(),
            vector_dim
        );

        self.drop_table_if_exists().await?;
        self.connection
            .create_empty_table(&self.table_name, Self::create_schema(vector_dim))
            .execute()
            .await
            .map_err(|e| MovieChatError::VectorStore(format!("Failed to create table: {}", e)))?;
        self.vector_dimension = Some(vector_dim);

        self.add_documents(embeddings).await?;

        let document_count = self.count().await?;
        let schema = IndexSchema::for_movies(&self.table_name, vector_dim, document_count);
        self.write_schema(&schema)?;

        info!(
            "Index '{}' created, schema written to {}",
            self.table_name,
            self.schema_path.display()
        );
        Ok(schema)
    }

    /// Append embeddings to the existing index
    #[inline]
    pub async fn add_documents(&mut self, embeddings: &[MovieEmbedding]) -> Result<usize> {
        if embeddings.is_empty() {
            debug!("No documents to add");
            return Ok(0);
        }

        let vector_dim = self.vector_dimension.ok_or_else(|| {
            MovieChatError::VectorStore(format!(
                "Index '{}' does not exist yet",
                self.table_name
            ))
        })?;

        if let Some(bad) = embeddings.iter().find(|e| e.vector.len() != vector_dim) {
            return Err(MovieChatError::VectorStore(format!(
                "Embedding for '{}' has {} dimensions, index expects {}",
                bad.movie.title,
                bad.vector.len(),
                vector_dim
            )));
        }

        let record_batch = Self::create_record_batch(embeddings, vector_dim)?;
        let table = self.open_table().await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table.add(reader).execute().await.map_err(|e| {
            MovieChatError::VectorStore(format!("Failed to insert documents: {}", e))
        })?;

        debug!("Stored {} documents", embeddings.len());
        Ok(embeddings.len())
    }

    /// Return the `k` movies closest to the query vector, closest first
    #[inline]
    pub async fn similarity_search_with_score(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: Option<&GenreFilter>,
    ) -> Result<Vec<ScoredDocument>> {
        if let Some(dim) = self
            .vector_dimension
            .filter(|dim| *dim != query_vector.len())
        {
            return Err(MovieChatError::VectorStore(format!(
                "Query vector has {} dimensions, index expects {}",
                query_vector.len(),
                dim
            )));
        }

        debug!("Searching '{}' for {} nearest movies", self.table_name, k);

        let table = self.open_table().await?;
        let mut query = table
            .vector_search(query_vector)
            .map_err(|e| {
                MovieChatError::VectorStore(format!("Failed to create vector search: {}", e))
            })?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(k);

        if let Some(filter) = filter {
            query = query.only_if(filter.to_predicate());
        }

        let mut results = query
            .execute()
            .await
            .map_err(|e| MovieChatError::VectorStore(format!("Failed to execute search: {}", e)))?;

        let mut documents = Vec::new();
        while let Some(batch) = results.try_next().await.map_err(|e| {
            MovieChatError::VectorStore(format!("Failed to read result stream: {}", e))
        })? {
            documents.extend(Self::parse_search_batch(&batch)?);
        }

        documents.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        documents.truncate(k);
        Ok(documents)
    }

    /// Number of documents in the index
    #[inline]
    pub async fn count(&self) -> Result<u64> {
        let table = self.open_table().await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| MovieChatError::VectorStore(format!("Failed to count rows: {}", e)))?;
        Ok(count as u64)
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| {
                MovieChatError::VectorStore(format!(
                    "Failed to open index '{}': {}",
                    self.table_name, e
                ))
            })
    }

    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let schema = self.open_table().await?.schema().await.map_err(|e| {
            MovieChatError::VectorStore(format!("Failed to get table schema: {}", e))
        })?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(MovieChatError::VectorStore(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("title", DataType::Utf8, false),
            Field::new("year", DataType::Int32, false),
            Field::new("origin", DataType::Utf8, false),
            Field::new("director", DataType::Utf8, false),
            Field::new("cast", DataType::Utf8, false),
            Field::new("genre", DataType::Utf8, false),
            Field::new("wiki_page", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("n_tokens", DataType::UInt32, false),
        ]))
    }

    fn create_record_batch(embeddings: &[MovieEmbedding], vector_dim: usize) -> Result<RecordBatch> {
        let len = embeddings.len();

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);
        let mut titles = Vec::with_capacity(len);
        let mut years = Vec::with_capacity(len);
        let mut origins = Vec::with_capacity(len);
        let mut directors = Vec::with_capacity(len);
        let mut casts = Vec::with_capacity(len);
        let mut genres = Vec::with_capacity(len);
        let mut wiki_pages = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut token_counts = Vec::with_capacity(len);

        for MovieEmbedding { vector, movie } in embeddings {
            ids.push(movie.id.to_string());
            flat_values.extend_from_slice(vector);
            titles.push(movie.title.as_str());
            years.push(movie.year);
            origins.push(movie.origin.as_str());
            directors.push(movie.director.as_str());
            casts.push(movie.cast.as_str());
            genres.push(movie.genre.as_str());
            wiki_pages.push(movie.wiki_page.as_str());
            contents.push(movie.plot.as_str());
            token_counts.push(u32::try_from(movie.n_tokens).unwrap_or(u32::MAX));
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    MovieChatError::VectorStore(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(titles)),
            Arc::new(Int32Array::from(years)),
            Arc::new(StringArray::from(origins)),
            Arc::new(StringArray::from(directors)),
            Arc::new(StringArray::from(casts)),
            Arc::new(StringArray::from(genres)),
            Arc::new(StringArray::from(wiki_pages)),
            Arc::new(StringArray::from(contents)),
            Arc::new(UInt32Array::from(token_counts)),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim), arrays).map_err(|e| {
            MovieChatError::VectorStore(format!("Failed to create record batch: {}", e))
        })
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<ScoredDocument>> {
        fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
            batch
                .column_by_name(name)
                .ok_or_else(|| MovieChatError::VectorStore(format!("Missing {} column", name)))?
                .as_any()
                .downcast_ref::<T>()
                .ok_or_else(|| {
                    MovieChatError::VectorStore(format!("Invalid {} column type", name))
                })
        }

        let ids = column::<StringArray>(batch, "id")?;
        let titles = column::<StringArray>(batch, "title")?;
        let years = column::<Int32Array>(batch, "year")?;
        let origins = column::<StringArray>(batch, "origin")?;
        let directors = column::<StringArray>(batch, "director")?;
        let casts = column::<StringArray>(batch, "cast")?;
        let genres = column::<StringArray>(batch, "genre")?;
        let wiki_pages = column::<StringArray>(batch, "wiki_page")?;
        let contents = column::<StringArray>(batch, "content")?;
        let distances = column::<Float32Array>(batch, "_distance")?;

        let documents = (0..batch.num_rows())
            .map(|row| {
                if distances.is_null(row) {
                    return Err(MovieChatError::VectorStore(format!(
                        "Search result for '{}' has no distance",
                        titles.value(row)
                    )));
                }
                let distance = distances.value(row);

                Ok(ScoredDocument {
                    document: MovieDocument {
                        page_content: contents.value(row).to_string(),
                        metadata: DocumentMetadata {
                            id: ids.value(row).to_string(),
                            title: titles.value(row).to_string(),
                            year: years.value(row),
                            origin: origins.value(row).to_string(),
                            director: directors.value(row).to_string(),
                            cast: casts.value(row).to_string(),
                            genre: genres.value(row).to_string(),
                            wiki_page: wiki_pages.value(row).to_string(),
                        },
                    },
                    distance,
                    similarity_score: 1.0 - distance,
                })
            })
            .collect();

        documents
    }

    async fn drop_table_if_exists(&self) -> Result<()> {
        if self.exists().await? {
            info!("Dropping existing index '{}'", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| MovieChatError::VectorStore(format!("Failed to drop table: {}", e)))?;
        }
        Ok(())
    }

    fn attempt_corruption_recovery(db_path: &Path) -> Result<()> {
        warn!("Attempting database corruption recovery at {:?}", db_path);

        if db_path.exists() {
            let backup_path = db_path.with_extension("corrupted_backup");
            if let Err(e) = std::fs::rename(db_path, &backup_path) {
                error!("Failed to backup corrupted database: {}", e);
            } else {
                info!("Corrupted database backed up to {:?}", backup_path);
            }
        }

        if db_path.exists() {
            std::fs::remove_dir_all(db_path).map_err(|e| {
                MovieChatError::VectorStore(format!("Failed to remove corrupted database: {}", e))
            })?;
        }

        Ok(())
    }
}
