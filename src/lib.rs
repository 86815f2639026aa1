use thiserror::Error;

pub type Result<T> = std::result::Result<T, MovieChatError>;

#[derive(Error, Debug)]
pub enum MovieChatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Chain error: {0}")]
    Chain(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod dataset;
pub mod embeddings;
pub mod indexer;
pub mod llm;
pub mod store;
pub mod terminal;
pub mod transport;
pub mod web;
