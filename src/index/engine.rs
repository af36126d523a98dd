//! Indexing engine abstraction
//!
//! The engine does the expensive work (parsing, storing, compacting); the
//! coordinator only decides when to call it. Every call settles exactly once,
//! either `Ok(())` or an [`IndexEngineError`].

use async_trait::async_trait;
use std::path::PathBuf;

/// Errors reported by an indexing engine
#[derive(Debug, Clone, thiserror::Error)]
pub enum IndexEngineError {
    #[error("Indexer I/O error: {0}")]
    Io(String),

    #[error("No index database selected")]
    NoDatabase,

    #[error("Indexer exited with status {status:?}: {stderr}")]
    Failed { status: Option<i32>, stderr: String },
}

impl From<std::io::Error> for IndexEngineError {
    fn from(error: std::io::Error) -> Self {
        IndexEngineError::Io(error.to_string())
    }
}

/// Arguments of a single reindex call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexRequest {
    /// Project root paths for a full index, or a single file
    pub paths: Vec<PathBuf>,

    /// In-memory source to index instead of reading `paths` from disk
    pub source: Option<String>,

    /// Absolute paths skipped by the engine
    pub excluded_paths: Vec<PathBuf>,

    /// Extensions of files the engine picks up
    pub file_extensions: Vec<String>,
}

/// Operations the coordinator invokes on the indexing engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IndexEngine: Send + Sync {
    /// Create an empty index database
    async fn initialize(&self) -> Result<(), IndexEngineError>;

    /// Compact the index and drop entries for paths that no longer exist
    async fn vacuum(&self) -> Result<(), IndexEngineError>;

    /// (Re)index the given paths
    async fn reindex(&self, request: ReindexRequest) -> Result<(), IndexEngineError>;

    /// Select the index database subsequent calls operate on
    fn set_index_database_name(&self, name: &str);
}
