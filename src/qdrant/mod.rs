//! Qdrant vector store integration.

pub mod client;
pub mod payload;
pub mod types;

pub use client::QdrantService;
pub use payload::compute_chunk_hash;
pub use types::{ChunkPoint, QdrantError, ScoredPoint};

use async_trait::async_trait;

/// Vector index operations used by the OCR and extract flows.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Names of every index currently present.
    async fn list_indexes(&self) -> Result<Vec<String>, QdrantError>;

    /// Whether an index with the given name exists.
    async fn index_exists(&self, name: &str) -> Result<bool, QdrantError>;

    /// Create an index for vectors of `dimension` components.
    async fn create_index(&self, name: &str, dimension: usize) -> Result<(), QdrantError>;

    /// Store embedded chunks, returning the number of points written.
    async fn upsert_chunks(&self, name: &str, points: Vec<ChunkPoint>)
    -> Result<usize, QdrantError>;

    /// Nearest-neighbour search, optionally restricted to a single document.
    async fn search(
        &self,
        name: &str,
        vector: Vec<f32>,
        limit: usize,
        file_id: Option<&str>,
    ) -> Result<Vec<ScoredPoint>, QdrantError>;
}
