//! Core data types and error definitions for the document pipeline.

use crate::{
    embedding::EmbeddingClientError, generation::ChatClientError, qdrant::QdrantError,
    storage::StorageError,
};
use serde::Serialize;
use thiserror::Error;

/// Reasons an uploaded file is refused before it reaches storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The file is larger than the configured ceiling.
    #[error("File size exceeds the limit of {limit} bytes.")]
    SizeExceeded {
        /// Maximum accepted size in bytes.
        limit: usize,
    },
    /// The filename extension is not on the allow-list.
    #[error("File type {extension} not allowed.")]
    ExtensionNotAllowed {
        /// Lower-cased extension including the leading dot (empty when absent).
        extension: String,
    },
    /// The MIME type sniffed from the content is not on the allow-list.
    #[error("File type {mime_type} is not allowed.")]
    TypeNotAllowed {
        /// MIME type derived from the file signature.
        mime_type: String,
    },
}

/// Errors produced while configuring the text segmenter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible chunk budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must leave room for new text in every chunk.
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge {
        /// Requested overlap in characters.
        overlap: usize,
        /// Requested chunk size in characters.
        chunk_size: usize,
    },
}

/// Errors surfaced by [`crate::processing::DocumentService`], classified by who is at fault.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request itself is unacceptable (maps to `400`).
    #[error("{0}")]
    InvalidInput(String),
    /// The referenced document does not exist (maps to `404`).
    #[error("{0}")]
    NotFound(String),
    /// A collaborator failed; the message names the operation and the cause (maps to `500`).
    #[error("{0}")]
    Dependency(String),
    /// Retrieval or generation failed; details are logged rather than returned (maps to `500`).
    #[error("Internal server error")]
    Internal,
}

/// Errors raised while assembling the production collaborators at startup.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Object store client could not be built.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Qdrant client could not be built.
    #[error(transparent)]
    Index(#[from] QdrantError),
    /// Embedding provider could not be built.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Chat provider could not be built.
    #[error(transparent)]
    Chat(#[from] ChatClientError),
    /// Chunking parameters are inconsistent.
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
}

impl From<ValidationError> for ServiceError {
    fn from(error: ValidationError) -> Self {
        Self::InvalidInput(error.to_string())
    }
}

/// Identifier and download link for one stored upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    /// Generated object identifier.
    pub file_id: String,
    /// Time-limited download URL for the stored object.
    pub signed_url: String,
}

/// Summary of a completed OCR-and-index run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingOutcome {
    /// Collection the chunks were written to.
    pub index_name: String,
    /// Number of chunks embedded and upserted.
    pub chunk_count: usize,
}
