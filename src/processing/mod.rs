//! Document pipeline: upload validation, chunking, and the service tying the gateways together.

pub mod chunking;
mod service;
pub mod types;
pub mod validation;

pub use chunking::{TextChunk, TextSegmenter};
pub use service::{DocumentApi, DocumentService, DocumentServiceParts, DocumentSettings};
pub use types::{
    ChunkingError, IndexingOutcome, ServiceError, StartupError, UploadReceipt, ValidationError,
};
pub use validation::{FileValidator, UploadedFile, ValidatedUpload, sniff_mime_type};
