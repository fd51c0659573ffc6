#![deny(missing_docs)]

//! Core library for the document search service: upload validation, OCR-driven indexing, and
//! retrieval-augmented answers over stored documents.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Chat-completion client abstraction and prompt assembly.
pub mod generation;
/// Structured logging and tracing setup.
pub mod logging;
/// Service counters.
pub mod metrics;
/// Text extraction for stored documents.
pub mod ocr;
/// Document processing pipeline utilities.
pub mod processing;
/// Qdrant vector store integration.
pub mod qdrant;
/// S3-compatible object storage.
pub mod storage;
