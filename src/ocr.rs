//! Text extraction for stored documents.
//!
//! Real OCR is out of scope; [`FixtureExtractor`] serves a pre-computed analysis result in the
//! Azure Document Intelligence layout (`analyzeResult.content`) for every object.

use crate::storage::ObjectInfo;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while extracting text.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The fixture could not be read from disk.
    #[error("Failed to read OCR fixture {path}: {source}")]
    Io {
        /// Fixture path that failed to load.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The fixture was not valid analysis JSON.
    #[error("Malformed OCR result: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Source of extracted text for stored objects.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract the full text content of `object`.
    async fn extract(&self, object: &ObjectInfo) -> Result<String, OcrError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisDocument {
    analyze_result: AnalyzeResult,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResult {
    content: String,
}

/// Extractor returning the content of a local analysis fixture regardless of the object.
#[derive(Debug, Clone)]
pub struct FixtureExtractor {
    path: PathBuf,
}

impl FixtureExtractor {
    /// Serve the fixture stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Pull `analyzeResult.content` out of an analysis JSON document.
pub fn parse_analysis(raw: &str) -> Result<String, OcrError> {
    let document: AnalysisDocument = serde_json::from_str(raw)?;
    Ok(document.analyze_result.content)
}

#[async_trait]
impl TextExtractor for FixtureExtractor {
    async fn extract(&self, object: &ObjectInfo) -> Result<String, OcrError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| OcrError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        let content = parse_analysis(&raw)?;
        tracing::debug!(
            file_id = %object.key,
            fixture = %self.path.display(),
            chars = content.chars().count(),
            "Simulated OCR result loaded"
        );
        Ok(content)
    }
}
