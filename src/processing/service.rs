//! Document service sequencing storage, OCR, chunking, embedding, Qdrant, and the chat model.

use crate::{
    config::{Config, IndexMode},
    embedding::{EmbeddingClient, build_embedding_client},
    generation::{ChatClient, ChatRequest, build_chat_client, build_rag_prompt},
    metrics::{MetricsSnapshot, ServiceMetrics},
    ocr::{FixtureExtractor, TextExtractor},
    processing::{
        chunking::TextSegmenter,
        types::{IndexingOutcome, ServiceError, StartupError, UploadReceipt},
        validation::{FileValidator, UploadedFile},
    },
    qdrant::{ChunkPoint, QdrantService, VectorStore},
    storage::{MinioStore, ObjectStore},
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Tunables the service reads on every request.
#[derive(Debug, Clone)]
pub struct DocumentSettings {
    /// Vector index naming policy.
    pub index_mode: IndexMode,
    /// Collection used in [`IndexMode::Shared`].
    pub shared_index_name: String,
    /// Expected embedding length.
    pub embedding_dimension: usize,
    /// Chunks embedded and upserted per request.
    pub embedding_batch_size: usize,
    /// Lifetime of issued download URLs.
    pub signed_url_ttl: Duration,
    /// Chunks retrieved per question.
    pub retrieval_limit: usize,
    /// Chat model answering questions.
    pub chat_model: String,
    /// Sampling temperature for answers.
    pub chat_temperature: f32,
}

impl DocumentSettings {
    /// Copy the request-time settings out of the process configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            index_mode: config.index_mode,
            shared_index_name: config.shared_index_name.clone(),
            embedding_dimension: config.embedding_dimension,
            embedding_batch_size: config.embedding_batch_size,
            signed_url_ttl: config.signed_url_ttl,
            retrieval_limit: config.retrieval_limit,
            chat_model: config.chat_model.clone(),
            chat_temperature: config.chat_temperature,
        }
    }
}

/// Collaborators and policy objects a [`DocumentService`] is assembled from.
pub struct DocumentServiceParts {
    /// Object store holding uploads.
    pub storage: Arc<dyn ObjectStore>,
    /// Vector index receiving embedded chunks.
    pub index: Arc<dyn VectorStore>,
    /// Embedding provider.
    pub embeddings: Arc<dyn EmbeddingClient>,
    /// Chat-completion provider.
    pub chat: Arc<dyn ChatClient>,
    /// Text extraction source.
    pub extractor: Arc<dyn TextExtractor>,
    /// Upload admission policy.
    pub validator: FileValidator,
    /// Chunking policy.
    pub segmenter: TextSegmenter,
    /// Request-time settings.
    pub settings: DocumentSettings,
}

/// Coordinates the upload, OCR, and question-answering flows.
///
/// Construct the service once near process start and share it through an `Arc`; every
/// collaborator handle is safe for concurrent use.
pub struct DocumentService {
    storage: Arc<dyn ObjectStore>,
    index: Arc<dyn VectorStore>,
    embeddings: Arc<dyn EmbeddingClient>,
    chat: Arc<dyn ChatClient>,
    extractor: Arc<dyn TextExtractor>,
    validator: FileValidator,
    segmenter: TextSegmenter,
    settings: DocumentSettings,
    metrics: Arc<ServiceMetrics>,
}

/// Abstraction over the document pipeline used by the HTTP surface.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Validate and store a batch of files, returning an id and download URL for each.
    async fn upload(&self, files: Vec<UploadedFile>) -> Result<Vec<UploadReceipt>, ServiceError>;

    /// Extract, chunk, embed, and index a stored document.
    async fn ocr(&self, file_id: &str) -> Result<IndexingOutcome, ServiceError>;

    /// Answer `query` using chunks retrieved from the document's index.
    async fn extract(&self, file_id: &str, query: &str) -> Result<String, ServiceError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl DocumentService {
    /// Assemble a service from explicit collaborators.
    pub fn new(parts: DocumentServiceParts) -> Self {
        Self {
            storage: parts.storage,
            index: parts.index,
            embeddings: parts.embeddings,
            chat: parts.chat,
            extractor: parts.extractor,
            validator: parts.validator,
            segmenter: parts.segmenter,
            settings: parts.settings,
            metrics: Arc::new(ServiceMetrics::new()),
        }
    }

    /// Build the production collaborators described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, StartupError> {
        let storage = MinioStore::new(config)?;
        let index = QdrantService::new(config)?;
        let embeddings = build_embedding_client(config)?;
        let chat = build_chat_client(config)?;
        let segmenter = TextSegmenter::new(
            config.text_splitter_chunk_size,
            config.text_splitter_chunk_overlap,
        )?;
        tracing::info!(
            bucket = %config.storage_bucket,
            index_mode = ?config.index_mode,
            chunk_size = segmenter.chunk_size(),
            chunk_overlap = segmenter.chunk_overlap(),
            ocr_fixture = %config.ocr_fixture_path,
            "Document service initialized"
        );

        Ok(Self::new(DocumentServiceParts {
            storage: Arc::new(storage),
            index: Arc::new(index),
            embeddings,
            chat,
            extractor: Arc::new(FixtureExtractor::new(&config.ocr_fixture_path)),
            validator: FileValidator::new(config.max_file_size),
            segmenter,
            settings: DocumentSettings::from_config(config),
        }))
    }

    fn index_name<'a>(&'a self, file_id: &'a str) -> &'a str {
        match self.settings.index_mode {
            IndexMode::Shared => &self.settings.shared_index_name,
            IndexMode::PerDocument => file_id,
        }
    }

    /// Store every file of the batch once all of them pass validation.
    pub async fn upload(
        &self,
        files: Vec<UploadedFile>,
    ) -> Result<Vec<UploadReceipt>, ServiceError> {
        if files.is_empty() {
            return Err(ServiceError::InvalidInput("No file uploaded".into()));
        }

        let admitted = self.validator.validate_batch(files)?;
        let upload_failed = |error: &dyn std::fmt::Display| {
            ServiceError::Dependency(format!("Error uploading file: {error}"))
        };

        self.storage.ensure_bucket().await.map_err(|error| {
            tracing::error!(bucket = self.storage.bucket(), error = %error, "Bucket unavailable");
            upload_failed(&error)
        })?;

        let mut receipts = Vec::with_capacity(admitted.len());
        for upload in admitted {
            let file_id = Uuid::new_v4().to_string();
            let size = upload.file.size();
            self.storage
                .put_object(&file_id, upload.file.data, upload.mime_type)
                .await
                .map_err(|error| {
                    tracing::error!(
                        file_id = %file_id,
                        filename = %upload.file.filename,
                        error = %error,
                        "Upload failed"
                    );
                    upload_failed(&error)
                })?;

            let signed_url = self
                .storage
                .presigned_get_url(&file_id, self.settings.signed_url_ttl);
            tracing::info!(
                file_id = %file_id,
                filename = %upload.file.filename,
                mime_type = upload.mime_type,
                size,
                "File stored"
            );
            receipts.push(UploadReceipt {
                file_id,
                signed_url,
            });
        }

        self.metrics.record_uploads(receipts.len() as u64);
        Ok(receipts)
    }

    /// Run simulated OCR over a stored document and index its chunks.
    pub async fn ocr(&self, file_id: &str) -> Result<IndexingOutcome, ServiceError> {
        if file_id.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "File ID cannot be empty or of only whitespace.".into(),
            ));
        }

        let ocr_failed = |error: &dyn std::fmt::Display| {
            ServiceError::Dependency(format!("Error during OCR processing: {error}"))
        };

        let object = match self.storage.stat_object(file_id).await {
            Ok(Some(object)) => object,
            Ok(None) => {
                tracing::info!(file_id, "OCR requested for unknown file");
                return Err(ServiceError::NotFound(format!("File not found: {file_id}")));
            }
            Err(error) => {
                tracing::error!(file_id, error = %error, "Object lookup failed");
                return Err(ocr_failed(&error));
            }
        };

        let text = self.extractor.extract(&object).await.map_err(|error| {
            tracing::error!(file_id, error = %error, "Text extraction failed");
            ocr_failed(&error)
        })?;
        let chunks = self.segmenter.split(&text);
        tracing::debug!(
            file_id,
            chars = text.chars().count(),
            chunks = chunks.len(),
            "Document segmented"
        );

        let index_name = self.index_name(file_id).to_string();
        let exists = self.index.index_exists(&index_name).await.map_err(|error| {
            tracing::error!(file_id, index = %index_name, error = %error, "Index lookup failed");
            ocr_failed(&error)
        })?;
        match (self.settings.index_mode, exists) {
            (IndexMode::PerDocument, true) => {
                return Err(ServiceError::InvalidInput(format!(
                    "Vector index already exists for file {file_id}."
                )));
            }
            (_, false) => {
                self.index
                    .create_index(&index_name, self.settings.embedding_dimension)
                    .await
                    .map_err(|error| {
                        tracing::error!(index = %index_name, error = %error, "Index creation failed");
                        ocr_failed(&error)
                    })?;
                tracing::info!(index = %index_name, "Index created");
            }
            (IndexMode::Shared, true) => {}
        }

        let batch_size = self.settings.embedding_batch_size.max(1);
        let mut chunk_count = 0;
        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = self
                .embeddings
                .generate_embeddings(texts)
                .await
                .map_err(|error| {
                    tracing::error!(file_id, error = %error, "Chunk embedding failed");
                    ocr_failed(&error)
                })?;
            if vectors.len() != batch.len() {
                return Err(ocr_failed(&format!(
                    "expected {} embeddings, received {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            if let Some(vector) = vectors
                .iter()
                .find(|vector| vector.len() != self.settings.embedding_dimension)
            {
                return Err(ocr_failed(&format!(
                    "embedding dimension mismatch (expected {}, got {})",
                    self.settings.embedding_dimension,
                    vector.len()
                )));
            }

            let points: Vec<ChunkPoint> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| ChunkPoint {
                    file_id: file_id.to_string(),
                    chunk_index: chunk.index,
                    byte_offset: chunk.byte_offset,
                    text: chunk.text.clone(),
                    vector,
                })
                .collect();

            chunk_count += self
                .index
                .upsert_chunks(&index_name, points)
                .await
                .map_err(|error| {
                    tracing::error!(file_id, index = %index_name, error = %error, "Chunk upsert failed");
                    ocr_failed(&error)
                })?;
            tracing::debug!(file_id, index = %index_name, written = chunk_count, "Chunk batch indexed");
        }

        self.metrics.record_document(chunk_count as u64);
        tracing::info!(file_id, index = %index_name, chunks = chunk_count, "Document indexed");

        Ok(IndexingOutcome {
            index_name,
            chunk_count,
        })
    }

    /// Answer a question with retrieval-augmented generation over one document.
    pub async fn extract(&self, file_id: &str, query: &str) -> Result<String, ServiceError> {
        if file_id.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "File ID cannot be empty or of only whitespace.".into(),
            ));
        }
        if query.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "Query cannot be empty or of only whitespace.".into(),
            ));
        }

        let index_name = self.index_name(file_id).to_string();
        let exists = self.index.index_exists(&index_name).await.map_err(|error| {
            tracing::error!(file_id, index = %index_name, error = %error, "Index lookup failed");
            ServiceError::Internal
        })?;
        if !exists {
            return Err(ServiceError::InvalidInput(format!(
                "No index found for file {file_id}."
            )));
        }

        let context = self
            .retrieve(file_id, &index_name, query)
            .await
            .map_err(|error| {
                tracing::error!(file_id, index = %index_name, error = %error, "An error occurred at /extract");
                ServiceError::Internal
            })?;
        if context.is_empty() && self.settings.index_mode == IndexMode::Shared {
            tracing::info!(file_id, index = %index_name, "No chunks stored for file");
            return Err(ServiceError::InvalidInput(format!(
                "No index found for file {file_id}."
            )));
        }

        let answer = self
            .chat
            .complete(ChatRequest {
                model: self.settings.chat_model.clone(),
                prompt: build_rag_prompt(query, &context),
                temperature: self.settings.chat_temperature,
            })
            .await
            .map_err(|error| {
                tracing::error!(file_id, error = %error, "An error occurred at /extract");
                ServiceError::Internal
            })?;

        self.metrics.record_query();
        tracing::info!(file_id, answer = %answer, "Extracted response");
        Ok(answer)
    }

    /// Embed the question and collect the text of the closest chunks.
    async fn retrieve(
        &self,
        file_id: &str,
        index_name: &str,
        query: &str,
    ) -> anyhow::Result<Vec<String>> {
        let vector = self
            .embeddings
            .generate_embeddings(vec![query.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedding provider returned no vector for the query"))?;

        let filter = match self.settings.index_mode {
            IndexMode::Shared => Some(file_id),
            IndexMode::PerDocument => None,
        };
        let hits = self
            .index
            .search(index_name, vector, self.settings.retrieval_limit, filter)
            .await?;
        let context: Vec<String> = hits
            .iter()
            .filter_map(|hit| hit.text())
            .map(str::to_string)
            .collect();
        tracing::debug!(file_id, hits = hits.len(), context = context.len(), "Context retrieved");
        Ok(context)
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl DocumentApi for DocumentService {
    async fn upload(&self, files: Vec<UploadedFile>) -> Result<Vec<UploadReceipt>, ServiceError> {
        DocumentService::upload(self, files).await
    }

    async fn ocr(&self, file_id: &str) -> Result<IndexingOutcome, ServiceError> {
        DocumentService::ocr(self, file_id).await
    }

    async fn extract(&self, file_id: &str, query: &str) -> Result<String, ServiceError> {
        DocumentService::extract(self, file_id, query).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        DocumentService::metrics_snapshot(self)
    }
}
