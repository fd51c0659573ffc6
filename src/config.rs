use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the document search server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Maximum accepted request body size for `POST /upload`.
    pub upload_body_limit: usize,
    /// Largest single file admitted by the upload validator.
    pub max_file_size: usize,
    /// Base URL of the S3-compatible object store.
    pub minio_endpoint: String,
    /// Access key used to sign object storage requests.
    pub minio_access_key: String,
    /// Secret key used to sign object storage requests.
    pub minio_secret_key: String,
    /// Signing region for the object store.
    pub minio_region: String,
    /// Bucket receiving uploaded documents.
    pub storage_bucket: String,
    /// Lifetime of presigned download URLs.
    pub signed_url_ttl: Duration,
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Vector index naming policy.
    pub index_mode: IndexMode,
    /// Collection used when `index_mode` is [`IndexMode::Shared`].
    pub shared_index_name: String,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Chunks sent per embedding request and per Qdrant upsert.
    pub embedding_batch_size: usize,
    /// Provider answering retrieval-augmented prompts.
    pub chat_provider: ChatProvider,
    /// Chat model identifier passed to the provider.
    pub chat_model: String,
    /// Sampling temperature for answers.
    pub chat_temperature: f32,
    /// API key for OpenAI-compatible endpoints.
    pub openai_api_key: Option<String>,
    /// Base URL for OpenAI-compatible endpoints.
    pub openai_base_url: String,
    /// Base URL of a local Ollama runtime.
    pub ollama_url: String,
    /// Target chunk length in characters.
    pub text_splitter_chunk_size: usize,
    /// Characters shared between neighbouring chunks.
    pub text_splitter_chunk_overlap: usize,
    /// Number of chunks retrieved per question.
    pub retrieval_limit: usize,
    /// Location of the OCR fixture served in lieu of a real OCR call.
    pub ocr_fixture_path: String,
    /// Timeout applied to every outbound HTTP request.
    pub http_timeout: Duration,
}

/// How vector indexes are assigned to documents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexMode {
    /// All documents share one collection; points carry their `file_id`.
    Shared,
    /// Each document gets its own collection named after its file id.
    PerDocument,
}

/// Supported embedding backends for the processing pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI embeddings API.
    OpenAI,
    /// Deterministic byte-hashing embeddings for offline use.
    Hash,
}

/// Supported chat-completion backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI chat completions API.
    OpenAI,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            server_port: parse_env_optional("SERVER_PORT")?,
            upload_body_limit: parse_env_or("UPLOAD_BODY_LIMIT", 64 * 1024 * 1024)?,
            max_file_size: parse_env_or("MAX_FILE_SIZE", 10 * 1024 * 1024)?,
            minio_endpoint: load_env_or("MINIO_ENDPOINT", "http://host.docker.internal:9000"),
            minio_access_key: load_env_or("MINIO_ROOT_USER", "minioadmin"),
            minio_secret_key: load_env_or("MINIO_ROOT_PASSWORD", "minioadmin"),
            minio_region: load_env_or("MINIO_REGION", "us-east-1"),
            storage_bucket: load_env_or("STORAGE_BUCKET", "uploads"),
            signed_url_ttl: Duration::from_secs(parse_env_or("SIGNED_URL_TTL_SECS", 3600)?),
            qdrant_url: load_env_or("QDRANT_URL", "http://127.0.0.1:6333"),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            index_mode: parse_env_or("INDEX_MODE", IndexMode::Shared)?,
            shared_index_name: load_env_or("SHARED_INDEX_NAME", "microdocsearch"),
            embedding_provider: parse_env_or("EMBEDDING_PROVIDER", EmbeddingProvider::OpenAI)?,
            embedding_model: load_env_or("EMBEDDING_MODEL", "text-embedding-3-small"),
            embedding_dimension: parse_env_or("EMBEDDING_DIMENSION", 1536)?,
            embedding_batch_size: parse_env_or("EMBEDDING_BATCH_SIZE", 512)?,
            chat_provider: parse_env_or("CHAT_PROVIDER", ChatProvider::OpenAI)?,
            chat_model: load_env_or("CHAT_MODEL", "gpt-3.5-turbo-0125"),
            chat_temperature: parse_env_or("CHAT_TEMPERATURE", 0.0)?,
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: load_env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            ollama_url: load_env_or("OLLAMA_URL", "http://127.0.0.1:11434"),
            text_splitter_chunk_size: parse_env_or("TEXT_SPLITTER_CHUNK_SIZE", 1000)?,
            text_splitter_chunk_overlap: parse_env_or("TEXT_SPLITTER_CHUNK_OVERLAP", 200)?,
            retrieval_limit: parse_env_or("RETRIEVAL_LIMIT", 4)?,
            ocr_fixture_path: load_env_or("OCR_FIXTURE_PATH", "./ocr/sample.json"),
            http_timeout: Duration::from_secs(parse_env_or("HTTP_TIMEOUT_SECS", 30)?),
        };

        if config.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if config.embedding_batch_size == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_BATCH_SIZE".into()));
        }
        if config.text_splitter_chunk_overlap >= config.text_splitter_chunk_size {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_OVERLAP".into(),
            ));
        }
        let needs_openai_key = config.embedding_provider == EmbeddingProvider::OpenAI
            || config.chat_provider == ChatProvider::OpenAI;
        if needs_openai_key && config.openai_api_key.is_none() {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".into()));
        }

        Ok(config)
    }
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_optional<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn parse_env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    Ok(parse_env_optional(key)?.unwrap_or(default))
}

impl FromStr for IndexMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shared" => Ok(Self::Shared),
            "per-document" | "per_document" | "document" => Ok(Self::PerDocument),
            _ => Err(()),
        }
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

impl FromStr for ChatProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

/// Load configuration from the environment once per process.
///
/// Later calls return the configuration loaded by the first successful call.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    static CONFIG: OnceLock<Config> = OnceLock::new();
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        minio_endpoint = %config.minio_endpoint,
        bucket = %config.storage_bucket,
        qdrant_url = %config.qdrant_url,
        index_mode = ?config.index_mode,
        embedding_provider = ?config.embedding_provider,
        chat_provider = ?config.chat_provider,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
