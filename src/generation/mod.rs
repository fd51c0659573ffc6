//! Chat-completion providers answering retrieval-augmented prompts.
//!
//! Both clients issue HTTP requests directly to the provider, mirroring the embedding adapters.

use crate::config::{ChatProvider, Config};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum ChatClientError {
    /// Provider was misconfigured or unreachable.
    #[error("Chat provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate answer: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Request payload passed to the chat provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Fully assembled prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Interface implemented by chat-completion providers.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Complete the prompt, returning the trimmed answer text.
    async fn complete(&self, request: ChatRequest) -> Result<String, ChatClientError>;
}

/// Assemble the question-answering prompt from a question and retrieved chunk texts.
pub fn build_rag_prompt<S: AsRef<str>>(question: &str, context: &[S]) -> String {
    let context = context
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "You are an assistant for question-answering tasks. Use the following pieces of \
         retrieved context to answer the question. If you don't know the answer, just say \
         that you don't know. Use three sentences maximum and keep the answer concise.\n\
         Question: {question} \nContext: {context} \nAnswer:"
    )
}

/// Build the chat client selected by the configuration.
pub fn build_chat_client(config: &Config) -> Result<Arc<dyn ChatClient>, ChatClientError> {
    let http = Client::builder()
        .user_agent("docsearch/chat")
        .timeout(config.http_timeout)
        .build()
        .map_err(|error| ChatClientError::ProviderUnavailable(error.to_string()))?;
    tracing::info!(provider = ?config.chat_provider, model = %config.chat_model, "Initializing chat client");

    let client: Arc<dyn ChatClient> = match config.chat_provider {
        ChatProvider::OpenAI => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                ChatClientError::ProviderUnavailable("OPENAI_API_KEY is not set".into())
            })?;
            Arc::new(OpenAiChatClient::new(http, &config.openai_base_url, api_key))
        }
        ChatProvider::Ollama => Arc::new(OllamaChatClient::new(http, &config.ollama_url)),
    };
    Ok(client)
}

/// Client for OpenAI-compatible `POST {base}/chat/completions` endpoints.
pub struct OpenAiChatClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiChatClient {
    /// Construct a client targeting `base_url`.
    pub fn new(http: Client, base_url: &str, api_key: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, ChatClientError> {
        let payload = json!({
            "model": request.model,
            "temperature": request.temperature,
            "messages": [
                { "role": "user", "content": request.prompt }
            ]
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                ChatClientError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatClientError::GenerationFailed(format!(
                "OpenAI returned {status}: {body}"
            )));
        }

        let body: OpenAiChatResponse = response.json().await.map_err(|error| {
            ChatClientError::InvalidResponse(format!("failed to decode completion: {error}"))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| ChatClientError::InvalidResponse("completion had no content".into()))
    }
}

/// Client for a local Ollama runtime's `POST /api/generate` endpoint.
pub struct OllamaChatClient {
    http: Client,
    base_url: String,
}

impl OllamaChatClient {
    /// Construct a client targeting the Ollama runtime at `base_url`.
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl ChatClient for OllamaChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, ChatClientError> {
        let payload = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": request.temperature,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                ChatClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ChatClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            ChatClientError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(ChatClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn http() -> Client {
        Client::builder()
            .user_agent("docsearch-test")
            .build()
            .expect("client")
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gpt-3.5-turbo-0125".into(),
            prompt: "Question: hello".into(),
            temperature: 0.0,
        }
    }

    #[test]
    fn rag_prompt_joins_context_with_blank_lines() {
        let prompt = build_rag_prompt("What is it?", &["first chunk", "second chunk"]);
        assert!(prompt.starts_with("You are an assistant for question-answering tasks."));
        assert!(prompt.contains("Question: What is it? \n"));
        assert!(prompt.contains("Context: first chunk\n\nsecond chunk \n"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[tokio::test]
    async fn openai_client_returns_first_choice() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .json_body_partial(r#"{"model":"gpt-3.5-turbo-0125","temperature":0.0}"#);
                then.status(200).json_body(json!({
                    "id": "chatcmpl-1",
                    "choices": [
                        { "index": 0, "message": { "role": "assistant", "content": "  It is a test.\n" } }
                    ]
                }));
            })
            .await;

        let client = OpenAiChatClient::new(http(), &server.base_url(), "sk-test".into());
        let answer = client.complete(request()).await.expect("answer");

        mock.assert_async().await;
        assert_eq!(answer, "It is a test.");
    }

    #[tokio::test]
    async fn openai_client_rejects_empty_choices() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let client = OpenAiChatClient::new(http(), &server.base_url(), "sk-test".into());
        let error = client.complete(request()).await.expect_err("no choices");
        assert!(matches!(error, ChatClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn ollama_client_handles_successful_response() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .json_body_partial(r#"{"stream":false}"#);
                then.status(200).json_body(json!({
                    "response": "Answer text",
                    "done": true
                }));
            })
            .await;

        let client = OllamaChatClient::new(http(), &server.base_url());
        let answer = client.complete(request()).await.expect("answer");

        mock.assert_async().await;
        assert_eq!(answer, "Answer text");
    }

    #[tokio::test]
    async fn ollama_client_handles_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(500).body("boom");
            })
            .await;

        let client = OllamaChatClient::new(http(), &server.base_url());
        let error = client.complete(request()).await.expect_err("error response");

        assert!(matches!(error, ChatClientError::GenerationFailed(message) if message.contains("500")));
    }
}
