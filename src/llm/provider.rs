//! Core `InferenceProvider` trait and the `ApiProvider` implementation.
//!
//! `ApiProvider` calls any OpenAI-compatible `/chat/completions` endpoint
//! — OpenAI, Groq, Ollama (OpenAI mode), LM Studio, vLLM, etc.
//! Connection details (model, endpoint, key) arrive with every request, so
//! providers are built per request through a [`ProviderFactory`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use thiserror::Error;

use crate::config::LlmConfig;
use crate::llm::stream::{sse_text_stream, TextStream};

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur while invoking the inference provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("LLM request timed out")]
    Timeout,

    /// The provider answered with a non-success HTTP status.
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// The LLM returned a response with no usable text content.
    #[error("LLM returned an empty response")]
    EmptyResponse,

    /// A streamed response broke off or carried an error payload.
    #[error("response stream failed: {0}")]
    Stream(String),

    /// The endpoint in the request is not a usable URL.
    #[error("invalid provider endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Chat messages
// ---------------------------------------------------------------------------

/// Speaker of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One message of a chat exchange, serialised in the OpenAI wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// The usual two-message exchange: an instruction and the content it
    /// applies to.
    pub fn exchange(instruction: &str, content: &str) -> Vec<Self> {
        vec![Self::system(instruction), Self::user(content)]
    }
}

// ---------------------------------------------------------------------------
// InferenceProvider trait
// ---------------------------------------------------------------------------

/// Async trait for an LLM chat backend.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn InferenceProvider>`.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Run one chat completion and return the full response text.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;

    /// Run one chat completion and return its text as an ordered stream of
    /// chunks.
    ///
    /// The default implementation yields the whole [`generate`](Self::generate)
    /// result as a single chunk.
    async fn generate_stream(&self, messages: &[ChatMessage]) -> Result<TextStream, LlmError> {
        let text = self.generate(messages).await?;
        Ok(futures::stream::once(async move { Ok(text) }).boxed())
    }

    /// Whether [`generate_stream`](Self::generate_stream) delivers text
    /// incrementally.
    fn supports_streaming(&self) -> bool {
        false
    }
}

/// Builds an [`InferenceProvider`] for one request's connection details.
pub trait ProviderFactory: Send + Sync {
    fn connect(
        &self,
        model: &str,
        endpoint: &str,
        api_key: &str,
    ) -> Result<Arc<dyn InferenceProvider>, LlmError>;
}

// ---------------------------------------------------------------------------
// ApiProvider
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `{endpoint}/chat/completions` endpoint.
pub struct ApiProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    streaming: bool,
}

impl ApiProvider {
    fn request_body(&self, messages: &[ChatMessage], stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model":       self.model,
            "messages":    messages,
            "stream":      stream,
            "temperature": self.temperature,
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }

    /// Send the request and turn non-success statuses into [`LlmError::Status`].
    async fn send(
        &self,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let mut req = self
            .client
            .post(&self.url)
            .json(&self.request_body(messages, stream));

        // Local providers run without a key.
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl InferenceProvider for ApiProvider {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let response = self.send(messages, false).await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(LlmError::EmptyResponse)?
            .trim()
            .to_string();

        if content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(content)
    }

    async fn generate_stream(&self, messages: &[ChatMessage]) -> Result<TextStream, LlmError> {
        if !self.streaming {
            let text = self.generate(messages).await?;
            return Ok(futures::stream::once(async move { Ok(text) }).boxed());
        }
        let response = self.send(messages, true).await?;
        Ok(sse_text_stream(response.bytes_stream()))
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }
}

// ---------------------------------------------------------------------------
// ApiProviderFactory
// ---------------------------------------------------------------------------

/// Builds [`ApiProvider`]s that share one HTTP client and the sampling
/// settings from [`LlmConfig`].
pub struct ApiProviderFactory {
    client: reqwest::Client,
    config: LlmConfig,
}

impl ApiProviderFactory {
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`. A default (no-timeout) client is used if the
    /// builder fails.
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }
}

impl ProviderFactory for ApiProviderFactory {
    fn connect(
        &self,
        model: &str,
        endpoint: &str,
        api_key: &str,
    ) -> Result<Arc<dyn InferenceProvider>, LlmError> {
        let url = completions_url(endpoint)?;
        log::debug!("provider: model={model} url={url}");

        Ok(Arc::new(ApiProvider {
            client: self.client.clone(),
            url,
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            streaming: self.config.stream,
        }))
    }
}

/// `https://api.example.com/v1/` → `https://api.example.com/v1/chat/completions`.
fn completions_url(endpoint: &str) -> Result<String, LlmError> {
    let trimmed = endpoint.trim().trim_end_matches('/');
    let url = reqwest::Url::parse(trimmed).map_err(|e| LlmError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LlmError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: format!("unsupported scheme {:?}", url.scheme()),
        });
    }
    Ok(format!("{trimmed}/chat/completions"))
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

/// Scripted provider for tests: replays queued responses in order and
/// records every message list it receives.
#[cfg(test)]
pub struct MockProvider {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<String, LlmError>>>,
    calls: std::sync::Mutex<Vec<Vec<ChatMessage>>>,
    streaming: bool,
}

#[cfg(test)]
impl MockProvider {
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            calls: std::sync::Mutex::new(Vec::new()),
            streaming: false,
        }
    }

    /// Convenience: every response succeeds with the given text.
    pub fn ok<S: Into<String>>(texts: impl IntoIterator<Item = S>) -> Self {
        Self::new(texts.into_iter().map(|t| Ok(t.into())).collect())
    }

    /// Stream each successful response word by word.
    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl InferenceProvider for MockProvider {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Request("no scripted response left".into())))
    }

    async fn generate_stream(&self, messages: &[ChatMessage]) -> Result<TextStream, LlmError> {
        let text = self.generate(messages).await?;
        let chunks: Vec<Result<String, LlmError>> = text
            .split_inclusive(' ')
            .map(|chunk| Ok(chunk.to_string()))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
