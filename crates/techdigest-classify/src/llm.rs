//! HTTP transports for the supported classification providers.
//!
//! Each provider speaks a different request schema; [`ChatProvider`] hides
//! that behind a single `complete` call taking chat messages.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use techdigest_core::{DigestError, LlmConfig, ProviderErrorKind, ProviderKind};
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A message in a chat conversation with the model.
///
/// # Examples
///
/// ```
/// use techdigest_classify::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage::user("Categorize these articles");
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
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
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use techdigest_classify::llm::Role;
///
/// let role = Role::System;
/// assert_eq!(serde_json::to_string(&role).unwrap(), "\"system\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
}

/// A model endpoint that turns chat messages into a text completion.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Send one request and return the completion text.
    ///
    /// Exactly one HTTP call is made; retrying is the caller's decision.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, DigestError>;
}

/// Build the transport selected by `config.provider`.
///
/// # Errors
///
/// Returns [`DigestError::Config`] if the HTTP client cannot be built.
pub fn build_provider(
    config: &LlmConfig,
    api_key: String,
) -> Result<Box<dyn ChatProvider>, DigestError> {
    Ok(match config.provider {
        ProviderKind::Anthropic => Box::new(AnthropicProvider::new(config, api_key)?),
        ProviderKind::OpenRouter | ProviderKind::Github | ProviderKind::OpenAi => {
            Box::new(ChatCompletionsProvider::new(config, api_key)?)
        }
    })
}

fn http_client(config: &LlmConfig) -> Result<reqwest::Client, DigestError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| DigestError::Config(format!("failed to create HTTP client: {e}")))
}

fn request_error(e: reqwest::Error) -> DigestError {
    let detail = if e.is_timeout() {
        format!("request timed out: {e}")
    } else {
        format!("request failed: {e}")
    };
    DigestError::provider(ProviderErrorKind::Network, detail)
}

/// Map a non-success HTTP status to a provider error.
fn status_error(status: StatusCode, body: &str) -> DigestError {
    let kind = match status.as_u16() {
        401 | 403 => ProviderErrorKind::Auth,
        429 => ProviderErrorKind::RateLimited,
        code => ProviderErrorKind::Status(code),
    };
    let snippet: String = body.chars().take(300).collect();
    DigestError::provider(kind, format!("API error {status}: {snippet}"))
}

async fn send_json(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
) -> Result<serde_json::Value, DigestError> {
    let response = request.json(body).send().await.map_err(request_error)?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(status_error(status, &body_text));
    }

    response.json().await.map_err(|e| {
        DigestError::provider(
            ProviderErrorKind::Envelope,
            format!("failed to decode response body: {e}"),
        )
    })
}

/// OpenAI-compatible chat completions transport.
///
/// Used for OpenRouter, GitHub Models and OpenAI, which share the
/// `/chat/completions` request schema and bearer-token auth.
///
/// # Examples
///
/// ```
/// use techdigest_core::LlmConfig;
/// use techdigest_classify::llm::{ChatCompletionsProvider, ChatProvider};
///
/// let provider = ChatCompletionsProvider::new(&LlmConfig::default(), "sk-test".into()).unwrap();
/// assert_eq!(provider.model(), "openai/gpt-4o-mini");
/// ```
pub struct ChatCompletionsProvider {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: String,
    name: String,
}

impl ChatCompletionsProvider {
    /// # Errors
    ///
    /// Returns [`DigestError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, DigestError> {
        Ok(Self {
            client: http_client(config)?,
            config: config.clone(),
            api_key,
            name: config.provider.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url())
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "response_format": { "type": "json_object" },
        })
    }
}

/// Pull `choices[0].message.content` out of a chat completions response.
fn chat_completion_text(body: &serde_json::Value) -> Result<String, DigestError> {
    body.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            DigestError::provider(
                ProviderErrorKind::Envelope,
                format!("unexpected response structure: {body}"),
            )
        })
}

#[async_trait]
impl ChatProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, DigestError> {
        let url = self.endpoint();
        debug!(provider = %self.name, %url, "sending chat completion request");

        let request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");

        let body = send_json(request, &self.request_body(messages)).await?;
        chat_completion_text(&body)
    }
}

impl fmt::Debug for ChatCompletionsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCompletionsProvider")
            .field("name", &self.name)
            .field("model", &self.config.model)
            .field("endpoint", &self.endpoint())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Anthropic messages API transport.
///
/// System messages are lifted into the top-level `system` field; the rest are
/// sent as `messages`.
pub struct AnthropicProvider {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: String,
}

impl AnthropicProvider {
    /// # Errors
    ///
    /// Returns [`DigestError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, DigestError> {
        Ok(Self {
            client: http_client(config)?,
            config: config.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url())
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        let system = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let turns: Vec<&ChatMessage> = messages.iter().filter(|m| m.role != Role::System).collect();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": turns,
        });
        if !system.is_empty() {
            body["system"] = serde_json::Value::String(system);
        }
        body
    }
}

/// Join the text blocks of an Anthropic messages response.
fn anthropic_text(body: &serde_json::Value) -> Result<String, DigestError> {
    let blocks = body
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| {
            DigestError::provider(
                ProviderErrorKind::Envelope,
                format!("unexpected response structure: {body}"),
            )
        })?;

    let text: String = blocks
        .iter()
        .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() {
        return Err(DigestError::provider(
            ProviderErrorKind::Envelope,
            "response contained no text blocks",
        ));
    }
    Ok(text)
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, DigestError> {
        let url = self.endpoint();
        debug!(provider = "anthropic", %url, "sending messages request");

        let request = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json");

        let body = send_json(request, &self.request_body(messages)).await?;
        anthropic_text(&body)
    }
}

impl fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("model", &self.config.model)
            .field("endpoint", &self.endpoint())
            .field("api_key", &"<redacted>")
            .finish()
    }
}
