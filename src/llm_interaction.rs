use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::constants;
use crate::prompt::SYSTEM_INSTRUCTION;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("could not create HTTP client: {0}")]
    ClientBuild(String),

    #[error("request to {url} failed: {message}")]
    Connection { url: String, message: String },

    #[error("API request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse chat-completion response: {0}")]
    Parse(String),

    #[error("AI returned empty response. Please try again.")]
    EmptyResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Where and how to reach the chat-completion provider.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub max_tokens: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: constants::DEFAULT_BASE_URL.clone(),
            model: constants::DEFAULT_MODEL.clone(),
            api_key: constants::DEFAULT_API_KEY.clone(),
            max_tokens: constants::MAX_TOKENS,
        }
    }
}

impl GatewayConfig {
    pub fn with_api_key(&self, api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), ..self.clone() }
    }
}

// Structures matching the OpenAI-compatible /chat/completions endpoint
#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
}

#[derive(Deserialize, Debug)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize, Debug)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Deserialize, Debug)]
struct CompletionMessage {
    content: Option<String>,
}

/// Builds the full message list for one stateless request.
pub fn build_messages(history: &[ChatMessage], new_message: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::new(ChatRole::System, SYSTEM_INSTRUCTION));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::new(ChatRole::User, new_message));
    messages
}

/// Thin client for the chat-completion endpoint. Holds no conversation state;
/// callers resend the whole history on every turn.
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    config: GatewayConfig,
}

impl ChatClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(constants::REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(constants::CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| GatewayError::ClientBuild(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Sends `new_message` after `history` and returns the assistant's text.
    #[instrument(skip(self, history, new_message), fields(model = %self.config.model, turns = history.len()))]
    pub async fn send(&self, history: &[ChatMessage], new_message: &str) -> Result<String, GatewayError> {
        let messages = build_messages(history, new_message);
        let url = self.endpoint();
        let payload = CompletionRequest {
            model: &self.config.model,
            messages: &messages,
            max_tokens: self.config.max_tokens,
        };

        debug!(%url, messages = messages.len(), "Sending chat-completion request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GatewayError::Connection { url: url.clone(), message: e.to_string() })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %body, "Chat-completion request failed");
            return Err(GatewayError::Api { status: status.as_u16(), body });
        }

        let completion = response
            .json::<CompletionResponse>()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
            .ok_or(GatewayError::EmptyResponse)?;

        debug!(chars = content.len(), "Received assistant reply");
        Ok(content)
    }
}
