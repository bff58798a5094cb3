//! Claude API client implementation.

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::claude::error::ClaudeError;

/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Claude API request message.
#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

/// Claude API request body.
#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: i32,
    system: String,
    messages: Vec<Message>,
}

/// Claude API response content block.
#[derive(Deserialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    text: String,
}

/// Claude API response.
#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<Content>,
}

/// Minimal Claude client used by the AI-backed modules.
pub struct ClaudeClient {
    client: Client,
    api_key: String,
    model: String,
    api_url: String,
}

impl ClaudeClient {
    /// Creates a client from the `CLAUDE_API_KEY` / `ANTHROPIC_API_KEY`
    /// environment variables. A missing key is a construction failure, which
    /// keeps AI-backed modules out of the active set instead of failing at
    /// dispatch time.
    pub fn new(model: String) -> Result<Self> {
        let api_key = std::env::var("CLAUDE_API_KEY")
            .or_else(|_| std::env::var("ANTHROPIC_API_KEY"))
            .map_err(|_| ClaudeError::ApiKeyNotFound)?;

        Ok(Self {
            client: Client::new(),
            api_key,
            model,
            api_url: API_URL.to_string(),
        })
    }

    /// Overrides the API endpoint, for tests against a mock server.
    pub fn with_api_url(mut self, url: String) -> Self {
        self.api_url = url;
        self
    }

    /// The configured model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one system + user prompt pair and returns the text response.
    pub async fn complete(&self, system: &str, user: &str, max_tokens: i32) -> Result<String> {
        let request = ClaudeRequest {
            model: self.model.clone(),
            max_tokens,
            system: system.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: user.to_string(),
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ClaudeError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(
                ClaudeError::ApiRequestFailed(format!("HTTP {status}: {error_text}")).into(),
            );
        }

        let claude_response: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| ClaudeError::InvalidResponseFormat(e.to_string()))?;

        let content = claude_response
            .content
            .first()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.trim().to_string())
            .ok_or_else(|| {
                ClaudeError::InvalidResponseFormat("No text content in response".to_string())
            })?;

        Ok(content)
    }
}
