//! Slack notification sink.
//!
//! Thin wrapper over `chat.postMessage`. Sending never raises: failures
//! come back as `false`, get logged, and the poll loop keeps going.

use anyhow::{bail, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

const SLACK_API_URL: &str = "https://slack.com/api/chat.postMessage";

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    unfurl_links: bool,
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Posts monitor results to one Slack channel.
pub struct SlackNotifier {
    client: Client,
    token: String,
    channel: String,
    api_url: String,
}

impl SlackNotifier {
    /// Creates a notifier. Both the bot token and the channel id are
    /// required up front so misconfiguration fails at startup, not at the
    /// first notification.
    pub fn new(token: String, channel: String) -> Result<Self> {
        if token.is_empty() {
            bail!("Slack bot token is required");
        }
        if channel.is_empty() {
            bail!("Slack channel id is required");
        }

        info!("Slack notifier configured for channel {channel}");
        Ok(Self {
            client: Client::new(),
            token,
            channel,
            api_url: SLACK_API_URL.to_string(),
        })
    }

    /// Overrides the API endpoint, for tests against a mock server.
    pub fn with_api_url(mut self, url: String) -> Self {
        self.api_url = url;
        self
    }

    /// Sends one message. Returns `true` on success; every failure mode is
    /// logged and reported as `false`.
    pub async fn send(&self, text: &str) -> bool {
        debug!(
            "Sending Slack message ({} chars) to {}",
            text.chars().count(),
            self.channel
        );

        let request = PostMessageRequest {
            channel: &self.channel,
            text,
            unfurl_links: true,
        };

        let response = match self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Slack request failed: {e}");
                return false;
            }
        };

        if !response.status().is_success() {
            error!("Slack returned HTTP {}", response.status());
            return false;
        }

        match response.json::<PostMessageResponse>().await {
            Ok(body) if body.ok => true,
            Ok(body) => {
                error!(
                    "Slack rejected message: {}",
                    body.error.unwrap_or_else(|| "unknown error".to_string())
                );
                false
            }
            Err(e) => {
                error!("Unreadable Slack response: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn notifier_for(server: &MockServer) -> SlackNotifier {
        SlackNotifier::new("xoxb-test".to_string(), "C12345".to_string())
            .unwrap()
            .with_api_url(format!("{}/api/chat.postMessage", server.uri()))
    }

    #[tokio::test]
    async fn successful_send_returns_true() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true
            })))
            .mount(&server)
            .await;

        assert!(notifier_for(&server).await.send("hello").await);
    }

    #[tokio::test]
    async fn slack_level_error_returns_false() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": false,
                "error": "channel_not_found"
            })))
            .mount(&server)
            .await;

        assert!(!notifier_for(&server).await.send("hello").await);
    }

    #[tokio::test]
    async fn http_error_returns_false() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(!notifier_for(&server).await.send("hello").await);
    }

    #[test]
    fn missing_credentials_fail_construction() {
        assert!(SlackNotifier::new(String::new(), "C1".to_string()).is_err());
        assert!(SlackNotifier::new("tok".to_string(), String::new()).is_err());
    }
}
