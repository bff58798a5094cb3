//! AI change summarization.
//!
//! Sends each change event to the Claude API and returns the model's
//! summary. When the API call fails the module degrades to a plain
//! rule-based fallback text instead of surfacing an error, so a flaky
//! network never silences the notification stream.

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::claude::{prompts, ClaudeClient};
use crate::event::ChangeEvent;
use crate::modules::schema::{ConfigKey, ConfigSchema, ConfigValueType, ModuleConfig};
use crate::modules::{AnalysisModule, ModuleResult, ResultPayload};

/// Configuration schema for the summarizer.
pub fn config_schema() -> ConfigSchema {
    ConfigSchema::new(vec![
        ConfigKey {
            name: "model",
            value_type: ConfigValueType::String,
            default: serde_yaml::Value::from(crate::claude::client::DEFAULT_MODEL),
            description: "Claude model to use",
            allowed: None,
        },
        ConfigKey {
            name: "max_tokens",
            value_type: ConfigValueType::Integer,
            default: serde_yaml::Value::from(1024),
            description: "Response token budget",
            allowed: None,
        },
    ])
}

/// Constructs the summarizer from resolved configuration.
///
/// Fails when no API key is configured; the module is then absent from the
/// active set for the process lifetime and sibling modules run unaffected.
pub fn build(config: ModuleConfig) -> Result<Box<dyn AnalysisModule>> {
    let client = ClaudeClient::new(config.get_str("model", crate::claude::client::DEFAULT_MODEL))?;
    Ok(Box::new(AiSummarizer::new(client, &config)))
}

/// Claude-backed change summarizer.
pub struct AiSummarizer {
    enabled: bool,
    client: ClaudeClient,
    max_tokens: i32,
}

impl AiSummarizer {
    /// Builds the summarizer around an existing client.
    pub fn new(client: ClaudeClient, config: &ModuleConfig) -> Self {
        Self {
            enabled: config.get_bool("enabled", true),
            client,
            max_tokens: config.get_i64("max_tokens", 1024) as i32,
        }
    }

    /// Rule-based fallback used when the API is unreachable.
    fn fallback_summary(event: &ChangeEvent) -> String {
        match event {
            ChangeEvent::Commit(change) => {
                let commit = &change.commit;
                format!(
                    "Commit {} by {}: {} ({} files changed)",
                    commit.short_hash(),
                    commit.author,
                    commit.subject(),
                    commit.files.len()
                )
            }
            ChangeEvent::Staged(change) => format!(
                "Staged: {} ({})",
                change.record.path, change.record.description
            ),
            ChangeEvent::LocalEdit(change) => format!(
                "Local edit: {} was {}",
                change.record.path, change.record.kind
            ),
            ChangeEvent::File(_) => "A file changed in the repository".to_string(),
        }
    }
}

#[async_trait]
impl AnalysisModule for AiSummarizer {
    fn name(&self) -> &'static str {
        "ai_summary"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn process(&self, event: &ChangeEvent) -> Result<Option<ModuleResult>> {
        let prompt = prompts::summary_prompt(event);

        let summary = match self
            .client
            .complete(prompts::SUMMARY_SYSTEM_PROMPT, &prompt, self.max_tokens)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("AI summary failed for {}, using fallback: {e:#}", event.label());
                Self::fallback_summary(event)
            }
        };

        Ok(Some(
            ModuleResult::new(self.name(), summary.clone())
                .with_payload(ResultPayload::Analysis { text: summary }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{normalize, EditKind, LocalEditRecord, RawChange};
    use std::path::Path;

    #[test]
    fn fallback_summary_names_the_change() {
        let event = normalize(
            RawChange::LocalEdit(LocalEditRecord {
                path: "src/api.rs".to_string(),
                kind: EditKind::Deleted,
                date: chrono::Utc::now(),
                status: "D".to_string(),
                description: "Deleted".to_string(),
                content: String::new(),
            }),
            Path::new("/tmp/repo"),
        );

        let summary = AiSummarizer::fallback_summary(&event);
        assert_eq!(summary, "Local edit: src/api.rs was deleted");
    }
}
