//! Commit message generation.
//!
//! Proposes a commit message for uncommitted work (staged files and local
//! edits) following the configured convention. Existing commits already
//! have messages and are ignored.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::event::{ChangeEvent, EditKind};
use crate::git::truncate_chars;
use crate::modules::schema::{ConfigKey, ConfigSchema, ConfigValueType, ModuleConfig};
use crate::modules::{AnalysisModule, ModuleResult, ResultPayload};

/// A generated commit message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedMessage {
    /// The full proposed message (subject, optionally subject + body).
    pub message: String,
    /// Inferred conventional-commit type.
    pub commit_type: String,
    /// Inferred scope, empty when none.
    pub scope: String,
}

/// Configuration schema for the generator.
pub fn config_schema() -> ConfigSchema {
    ConfigSchema::new(vec![
        ConfigKey {
            name: "convention",
            value_type: ConfigValueType::String,
            default: serde_yaml::Value::from("conventional"),
            description: "Message convention to follow",
            allowed: Some(&["conventional", "simple"]),
        },
        ConfigKey {
            name: "include_scope",
            value_type: ConfigValueType::Bool,
            default: serde_yaml::Value::Bool(true),
            description: "Include a scope segment (feat(scope): ...)",
            allowed: None,
        },
        ConfigKey {
            name: "include_body",
            value_type: ConfigValueType::Bool,
            default: serde_yaml::Value::Bool(true),
            description: "Append a body describing the touched file",
            allowed: None,
        },
        ConfigKey {
            name: "max_length",
            value_type: ConfigValueType::Integer,
            default: serde_yaml::Value::from(72),
            description: "Maximum subject line length",
            allowed: None,
        },
    ])
}

/// Constructs the generator from resolved configuration.
pub fn build(config: ModuleConfig) -> Result<Box<dyn AnalysisModule>> {
    Ok(Box::new(CommitMessageGenerator::from_config(&config)))
}

/// Convention-driven commit message generator.
pub struct CommitMessageGenerator {
    enabled: bool,
    convention: String,
    include_scope: bool,
    include_body: bool,
    max_length: usize,
}

impl CommitMessageGenerator {
    /// Builds the generator.
    pub fn from_config(config: &ModuleConfig) -> Self {
        Self {
            enabled: config.get_bool("enabled", true),
            convention: config.get_str("convention", "conventional"),
            include_scope: config.get_bool("include_scope", true),
            include_body: config.get_bool("include_body", true),
            max_length: config.get_i64("max_length", 72).clamp(20, 100) as usize,
        }
    }

    /// Generates a message for one uncommitted file change.
    pub fn generate(&self, path: &str, kind: EditKind) -> GeneratedMessage {
        let commit_type = infer_type(path, kind);
        let scope = if self.include_scope {
            infer_scope(path)
        } else {
            String::new()
        };

        let file_name = path.rsplit('/').next().unwrap_or(path);
        let description = match kind {
            EditKind::Created => format!("add {file_name}"),
            EditKind::Modified => format!("update {file_name}"),
            EditKind::Deleted => format!("remove {file_name}"),
        };

        let subject = if self.convention == "conventional" {
            if scope.is_empty() {
                format!("{commit_type}: {description}")
            } else {
                format!("{commit_type}({scope}): {description}")
            }
        } else {
            // Simple convention: capitalized description only.
            let mut chars = description.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => description.clone(),
            }
        };
        let subject = truncate_chars(&subject, self.max_length);

        let message = if self.include_body {
            format!("{subject}\n\n- {} ({kind})\n", path)
        } else {
            subject
        };

        GeneratedMessage {
            message,
            commit_type,
            scope,
        }
    }
}

#[async_trait]
impl AnalysisModule for CommitMessageGenerator {
    fn name(&self) -> &'static str {
        "commit_message"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn process(&self, event: &ChangeEvent) -> Result<Option<ModuleResult>> {
        let (path, kind) = match event {
            ChangeEvent::Staged(change) => {
                let kind = match change.record.event_kind.as_str() {
                    "created" => EditKind::Created,
                    "deleted" => EditKind::Deleted,
                    _ => EditKind::Modified,
                };
                (change.record.path.clone(), kind)
            }
            ChangeEvent::LocalEdit(change) => (change.record.path.clone(), change.record.kind),
            // Commits already carry a message.
            ChangeEvent::Commit(_) | ChangeEvent::File(_) => return Ok(None),
        };

        let generated = self.generate(&path, kind);
        let summary = format!("Suggested commit message: {}", first_line(&generated.message));

        Ok(Some(
            ModuleResult::new(self.name(), summary)
                .with_payload(ResultPayload::CommitMessage(generated)),
        ))
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("")
}

/// Infers a conventional-commit type from the path and edit kind.
fn infer_type(path: &str, kind: EditKind) -> String {
    let lower = path.to_lowercase();

    if lower.contains("test") || lower.contains("spec") {
        "test".to_string()
    } else if lower.ends_with(".md") || lower.contains("readme") || lower.contains("docs/") {
        "docs".to_string()
    } else if lower.contains("cargo.toml")
        || lower.contains("package.json")
        || lower.contains("config")
    {
        "chore".to_string()
    } else if kind == EditKind::Created {
        "feat".to_string()
    } else if kind == EditKind::Deleted {
        "refactor".to_string()
    } else {
        "fix".to_string()
    }
}

/// Scope = first directory component below a conventional source root.
fn infer_scope(path: &str) -> String {
    let components: Vec<&str> = path.split('/').collect();
    match components.as_slice() {
        [] | [_] => String::new(),
        [first, _] => (*first).to_string(),
        [first, second, ..] => {
            if matches!(*first, "src" | "lib" | "app") {
                (*second).trim_end_matches(".rs").to_string()
            } else {
                (*first).to_string()
            }
        }
    }
}
