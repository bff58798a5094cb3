//! Documentation gap detection.
//!
//! Scans edited file content for function and class definitions that carry
//! no documentation comment and proposes stub docstrings in the configured
//! style.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::event::ChangeEvent;
use crate::modules::schema::{ConfigKey, ConfigSchema, ConfigValueType, ModuleConfig};
use crate::modules::{AnalysisModule, ModuleResult, ResultPayload};

/// A definition with no documentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingDoc {
    /// Definition name.
    pub name: String,
    /// Definition kind (function, class).
    pub kind: String,
    /// 1-based line of the definition.
    pub line: usize,
}

/// A proposed stub docstring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedDocstring {
    /// Definition the stub documents.
    pub name: String,
    /// The stub text.
    pub text: String,
}

/// Documentation gap payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocstringReport {
    /// File the gaps were found in.
    pub file: String,
    /// Undocumented definitions.
    pub missing: Vec<MissingDoc>,
    /// Proposed stubs, one per gap.
    pub proposed: Vec<ProposedDocstring>,
}

/// Configuration schema for the detector.
pub fn config_schema() -> ConfigSchema {
    ConfigSchema::new(vec![
        ConfigKey {
            name: "format",
            value_type: ConfigValueType::String,
            default: serde_yaml::Value::from("google"),
            description: "Docstring style for proposed stubs",
            allowed: Some(&["google", "plain"]),
        },
        ConfigKey {
            name: "languages",
            value_type: ConfigValueType::StringList,
            default: serde_yaml::to_value(["python", "rust", "javascript"])
                .unwrap_or(serde_yaml::Value::Null),
            description: "Languages to scan",
            allowed: None,
        },
    ])
}

/// Constructs the detector from resolved configuration.
pub fn build(config: ModuleConfig) -> Result<Box<dyn AnalysisModule>> {
    Ok(Box::new(DocstringGenerator::from_config(&config)?))
}

/// Per-language documentation gap detector.
pub struct DocstringGenerator {
    enabled: bool,
    format: String,
    languages: Vec<String>,
    py_def: Regex,
    rust_fn: Regex,
    js_fn: Regex,
}

impl DocstringGenerator {
    /// Builds the detector, compiling its patterns once.
    pub fn from_config(config: &ModuleConfig) -> Result<Self> {
        Ok(Self {
            enabled: config.get_bool("enabled", true),
            format: config.get_str("format", "google"),
            languages: config
                .get_str_list("languages", &["python", "rust", "javascript"]),
            py_def: Regex::new(r"^\s*(def|class)\s+([A-Za-z_][A-Za-z0-9_]*)")?,
            rust_fn: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?fn\s+([a-z_][a-z0-9_]*)")?,
            js_fn: Regex::new(r"^\s*(?:export\s+)?(?:async\s+)?function\s+([A-Za-z_$][\w$]*)")?,
        })
    }

    /// Finds undocumented definitions in `content` for `language`.
    pub fn find_missing(&self, content: &str, language: &str) -> Vec<MissingDoc> {
        let lines: Vec<&str> = content.lines().collect();
        let mut missing = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            let (name, kind, documented) = match language {
                "python" => {
                    let Some(caps) = self.py_def.captures(line) else {
                        continue;
                    };
                    let kind = if &caps[1] == "class" { "class" } else { "function" };
                    // Python docstrings follow the definition line.
                    let documented = lines
                        .get(i + 1)
                        .map(|next| {
                            let t = next.trim_start();
                            t.starts_with("\"\"\"") || t.starts_with("'''")
                        })
                        .unwrap_or(false);
                    (caps[2].to_string(), kind, documented)
                }
                "rust" => {
                    let Some(caps) = self.rust_fn.captures(line) else {
                        continue;
                    };
                    // Rust doc comments precede the item, possibly behind
                    // attributes.
                    let documented = lines[..i]
                        .iter()
                        .rev()
                        .take_while(|prev| {
                            let t = prev.trim_start();
                            t.starts_with("///") || t.starts_with("#[") || t.starts_with("//!")
                        })
                        .any(|prev| prev.trim_start().starts_with("///"));
                    (caps[1].to_string(), "function", documented)
                }
                "javascript" => {
                    let Some(caps) = self.js_fn.captures(line) else {
                        continue;
                    };
                    let documented = lines[..i]
                        .iter()
                        .rev()
                        .find(|prev| !prev.trim().is_empty())
                        .map(|prev| {
                            let t = prev.trim();
                            t.ends_with("*/") || t.starts_with("*")
                        })
                        .unwrap_or(false);
                    (caps[1].to_string(), "function", documented)
                }
                _ => continue,
            };

            if !documented {
                missing.push(MissingDoc {
                    name,
                    kind: kind.to_string(),
                    line: i + 1,
                });
            }
        }

        missing
    }

    /// Proposes a stub for one gap.
    fn propose(&self, doc: &MissingDoc, language: &str) -> ProposedDocstring {
        let text = match (language, self.format.as_str()) {
            ("python", "google") => format!(
                "\"\"\"TODO: describe {}.\n\nArgs:\n    ...\n\nReturns:\n    ...\n\"\"\"",
                doc.name
            ),
            ("python", _) => format!("\"\"\"TODO: describe {}.\"\"\"", doc.name),
            ("rust", _) => format!("/// TODO: describe {}.", doc.name),
            _ => format!("/** TODO: describe {}. */", doc.name),
        };

        ProposedDocstring {
            name: doc.name.clone(),
            text,
        }
    }

    fn language_of(path: &str) -> Option<&'static str> {
        match path.rsplit('.').next() {
            Some("py") => Some("python"),
            Some("rs") => Some("rust"),
            Some("js" | "jsx" | "ts" | "tsx") => Some("javascript"),
            _ => None,
        }
    }
}

#[async_trait]
impl AnalysisModule for DocstringGenerator {
    fn name(&self) -> &'static str {
        "docstring"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn process(&self, event: &ChangeEvent) -> Result<Option<ModuleResult>> {
        // Only uncommitted work carries a content snapshot worth scanning.
        let (Some(path), Some(content)) = (event.file_path(), event.content()) else {
            return Ok(None);
        };
        if content.is_empty() {
            return Ok(None);
        }

        let Some(language) = Self::language_of(path) else {
            return Ok(None);
        };
        if !self.languages.iter().any(|l| l == language) {
            return Ok(None);
        }

        let missing = self.find_missing(content, language);
        if missing.is_empty() {
            return Ok(None);
        }

        let proposed: Vec<ProposedDocstring> =
            missing.iter().map(|doc| self.propose(doc, language)).collect();

        let summary = format!(
            "{} undocumented definitions in {path}",
            missing.len()
        );

        let report = DocstringReport {
            file: path.to_string(),
            missing,
            proposed,
        };

        Ok(Some(
            ModuleResult::new(self.name(), summary)
                .with_payload(ResultPayload::Docstrings(report)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> DocstringGenerator {
        let resolved = config_schema().resolve("docstring", &ModuleConfig::new());
        DocstringGenerator::from_config(&resolved).unwrap()
    }

    #[test]
    fn undocumented_python_def_is_found() {
        let content = "def launch(countdown):\n    return countdown - 1\n";
        let missing = detector().find_missing(content, "python");
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "launch");
        assert_eq!(missing[0].line, 1);
    }

    #[test]
    fn documented_python_def_is_not_flagged() {
        let content = "def launch(countdown):\n    \"\"\"Counts down.\"\"\"\n    return countdown - 1\n";
        assert!(detector().find_missing(content, "python").is_empty());
    }

    #[test]
    fn rust_doc_comments_count_through_attributes() {
        let documented = "/// Runs the job.\n#[inline]\nfn run() {}\n";
        assert!(detector().find_missing(documented, "rust").is_empty());

        let undocumented = "#[inline]\nfn run() {}\n";
        assert_eq!(detector().find_missing(undocumented, "rust").len(), 1);
    }

    #[test]
    fn google_style_stub_has_sections() {
        let detector = detector();
        let missing = detector.find_missing("def f(a):\n    pass\n", "python");
        let proposed = detector.propose(&missing[0], "python");
        assert!(proposed.text.contains("Args:"));
        assert!(proposed.text.contains("Returns:"));
    }
}
