//! Rule-based code review.
//!
//! Scans changed file content with regex heuristics across three review
//! dimensions: quality, security, and performance. Purely local, no AI.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event::ChangeEvent;
use crate::modules::schema::{ConfigKey, ConfigSchema, ConfigValueType, ModuleConfig};
use crate::modules::{AnalysisModule, ModuleResult, ResultPayload};

/// Maximum acceptable line length before a quality issue is raised.
const MAX_LINE_LEN: usize = 100;

/// Maximum acceptable function body length in lines.
const MAX_FN_LINES: usize = 30;

/// Issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Cosmetic or stylistic.
    Low,
    /// Worth fixing soon.
    Medium,
    /// Must fix.
    High,
}

impl Severity {
    fn parse(s: &str) -> Self {
        match s {
            "high" => Severity::High,
            "medium" => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

/// Review dimension an issue belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueCategory {
    /// Readability and structure.
    Quality,
    /// Credentials, injection, unsafe constructs.
    Security,
    /// Inefficient patterns.
    Performance,
}

/// One issue found in one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewIssue {
    /// Review dimension.
    pub category: IssueCategory,
    /// Severity level.
    pub severity: Severity,
    /// 1-based line number.
    pub line: usize,
    /// What is wrong.
    pub message: String,
    /// The offending line, trimmed.
    pub code: String,
    /// Canned fix suggestion, when enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_suggestion: Option<String>,
}

/// Issues for one reviewed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReview {
    /// Path relative to the repository root.
    pub file: String,
    /// Issues found, in document order.
    pub issues: Vec<ReviewIssue>,
}

/// Full review payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewReport {
    /// Total issue count across files.
    pub issues_found: usize,
    /// Per-file breakdowns, only files with issues.
    pub files: Vec<FileReview>,
}

/// Configuration schema for the reviewer.
pub fn config_schema() -> ConfigSchema {
    ConfigSchema::new(vec![
        ConfigKey {
            name: "review_types",
            value_type: ConfigValueType::StringList,
            default: serde_yaml::to_value(["quality", "security", "performance"])
                .unwrap_or(serde_yaml::Value::Null),
            description: "Review dimensions to run",
            allowed: None,
        },
        ConfigKey {
            name: "suggest_fixes",
            value_type: ConfigValueType::Bool,
            default: serde_yaml::Value::Bool(true),
            description: "Attach canned fix suggestions to issues",
            allowed: None,
        },
        ConfigKey {
            name: "severity_threshold",
            value_type: ConfigValueType::String,
            default: serde_yaml::Value::from("low"),
            description: "Minimum severity to report",
            allowed: Some(&["low", "medium", "high"]),
        },
    ])
}

/// Constructs the reviewer from resolved configuration.
pub fn build(config: ModuleConfig) -> Result<Box<dyn AnalysisModule>> {
    Ok(Box::new(CodeReviewer::from_config(&config)?))
}

/// The rule-based reviewer.
pub struct CodeReviewer {
    enabled: bool,
    review_types: Vec<String>,
    suggest_fixes: bool,
    severity_threshold: Severity,
    secret_patterns: Vec<(Regex, &'static str)>,
    sql_interpolation: Regex,
    eval_call: Regex,
    short_var: Regex,
    py_string_concat_loop: Regex,
    py_list_concat: Regex,
}

impl CodeReviewer {
    /// Builds the reviewer, compiling its patterns once.
    pub fn from_config(config: &ModuleConfig) -> Result<Self> {
        let secret_patterns = vec![
            (
                Regex::new(r#"(?i)password\s*=\s*["']([^"']+)["']"#)?,
                "Hardcoded password",
            ),
            (
                Regex::new(r#"(?i)api[_-]?key\s*=\s*["']([^"']+)["']"#)?,
                "Hardcoded API key",
            ),
            (
                Regex::new(r#"(?i)secret\s*=\s*["']([^"']+)["']"#)?,
                "Hardcoded secret",
            ),
            (
                Regex::new(r#"(?i)token\s*=\s*["']([^"']+)["']"#)?,
                "Hardcoded token",
            ),
        ];

        Ok(Self {
            enabled: config.get_bool("enabled", true),
            review_types: config
                .get_str_list("review_types", &["quality", "security", "performance"]),
            suggest_fixes: config.get_bool("suggest_fixes", true),
            severity_threshold: Severity::parse(&config.get_str("severity_threshold", "low")),
            secret_patterns,
            sql_interpolation: Regex::new(
                r#"(?i)execute\s*\(\s*f?["'](SELECT|INSERT|UPDATE|DELETE)[^"']*\{"#,
            )?,
            eval_call: Regex::new(r"\beval\s*\(")?,
            short_var: Regex::new(r"(?m)(?:^|\s)([a-z][a-z0-9]?)\s*=[^=]")?,
            py_string_concat_loop: Regex::new(r"(?s)for\s+[^:]+:\s*\n[^\n]*\+=")?,
            py_list_concat: Regex::new(r"\[[^\[\]]*\]\s*\+\s*\[[^\[\]]*\]")?,
        })
    }

    /// Reviews one file's content.
    pub fn review_content(&self, file: &str, content: &str) -> Option<FileReview> {
        if content.is_empty() {
            return None;
        }

        let ext = file.rsplit('.').next().unwrap_or("");
        let mut issues = Vec::new();

        if self.review_types.iter().any(|t| t == "quality") {
            issues.extend(self.check_quality(content, ext));
        }
        if self.review_types.iter().any(|t| t == "security") {
            issues.extend(self.check_security(content, ext));
        }
        if self.review_types.iter().any(|t| t == "performance") {
            issues.extend(self.check_performance(content, ext));
        }

        issues.retain(|issue| issue.severity >= self.severity_threshold);

        if self.suggest_fixes {
            for issue in &mut issues {
                if issue.fix_suggestion.is_none() {
                    issue.fix_suggestion = Some(fix_suggestion(issue).to_string());
                }
            }
        }

        if issues.is_empty() {
            None
        } else {
            Some(FileReview {
                file: file.to_string(),
                issues,
            })
        }
    }

    fn check_quality(&self, content: &str, ext: &str) -> Vec<ReviewIssue> {
        let mut issues = Vec::new();

        for (i, line) in content.lines().enumerate() {
            if line.chars().count() > MAX_LINE_LEN {
                issues.push(ReviewIssue {
                    category: IssueCategory::Quality,
                    severity: Severity::Low,
                    line: i + 1,
                    message: format!("Line too long ({} characters)", line.chars().count()),
                    code: crate::git::truncate_chars(line, 50),
                    fix_suggestion: None,
                });
            }
        }

        if ext == "py" {
            issues.extend(self.check_python_function_length(content));
        }

        for caps in self.short_var.captures_iter(content) {
            let Some(m) = caps.get(1) else { continue };
            let name = m.as_str();
            if name.len() < 2 && !matches!(name, "i" | "j" | "k" | "x" | "y" | "z") {
                let line = line_of_offset(content, m.start());
                issues.push(ReviewIssue {
                    category: IssueCategory::Quality,
                    severity: Severity::Low,
                    line,
                    message: format!("Variable name too short: {name}"),
                    code: line_text(content, line),
                    fix_suggestion: None,
                });
            }
        }

        issues
    }

    /// Flags Python functions whose indented body exceeds the length cap.
    fn check_python_function_length(&self, content: &str) -> Vec<ReviewIssue> {
        let mut issues = Vec::new();
        let lines: Vec<&str> = content.lines().collect();

        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim_start();
            if !trimmed.starts_with("def ") {
                continue;
            }
            let def_indent = line.len() - trimmed.len();
            let name = trimmed
                .trim_start_matches("def ")
                .split('(')
                .next()
                .unwrap_or("")
                .trim();

            let mut body_lines = 0usize;
            for body in &lines[i + 1..] {
                if body.trim().is_empty() {
                    continue;
                }
                let indent = body.len() - body.trim_start().len();
                if indent <= def_indent {
                    break;
                }
                body_lines += 1;
            }

            if body_lines > MAX_FN_LINES {
                issues.push(ReviewIssue {
                    category: IssueCategory::Quality,
                    severity: Severity::Medium,
                    line: i + 1,
                    message: format!("Function {name} too long ({body_lines} lines)"),
                    code: format!("def {name}(...)"),
                    fix_suggestion: None,
                });
            }
        }

        issues
    }

    fn check_security(&self, content: &str, ext: &str) -> Vec<ReviewIssue> {
        let mut issues = Vec::new();

        for (pattern, message) in &self.secret_patterns {
            for m in pattern.find_iter(content) {
                let line = line_of_offset(content, m.start());
                issues.push(ReviewIssue {
                    category: IssueCategory::Security,
                    severity: Severity::High,
                    line,
                    message: (*message).to_string(),
                    code: line_text(content, line),
                    fix_suggestion: None,
                });
            }
        }

        for m in self.sql_interpolation.find_iter(content) {
            let line = line_of_offset(content, m.start());
            issues.push(ReviewIssue {
                category: IssueCategory::Security,
                severity: Severity::High,
                line,
                message: "Possible SQL injection via string interpolation".to_string(),
                code: line_text(content, line),
                fix_suggestion: None,
            });
        }

        if matches!(ext, "py" | "js" | "ts") {
            for m in self.eval_call.find_iter(content) {
                let line = line_of_offset(content, m.start());
                issues.push(ReviewIssue {
                    category: IssueCategory::Security,
                    severity: Severity::High,
                    line,
                    message: "Use of eval".to_string(),
                    code: line_text(content, line),
                    fix_suggestion: None,
                });
            }
        }

        issues
    }

    fn check_performance(&self, content: &str, ext: &str) -> Vec<ReviewIssue> {
        let mut issues = Vec::new();
        if ext != "py" {
            return issues;
        }

        for m in self.py_string_concat_loop.find_iter(content) {
            let line = line_of_offset(content, m.start());
            issues.push(ReviewIssue {
                category: IssueCategory::Performance,
                severity: Severity::Medium,
                line,
                message: "Inefficient string concatenation in a loop".to_string(),
                code: line_text(content, line),
                fix_suggestion: None,
            });
        }

        for m in self.py_list_concat.find_iter(content) {
            let line = line_of_offset(content, m.start());
            issues.push(ReviewIssue {
                category: IssueCategory::Performance,
                severity: Severity::Low,
                line,
                message: "List concatenation with + (use extend)".to_string(),
                code: line_text(content, line),
                fix_suggestion: None,
            });
        }

        issues
    }

    /// Reviews every file named by the event, reading commit files from the
    /// working tree and using embedded snapshots for uncommitted work.
    fn review_event(&self, event: &ChangeEvent) -> Option<ReviewReport> {
        let mut files = Vec::new();

        match event {
            ChangeEvent::Commit(change) => {
                for stat in &change.commit.files {
                    if stat.status == "D" {
                        continue;
                    }
                    let path = change.repo_path.join(&stat.path);
                    let Some(content) = crate::git::content_snapshot(&path) else {
                        debug!("Skipping unreadable file {}", stat.path);
                        continue;
                    };
                    if let Some(review) = self.review_content(&stat.path, &content) {
                        files.push(review);
                    }
                }
            }
            ChangeEvent::Staged(_) | ChangeEvent::LocalEdit(_) => {
                let path = event.file_path()?;
                let content = event.content()?;
                if let Some(review) = self.review_content(path, content) {
                    files.push(review);
                }
            }
            ChangeEvent::File(_) => return None,
        }

        let issues_found = files.iter().map(|f| f.issues.len()).sum();
        Some(ReviewReport {
            issues_found,
            files,
        })
    }
}

#[async_trait]
impl AnalysisModule for CodeReviewer {
    fn name(&self) -> &'static str {
        "code_review"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn process(&self, event: &ChangeEvent) -> Result<Option<ModuleResult>> {
        let Some(report) = self.review_event(event) else {
            return Ok(None);
        };

        let summary = if report.issues_found == 0 {
            "No issues detected".to_string()
        } else {
            format!(
                "Found {} issues in {} files",
                report.issues_found,
                report.files.len()
            )
        };

        Ok(Some(
            ModuleResult::new(self.name(), summary).with_payload(ResultPayload::Review(report)),
        ))
    }
}

/// 1-based line number of a byte offset.
fn line_of_offset(content: &str, offset: usize) -> usize {
    content[..offset].bytes().filter(|b| *b == b'\n').count() + 1
}

/// Trimmed text of a 1-based line.
fn line_text(content: &str, line: usize) -> String {
    content
        .lines()
        .nth(line.saturating_sub(1))
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Canned fix suggestion for an issue.
fn fix_suggestion(issue: &ReviewIssue) -> &'static str {
    match issue.category {
        IssueCategory::Quality => {
            if issue.message.starts_with("Line too long") {
                "Split this line to improve readability."
            } else if issue.message.contains("too long") {
                "Refactor this function into smaller functions with focused responsibilities."
            } else {
                "Use a descriptive name that explains the variable's purpose."
            }
        }
        IssueCategory::Security => {
            if issue.message.starts_with("Hardcoded") {
                "Move this value to an environment variable or a secret store."
            } else if issue.message.contains("SQL injection") {
                "Use parameterized queries instead of building SQL from strings."
            } else {
                "Avoid eval; look for a safer alternative."
            }
        }
        IssueCategory::Performance => {
            if issue.message.contains("string concatenation") {
                "Collect the pieces in a list and join them once after the loop."
            } else {
                "Use extend instead of concatenating lists with +."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{normalize, RawChange};
    use crate::git::StagedRecord;
    use std::path::Path;

    fn reviewer() -> CodeReviewer {
        let resolved = config_schema().resolve("code_review", &ModuleConfig::new());
        CodeReviewer::from_config(&resolved).unwrap()
    }

    fn staged_event(path: &str, content: &str) -> ChangeEvent {
        normalize(
            RawChange::Staged(StagedRecord {
                path: path.to_string(),
                status: "A".to_string(),
                event_kind: "created".to_string(),
                description: "Added".to_string(),
                content: content.to_string(),
                date: chrono::Utc::now(),
            }),
            Path::new("/tmp/repo"),
        )
    }

    #[tokio::test]
    async fn staged_secret_raises_high_severity_issue() {
        let event = staged_event("secrets.py", "password = \"x\"\n");
        let result = reviewer().process(&event).await.unwrap().unwrap();

        let Some(ResultPayload::Review(report)) = result.payload else {
            panic!("expected review payload");
        };
        assert_eq!(report.issues_found, 1);
        let issue = &report.files[0].issues[0];
        assert_eq!(issue.category, IssueCategory::Security);
        assert_eq!(issue.severity, Severity::High);
        assert_eq!(issue.line, 1);
        assert_eq!(issue.message, "Hardcoded password");
    }

    #[tokio::test]
    async fn clean_file_reports_no_issues() {
        let event = staged_event("lib.py", "VALID = True\n");
        let result = reviewer().process(&event).await.unwrap().unwrap();
        assert_eq!(result.summary, "No issues detected");
    }

    #[test]
    fn long_lines_are_low_severity_quality_issues() {
        let content = format!("{}\n", "a".repeat(120));
        let review = reviewer().review_content("big.rs", &content).unwrap();
        assert_eq!(review.issues[0].category, IssueCategory::Quality);
        assert_eq!(review.issues[0].severity, Severity::Low);
    }

    #[test]
    fn severity_threshold_filters_low_issues() {
        let mut config = ModuleConfig::new();
        config.set("severity_threshold", serde_yaml::Value::from("high"));
        let resolved = config_schema().resolve("code_review", &config);
        let reviewer = CodeReviewer::from_config(&resolved).unwrap();

        let content = format!("{}\n", "a".repeat(120));
        assert!(reviewer.review_content("big.rs", &content).is_none());

        let review = reviewer
            .review_content("conf.py", "api_key = \"sk-123\"\n")
            .unwrap();
        assert_eq!(review.issues.len(), 1);
    }

    #[test]
    fn long_python_function_is_flagged() {
        let mut content = String::from("def sprawling():\n");
        for i in 0..40 {
            content.push_str(&format!("    x{i} = {i}\n"));
        }
        let review = reviewer().review_content("mod.py", &content).unwrap();
        assert!(review
            .issues
            .iter()
            .any(|i| i.message.contains("sprawling") && i.severity == Severity::Medium));
    }

    #[test]
    fn fix_suggestions_are_attached() {
        let review = reviewer()
            .review_content("conf.py", "token = \"abc\"\n")
            .unwrap();
        assert!(review.issues[0]
            .fix_suggestion
            .as_deref()
            .unwrap()
            .contains("environment variable"));
    }
}
