//! Change impact analysis.
//!
//! Classifies the blast radius of a change from path-based criticality
//! patterns, infers components likely to be affected, and suggests the
//! kinds of tests worth running.

use anyhow::Result;
use async_trait::async_trait;
use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::event::ChangeEvent;
use crate::modules::schema::{ConfigKey, ConfigSchema, ConfigValueType, ModuleConfig};
use crate::modules::{AnalysisModule, ModuleResult, ResultPayload};

/// Path fragments that mark a file as highly critical.
const HIGH_CRITICALITY: &[&str] = &[
    "security", "auth", "password", "credential", "token", "payment", "core", "config", "main",
    "database", "db", "api", "server", "router", "controller",
];

/// Path fragments that mark a file as moderately critical.
const MEDIUM_CRITICALITY: &[&str] = &[
    "service",
    "model",
    "store",
    "state",
    "util",
    "helper",
    "middleware",
    "validator",
    "parser",
    "formatter",
];

/// Impact (and criticality) level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    /// Unlikely to affect anything else.
    Low,
    /// Worth a closer look.
    Medium,
    /// Touches critical surface.
    High,
}

impl std::fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ImpactLevel::Low => "low",
            ImpactLevel::Medium => "medium",
            ImpactLevel::High => "high",
        };
        f.write_str(s)
    }
}

/// A component likely affected by the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedComponent {
    /// Component kind (controller, view, multiple).
    pub kind: String,
    /// Inferred component name.
    pub name: String,
    /// Why it is likely affected.
    pub reason: String,
}

/// A suggested test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedTest {
    /// Test kind (unit, integration, ui).
    pub kind: String,
    /// Suggested test name.
    pub name: String,
    /// What it should cover.
    pub description: String,
}

/// Impact assessment for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileImpact {
    /// Path relative to the repository root.
    pub file: String,
    /// Path-based criticality.
    pub criticality: ImpactLevel,
    /// Combined impact level.
    pub impact_level: ImpactLevel,
    /// Components likely affected.
    pub affected_components: Vec<AffectedComponent>,
    /// Tests worth running.
    pub suggested_tests: Vec<SuggestedTest>,
}

/// Full impact payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactReport {
    /// Aggregated level across all assessed files.
    pub impact_level: ImpactLevel,
    /// Per-file assessments.
    pub files: Vec<FileImpact>,
}

/// Configuration schema for the impact analyzer.
pub fn config_schema() -> ConfigSchema {
    ConfigSchema::new(vec![
        ConfigKey {
            name: "analyze_dependencies",
            value_type: ConfigValueType::Bool,
            default: serde_yaml::Value::Bool(true),
            description: "Infer components affected by the change",
            allowed: None,
        },
        ConfigKey {
            name: "suggest_tests",
            value_type: ConfigValueType::Bool,
            default: serde_yaml::Value::Bool(true),
            description: "Suggest tests to run for the change",
            allowed: None,
        },
    ])
}

/// Constructs the analyzer from resolved configuration.
pub fn build(config: ModuleConfig) -> Result<Box<dyn AnalysisModule>> {
    Ok(Box::new(ImpactAnalyzer::from_config(&config)?))
}

/// Path-pattern based impact analyzer.
pub struct ImpactAnalyzer {
    enabled: bool,
    analyze_dependencies: bool,
    suggest_tests: bool,
    high_patterns: RegexSet,
    medium_patterns: RegexSet,
}

impl ImpactAnalyzer {
    /// Builds the analyzer, compiling its pattern sets once.
    pub fn from_config(config: &ModuleConfig) -> Result<Self> {
        Ok(Self {
            enabled: config.get_bool("enabled", true),
            analyze_dependencies: config.get_bool("analyze_dependencies", true),
            suggest_tests: config.get_bool("suggest_tests", true),
            high_patterns: RegexSet::new(
                HIGH_CRITICALITY.iter().map(|p| format!("(?i){p}")),
            )?,
            medium_patterns: RegexSet::new(
                MEDIUM_CRITICALITY.iter().map(|p| format!("(?i){p}")),
            )?,
        })
    }

    /// Path-based criticality of one file.
    pub fn criticality(&self, file: &str) -> ImpactLevel {
        if self.high_patterns.is_match(file) {
            ImpactLevel::High
        } else if self.medium_patterns.is_match(file) {
            ImpactLevel::Medium
        } else {
            ImpactLevel::Low
        }
    }

    /// Assesses one file.
    pub fn assess_file(&self, file: &str) -> FileImpact {
        let criticality = self.criticality(file);
        let base_name = file
            .rsplit('/')
            .next()
            .and_then(|name| name.split('.').next())
            .unwrap_or(file);

        let mut affected_components = Vec::new();
        if self.analyze_dependencies {
            if file.contains("model") {
                affected_components.push(AffectedComponent {
                    kind: "controller".to_string(),
                    name: format!("{base_name}_controller"),
                    reason: format!("Uses the {base_name} model"),
                });
            }
            if file.contains("service") {
                affected_components.push(AffectedComponent {
                    kind: "view".to_string(),
                    name: format!("{base_name}_view"),
                    reason: format!("Consumes the {base_name} service"),
                });
            }
            if file.contains("util") || file.contains("helper") {
                affected_components.push(AffectedComponent {
                    kind: "multiple".to_string(),
                    name: "several_components".to_string(),
                    reason: format!("Depend on the {base_name} utility"),
                });
            }
        }

        let mut suggested_tests = Vec::new();
        if self.suggest_tests {
            suggested_tests.push(SuggestedTest {
                kind: "unit".to_string(),
                name: format!("test_{base_name}"),
                description: format!("Unit tests for {base_name}"),
            });
            if criticality >= ImpactLevel::Medium {
                suggested_tests.push(SuggestedTest {
                    kind: "integration".to_string(),
                    name: format!("integration_test_{base_name}"),
                    description: format!("Integration tests involving {base_name}"),
                });
            }
            if file.contains("view") || file.contains("component") {
                suggested_tests.push(SuggestedTest {
                    kind: "ui".to_string(),
                    name: format!("ui_test_{base_name}"),
                    description: format!("Interface tests for {base_name}"),
                });
            }
        }

        let impact_level = combine(criticality, affected_components.len());

        FileImpact {
            file: file.to_string(),
            criticality,
            impact_level,
            affected_components,
            suggested_tests,
        }
    }

    fn files_of(event: &ChangeEvent) -> Vec<String> {
        match event {
            ChangeEvent::Commit(change) => change
                .commit
                .files
                .iter()
                .map(|f| f.path.clone())
                .collect(),
            ChangeEvent::Staged(_) | ChangeEvent::LocalEdit(_) => event
                .file_path()
                .map(|p| vec![p.to_string()])
                .unwrap_or_default(),
            ChangeEvent::File(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl AnalysisModule for ImpactAnalyzer {
    fn name(&self) -> &'static str {
        "impact"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn process(&self, event: &ChangeEvent) -> Result<Option<ModuleResult>> {
        let files = Self::files_of(event);
        if files.is_empty() {
            return Ok(None);
        }

        let assessments: Vec<FileImpact> =
            files.iter().map(|f| self.assess_file(f)).collect();

        let impact_level = assessments
            .iter()
            .map(|a| a.impact_level)
            .max()
            .unwrap_or(ImpactLevel::Low);

        let summary = format!(
            "{impact_level} impact across {} files",
            assessments.len()
        );

        let report = ImpactReport {
            impact_level,
            files: assessments,
        };

        Ok(Some(
            ModuleResult::new(self.name(), summary).with_payload(ResultPayload::Impact(report)),
        ))
    }
}

/// Combines criticality with the number of affected components into an
/// overall level.
fn combine(criticality: ImpactLevel, affected_count: usize) -> ImpactLevel {
    match criticality {
        ImpactLevel::High => {
            if affected_count > 0 {
                ImpactLevel::High
            } else {
                ImpactLevel::Medium
            }
        }
        ImpactLevel::Medium => {
            if affected_count > 2 {
                ImpactLevel::High
            } else {
                ImpactLevel::Medium
            }
        }
        ImpactLevel::Low => {
            if affected_count > 4 {
                ImpactLevel::High
            } else if affected_count > 0 {
                ImpactLevel::Medium
            } else {
                ImpactLevel::Low
            }
        }
    }
}
