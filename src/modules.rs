//! Pluggable analysis modules.
//!
//! Every module implements [`AnalysisModule`]: given one normalized change
//! event it produces a result, nothing, or an error that the dispatcher
//! isolates from its siblings. Modules are mutually independent; none may
//! depend on another module's output within the same dispatch.

pub mod ai_summary;
pub mod code_review;
pub mod commit_message;
pub mod dispatcher;
pub mod docstring;
pub mod impact;
pub mod registry;
pub mod schema;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::ChangeEvent;

pub use dispatcher::ModuleDispatcher;
pub use registry::{ModuleEntry, ModuleRegistry, RegistryError};
pub use schema::{ConfigKey, ConfigSchema, ConfigValueType, ModuleConfig};

/// One analysis module.
///
/// Implementations must uphold the "never raise past `process`" contract:
/// internal failures are converted into an error-shaped result, a fallback
/// summary, or `Ok(None)`. The `Err` path exists so the dispatcher can
/// isolate a misbehaving module anyway.
#[async_trait]
pub trait AnalysisModule: Send + Sync {
    /// Stable module identifier.
    fn name(&self) -> &'static str;

    /// Whether this module should receive events.
    fn enabled(&self) -> bool;

    /// Processes one event. `Ok(None)` means the module has nothing to say
    /// about this event, which is not an error.
    async fn process(&self, event: &ChangeEvent) -> Result<Option<ModuleResult>>;
}

/// Result of one module processing one event. Created fresh per module per
/// event, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleResult {
    /// Identifier of the module that produced the result.
    pub module: String,
    /// Human-readable one-paragraph summary.
    pub summary: String,
    /// Production time.
    pub timestamp: DateTime<Utc>,
    /// Structured payload, when the module has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<ResultPayload>,
}

impl ModuleResult {
    /// Builds a result stamped with the current time.
    pub fn new(module: &str, summary: impl Into<String>) -> Self {
        Self {
            module: module.to_string(),
            summary: summary.into(),
            timestamp: Utc::now(),
            payload: None,
        }
    }

    /// Attaches a structured payload.
    pub fn with_payload(mut self, payload: ResultPayload) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Structured payloads produced by the built-in modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultPayload {
    /// Issues found by the rule-based reviewer.
    Review(code_review::ReviewReport),
    /// Impact classification.
    Impact(impact::ImpactReport),
    /// A generated commit message.
    CommitMessage(commit_message::GeneratedMessage),
    /// Documentation gaps and proposed docstrings.
    Docstrings(docstring::DocstringReport),
    /// Free-form analysis text.
    Analysis {
        /// The analysis body.
        text: String,
    },
}
