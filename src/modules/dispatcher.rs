//! Module dispatch.
//!
//! The dispatcher owns the constructed module instances and runs each
//! enabled one over every event, sequentially and in registry order. One
//! module's failure never suppresses another module's result.

use std::collections::BTreeMap;

use tracing::{debug, error, info};

use crate::event::ChangeEvent;
use crate::modules::registry::{ModuleEntry, ModuleRegistry};
use crate::modules::schema::ModuleConfig;
use crate::modules::{AnalysisModule, ModuleResult};

/// The built-in module classes, in dispatch order.
pub static BUILTIN_MODULES: &[ModuleEntry] = &[
    ModuleEntry {
        name: "ai_summary",
        description: "Summarizes changes with the Claude API",
        schema: crate::modules::ai_summary::config_schema,
        build: crate::modules::ai_summary::build,
    },
    ModuleEntry {
        name: "code_review",
        description: "Rule-based quality, security, and performance review",
        schema: crate::modules::code_review::config_schema,
        build: crate::modules::code_review::build,
    },
    ModuleEntry {
        name: "commit_message",
        description: "Generates commit messages for uncommitted work",
        schema: crate::modules::commit_message::config_schema,
        build: crate::modules::commit_message::build,
    },
    ModuleEntry {
        name: "docstring",
        description: "Finds undocumented definitions and proposes docstrings",
        schema: crate::modules::docstring::config_schema,
        build: crate::modules::docstring::build,
    },
    ModuleEntry {
        name: "impact",
        description: "Classifies the blast radius of a change",
        schema: crate::modules::impact::config_schema,
        build: crate::modules::impact::build,
    },
];

/// Runs enabled modules over normalized events and collects their results.
pub struct ModuleDispatcher {
    modules: Vec<Box<dyn AnalysisModule>>,
}

impl ModuleDispatcher {
    /// Builds a dispatcher from explicit instances, mainly for tests.
    pub fn new(modules: Vec<Box<dyn AnalysisModule>>) -> Self {
        Self { modules }
    }

    /// Constructs every registered module with its configuration.
    ///
    /// A constructor failure (for example a missing credential) logs the
    /// error and leaves that module out of the active set for the process
    /// lifetime; sibling modules are unaffected.
    pub fn from_registry(
        registry: &ModuleRegistry,
        module_configs: &BTreeMap<String, ModuleConfig>,
    ) -> Self {
        let empty = ModuleConfig::new();
        let mut modules = Vec::new();

        for entry in registry.entries() {
            let config = module_configs.get(entry.name).unwrap_or(&empty);
            match registry.create(entry.name, config) {
                Ok(module) => {
                    info!(
                        "Module '{}' initialized (enabled={})",
                        entry.name,
                        module.enabled()
                    );
                    modules.push(module);
                }
                Err(e) => {
                    error!("Module '{}' unavailable: {e}", entry.name);
                }
            }
        }

        Self { modules }
    }

    /// Identifiers of the active (constructed) modules.
    pub fn active_modules(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// Processes one event through every enabled module.
    ///
    /// Results are collected in module iteration order. A failing module is
    /// logged and skipped; a module returning nothing contributes nothing.
    pub async fn process_event(&self, event: &ChangeEvent) -> Vec<ModuleResult> {
        let mut results = Vec::new();

        for module in &self.modules {
            if !module.enabled() {
                debug!("Module '{}' disabled, skipping event", module.name());
                continue;
            }

            match module.process(event).await {
                Ok(Some(result)) => {
                    debug!("Module '{}' produced a result", module.name());
                    results.push(result);
                }
                Ok(None) => {
                    debug!("Module '{}' had nothing to report", module.name());
                }
                Err(e) => {
                    error!(
                        "Module '{}' failed on {}: {e:#}",
                        module.name(),
                        event.label()
                    );
                }
            }
        }

        results
    }
}
