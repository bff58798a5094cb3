//! Module registry.
//!
//! An explicit, append-only catalog mapping module identifiers to their
//! schema and constructor. The built-in set is assembled from a static
//! table at startup and the registry object is passed by reference to
//! whoever needs it; there is no process-global state and no unregister.

use anyhow::Result;
use thiserror::Error;
use tracing::debug;

use crate::modules::schema::{ConfigSchema, ModuleConfig};
use crate::modules::AnalysisModule;

/// Constructor signature for a module.
pub type ModuleBuilder = fn(ModuleConfig) -> Result<Box<dyn AnalysisModule>>;

/// One registered module class.
#[derive(Clone)]
pub struct ModuleEntry {
    /// Stable identifier, also the key in the `modules` config table.
    pub name: &'static str,
    /// One-line description for the CLI listing.
    pub description: &'static str,
    /// Returns the module's configuration schema.
    pub schema: fn() -> ConfigSchema,
    /// Constructs an instance from resolved configuration.
    pub build: ModuleBuilder,
}

/// Registry errors.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The requested module name is not registered.
    #[error("Module '{0}' is not registered")]
    UnknownModule(String),

    /// The module's constructor failed.
    #[error("Failed to construct module '{name}': {source}")]
    Construction {
        /// Module identifier.
        name: String,
        /// Constructor error.
        #[source]
        source: anyhow::Error,
    },
}

/// Append-only catalog of available modules.
pub struct ModuleRegistry {
    entries: Vec<ModuleEntry>,
}

impl ModuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// A registry populated with the built-in module set, in dispatch
    /// order.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for entry in crate::modules::dispatcher::BUILTIN_MODULES {
            registry.register(entry.clone());
        }
        registry
    }

    /// Registers a module class. Last registration of a name wins lookup,
    /// but names are expected to be unique.
    pub fn register(&mut self, entry: ModuleEntry) {
        debug!("Registered module '{}'", entry.name);
        self.entries.push(entry);
    }

    /// Looks up a module class by name.
    pub fn get(&self, name: &str) -> Option<&ModuleEntry> {
        self.entries.iter().rev().find(|e| e.name == name)
    }

    /// All registered classes, in registration order.
    pub fn entries(&self) -> &[ModuleEntry] {
        &self.entries
    }

    /// Constructs an instance of the named module.
    ///
    /// The supplied configuration is resolved against the module's schema
    /// first, so missing keys get defaults before the constructor runs.
    pub fn create(
        &self,
        name: &str,
        config: &ModuleConfig,
    ) -> Result<Box<dyn AnalysisModule>, RegistryError> {
        let entry = self
            .get(name)
            .ok_or_else(|| RegistryError::UnknownModule(name.to_string()))?;

        let resolved = (entry.schema)().resolve(name, config);
        (entry.build)(resolved).map_err(|source| RegistryError::Construction {
            name: name.to_string(),
            source,
        })
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
