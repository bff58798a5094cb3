//! The `modules` subcommand: lists modules and their configuration keys.

use anyhow::Result;
use clap::Args;

use crate::modules::ModuleRegistry;

/// List available analysis modules and their configuration keys
#[derive(Args)]
pub struct ModulesCommand {}

impl ModulesCommand {
    /// Execute the modules command
    pub fn execute(self) -> Result<()> {
        let registry = ModuleRegistry::builtin();

        for entry in registry.entries() {
            println!("{}", entry.name);
            println!("    {}", entry.description);

            let schema = (entry.schema)();
            for key in &schema.keys {
                let default = serde_yaml::to_string(&key.default)
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                let allowed = key
                    .allowed
                    .map(|values| format!(" (one of: {})", values.join(", ")))
                    .unwrap_or_default();
                println!(
                    "    {} [{:?}, default: {default}]{allowed}: {}",
                    key.name, key.value_type, key.description
                );
            }
            println!();
        }

        Ok(())
    }
}
