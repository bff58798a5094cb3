//! Module configuration schemas.
//!
//! Every module declares the keys it understands: name, type, default, and
//! optionally the allowed values. The registry resolves a user-supplied
//! configuration against the schema before construction: unspecified keys
//! get their defaults, ill-typed values are replaced with a warning, and
//! nothing here ever crashes on missing configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Value type of a configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigValueType {
    /// Boolean flag.
    Bool,
    /// Free-form or enumerated string.
    String,
    /// Integer.
    Integer,
    /// List of strings.
    StringList,
}

/// Declaration of one configuration key.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigKey {
    /// Key name.
    pub name: &'static str,
    /// Expected value type.
    pub value_type: ConfigValueType,
    /// Default used when the key is unspecified or invalid.
    pub default: serde_yaml::Value,
    /// One-line description for the `modules` CLI listing.
    pub description: &'static str,
    /// Allowed values, for enumerated string keys.
    pub allowed: Option<&'static [&'static str]>,
}

impl ConfigKey {
    /// True when `value` matches the declared type and allowed set.
    fn accepts(&self, value: &serde_yaml::Value) -> bool {
        let type_ok = match self.value_type {
            ConfigValueType::Bool => value.is_bool(),
            ConfigValueType::Integer => value.is_i64() || value.is_u64(),
            ConfigValueType::String => value.is_string(),
            ConfigValueType::StringList => value
                .as_sequence()
                .is_some_and(|seq| seq.iter().all(serde_yaml::Value::is_string)),
        };
        if !type_ok {
            return false;
        }

        match (self.allowed, value.as_str()) {
            (Some(allowed), Some(s)) => allowed.contains(&s),
            _ => true,
        }
    }
}

/// The full schema of one module.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSchema {
    /// Declared keys, in display order.
    pub keys: Vec<ConfigKey>,
}

impl ConfigSchema {
    /// Builds a schema from key declarations. Every schema implicitly
    /// carries the shared `enabled` key first.
    pub fn new(keys: Vec<ConfigKey>) -> Self {
        let mut all = vec![ConfigKey {
            name: "enabled",
            value_type: ConfigValueType::Bool,
            default: serde_yaml::Value::Bool(true),
            description: "Enable or disable this module",
            allowed: None,
        }];
        all.extend(keys);
        Self { keys: all }
    }

    /// Looks up a key declaration.
    pub fn key(&self, name: &str) -> Option<&ConfigKey> {
        self.keys.iter().find(|k| k.name == name)
    }

    /// Resolves a supplied configuration against this schema.
    ///
    /// Starts from the declared defaults, then overlays supplied values
    /// that type-check. Invalid values are logged and keep the default;
    /// keys the schema does not declare pass through untouched so modules
    /// can grow settings without breaking old configs.
    pub fn resolve(&self, module: &str, supplied: &ModuleConfig) -> ModuleConfig {
        let mut resolved = BTreeMap::new();
        for key in &self.keys {
            resolved.insert(key.name.to_string(), key.default.clone());
        }

        for (name, value) in supplied.iter() {
            match self.key(name) {
                Some(key) if key.accepts(value) => {
                    resolved.insert(name.clone(), value.clone());
                }
                Some(key) => {
                    warn!(
                        "Module '{module}': invalid value for '{name}', using default {:?}",
                        key.default
                    );
                }
                None => {
                    resolved.insert(name.clone(), value.clone());
                }
            }
        }

        ModuleConfig(resolved)
    }
}

/// A module's configuration mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleConfig(pub BTreeMap<String, serde_yaml::Value>);

impl ModuleConfig {
    /// Empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates over key/value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_yaml::Value)> {
        self.0.iter()
    }

    /// Boolean value of `key`, or `default` when absent or ill-typed.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.0.get(key).and_then(serde_yaml::Value::as_bool).unwrap_or(default)
    }

    /// String value of `key`, or `default`.
    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.0
            .get(key)
            .and_then(serde_yaml::Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    /// Integer value of `key`, or `default`.
    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.0.get(key).and_then(serde_yaml::Value::as_i64).unwrap_or(default)
    }

    /// String-list value of `key`, or `default`.
    pub fn get_str_list(&self, key: &str, default: &[&str]) -> Vec<String> {
        self.0
            .get(key)
            .and_then(serde_yaml::Value::as_sequence)
            .map(|seq| {
                seq.iter()
                    .filter_map(serde_yaml::Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_else(|| default.iter().map(|s| (*s).to_string()).collect())
    }

    /// Sets a value, mainly for tests and programmatic construction.
    pub fn set(&mut self, key: &str, value: serde_yaml::Value) {
        self.0.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    fn schema() -> ConfigSchema {
        ConfigSchema::new(vec![
            ConfigKey {
                name: "max_length",
                value_type: ConfigValueType::Integer,
                default: Value::from(72),
                description: "Maximum subject length",
                allowed: None,
            },
            ConfigKey {
                name: "convention",
                value_type: ConfigValueType::String,
                default: Value::from("conventional"),
                description: "Message convention",
                allowed: Some(&["conventional", "simple"]),
            },
        ])
    }

    #[test]
    fn defaults_fill_unspecified_keys() {
        let resolved = schema().resolve("test", &ModuleConfig::new());

        assert!(resolved.get_bool("enabled", false));
        assert_eq!(resolved.get_i64("max_length", 0), 72);
        assert_eq!(resolved.get_str("convention", ""), "conventional");
    }

    #[test]
    fn supplied_values_override_defaults() {
        let mut supplied = ModuleConfig::new();
        supplied.set("enabled", Value::Bool(false));
        supplied.set("max_length", Value::from(50));

        let resolved = schema().resolve("test", &supplied);
        assert!(!resolved.get_bool("enabled", true));
        assert_eq!(resolved.get_i64("max_length", 0), 50);
    }

    #[test]
    fn ill_typed_values_fall_back_to_defaults() {
        let mut supplied = ModuleConfig::new();
        supplied.set("max_length", Value::from("not a number"));
        supplied.set("convention", Value::from("interpretive-dance"));

        let resolved = schema().resolve("test", &supplied);
        assert_eq!(resolved.get_i64("max_length", 0), 72);
        assert_eq!(resolved.get_str("convention", ""), "conventional");
    }

    #[test]
    fn undeclared_keys_pass_through() {
        let mut supplied = ModuleConfig::new();
        supplied.set("experimental", Value::Bool(true));

        let resolved = schema().resolve("test", &supplied);
        assert!(resolved.get_bool("experimental", false));
    }
}
