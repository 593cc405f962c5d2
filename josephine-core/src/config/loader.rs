//! Configuration loading and management
//!
//! Sources, later ones winning: built-in defaults, `config.json` in the
//! config directory, legacy bridge variables (`OWNER_NUMBER`, `AUTH_DIR`,
//! `WHATSAPP_BRIDGE_URL`), then `JOSEPHINE__SECTION__FIELD` variables.

use super::schema::Config;
use super::validate::validate_config;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Configuration loader
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a new config loader with the default config directory
    pub fn new() -> Self {
        let config_dir = dirs::home_dir()
            .map(|h| h.join(".josephine"))
            .unwrap_or_else(|| PathBuf::from(".josephine"));

        Self { config_dir }
    }

    /// Create a new config loader with a custom config directory
    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            config_dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Load configuration from file and environment
    pub fn load(&self) -> crate::Result<Config> {
        let config_path = self.config_dir.join("config.json");
        let mut merged = serde_json::to_value(Config::default())?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            overlay(&mut merged, serde_json::from_str(&content)?);
        }

        for (path, raw) in env_overrides(std::env::vars()) {
            apply_override(&mut merged, &path, &raw);
        }

        let config: Config = serde_json::from_value(merged)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &Config) -> crate::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        let config_path = self.config_dir.join("config.json");
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Legacy variable names used by existing bridge deployments
const ENV_ALIASES: &[(&str, &str)] = &[
    ("OWNER_NUMBER", "operator.id"),
    ("AUTH_DIR", "channels.whatsapp.auth_dir"),
    ("WHATSAPP_BRIDGE_URL", "channels.whatsapp.bridge_url"),
];

const ENV_PREFIX: &str = "JOSEPHINE__";

/// Deep-merge `top` into `base`; objects merge key by key, anything else
/// replaces
fn overlay(base: &mut Value, top: Value) {
    match (base, top) {
        (Value::Object(target), Value::Object(entries)) => {
            for (key, value) in entries {
                match target.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Config paths and raw values taken from environment variables, in the
/// order they apply
fn env_overrides(vars: impl IntoIterator<Item = (String, String)>) -> Vec<(Vec<String>, String)> {
    let vars: Vec<(String, String)> = vars.into_iter().collect();
    let mut overrides = Vec::new();

    for (alias, path) in ENV_ALIASES {
        if let Some((_, raw)) = vars.iter().find(|(key, _)| key == alias) {
            let path = path.split('.').map(String::from).collect();
            overrides.push((path, raw.clone()));
        }
    }

    let mut prefixed: Vec<(Vec<String>, String)> = vars
        .iter()
        .filter_map(|(key, raw)| {
            let path: Vec<String> = key
                .strip_prefix(ENV_PREFIX)?
                .split("__")
                .filter(|segment| !segment.is_empty())
                .map(str::to_ascii_lowercase)
                .collect();
            (!path.is_empty()).then(|| (path, raw.clone()))
        })
        .collect();
    prefixed.sort();
    overrides.extend(prefixed);

    overrides
}

/// Write `raw` at `path`, creating intermediate objects
///
/// A field that currently holds a string keeps the raw text, so phone
/// numbers stay strings. Other fields take the value parsed as JSON, with
/// bare words falling back to strings.
fn apply_override(node: &mut Value, path: &[String], raw: &str) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };

    if rest.is_empty() {
        let value = match map.get(head) {
            Some(Value::String(_)) => Value::String(raw.to_string()),
            _ => parse_env_value(raw),
        };
        map.insert(head.clone(), value);
    } else {
        let child = map
            .entry(head.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        apply_override(child, rest, raw);
    }
}

fn parse_env_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    serde_json::from_str(trimmed).unwrap_or_else(|_| {
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        }
    })
}
