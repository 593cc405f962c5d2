//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for Josephine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Human operator settings
    #[serde(default)]
    pub operator: OperatorConfig,
    /// Dialogue engine tuning
    #[serde(default)]
    pub dialogue: DialogueConfig,
    /// Channel configuration
    #[serde(default)]
    pub channels: ChannelsConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Human operator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// The operator's own account id (e.g. `255617513064@s.whatsapp.net`)
    #[serde(default)]
    pub id: String,
    /// Text the operator sends to hand a thread back to automation
    #[serde(default = "default_resume_keyword")]
    pub resume_keyword: String,
}

fn default_resume_keyword() -> String {
    "resume".to_string()
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            resume_keyword: default_resume_keyword(),
        }
    }
}

impl OperatorConfig {
    /// Operator id without the `@server` suffix, if configured
    pub fn user_part(&self) -> Option<&str> {
        let id = self.id.trim();
        if id.is_empty() {
            return None;
        }
        id.split('@').next().filter(|s| !s.is_empty())
    }
}

/// Longest accepted cooldown, one year
pub const MAX_COOLDOWN_SECS: u64 = 365 * 24 * 60 * 60;

/// Dialogue engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    /// Seconds a finished or deferred conversation stays silent
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Consecutive unmatched replies before the conversation re-orients
    #[serde(default = "default_max_invalid_replies")]
    pub max_invalid_replies: u32,
}

fn default_cooldown_secs() -> u64 {
    2 * 60 * 60
}

fn default_max_invalid_replies() -> u32 {
    3
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            max_invalid_replies: default_max_invalid_replies(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}

/// Channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
}

/// WhatsApp channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default)]
    pub enabled: bool,
    /// WebSocket URL of the WhatsApp Web bridge
    #[serde(default = "default_whatsapp_bridge")]
    pub bridge_url: String,
    /// Allowed senders (empty = everyone)
    #[serde(default)]
    pub allow_from: Vec<String>,
    /// Directory where the bridge keeps its pairing credentials
    #[serde(default = "default_auth_dir")]
    pub auth_dir: String,
}

fn default_whatsapp_bridge() -> String {
    "ws://localhost:3001".to_string()
}

fn default_auth_dir() -> String {
    "./auth_info".to_string()
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bridge_url: default_whatsapp_bridge(),
            allow_from: Vec::new(),
            auth_dir: default_auth_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.dialogue.cooldown_secs, 7200);
        assert_eq!(config.dialogue.max_invalid_replies, 3);
        assert_eq!(config.operator.resume_keyword, "resume");
        assert_eq!(config.channels.whatsapp.bridge_url, "ws://localhost:3001");
        assert_eq!(config.channels.whatsapp.auth_dir, "./auth_info");
        assert!(!config.channels.whatsapp.enabled);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"channels":{"whatsapp":{"enabled":true}}}"#).unwrap();
        assert!(config.channels.whatsapp.enabled);
        assert_eq!(config.channels.whatsapp.bridge_url, "ws://localhost:3001");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_operator_user_part() {
        let mut operator = OperatorConfig::default();
        assert_eq!(operator.user_part(), None);

        operator.id = "255617513064@s.whatsapp.net".to_string();
        assert_eq!(operator.user_part(), Some("255617513064"));

        operator.id = "255617513064".to_string();
        assert_eq!(operator.user_part(), Some("255617513064"));
    }
}
