//! Configuration validation rules.

use super::schema::{Config, MAX_COOLDOWN_SECS};

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.dialogue.cooldown_secs == 0 {
        errors.push("dialogue.cooldown_secs must be > 0".to_string());
    } else if config.dialogue.cooldown_secs > MAX_COOLDOWN_SECS {
        errors.push(format!(
            "dialogue.cooldown_secs must be <= {} (one year)",
            MAX_COOLDOWN_SECS
        ));
    }
    if config.dialogue.max_invalid_replies == 0 {
        errors.push("dialogue.max_invalid_replies must be > 0".to_string());
    }

    let keyword = &config.operator.resume_keyword;
    if keyword.trim().is_empty() {
        errors.push("operator.resume_keyword must not be empty".to_string());
    } else if keyword.trim().contains(char::is_whitespace) {
        errors.push("operator.resume_keyword must be a single word".to_string());
    }

    let whatsapp = &config.channels.whatsapp;
    if whatsapp.enabled {
        if whatsapp.bridge_url.trim().is_empty() {
            errors.push(
                "channels.whatsapp.bridge_url is required when whatsapp is enabled".to_string(),
            );
        } else if !whatsapp.bridge_url.starts_with("ws://")
            && !whatsapp.bridge_url.starts_with("wss://")
        {
            errors.push("channels.whatsapp.bridge_url must be a ws:// or wss:// URL".to_string());
        }
        if config.operator.id.trim().is_empty() {
            errors.push(
                "operator.id is required when whatsapp is enabled (set OWNER_NUMBER)".to_string(),
            );
        }
    }

    if !matches!(
        config.logging.format.to_ascii_lowercase().as_str(),
        "text" | "json"
    ) {
        errors.push("logging.format must be 'text' or 'json'".to_string());
    }
    if config.logging.dir.trim().is_empty() {
        errors.push("logging.dir must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
