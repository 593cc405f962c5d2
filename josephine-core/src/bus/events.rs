//! Event types for the message bus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata key set by channels for messages typed from the bot's own account
pub const META_FROM_ME: &str = "from_me";
/// Metadata key set by channels for group / multi-party chats
pub const META_IS_GROUP: &str = "is_group";
/// Metadata key marking an explicit operator takeover request
pub const META_OPERATOR_INTERRUPT: &str = "operator_interrupt";
/// Metadata key carrying the transport's message id
pub const META_MESSAGE_ID: &str = "message_id";

/// Message received from a chat channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel identifier (e.g., "whatsapp")
    pub channel: String,
    /// Author identifier (phone number part of the JID for WhatsApp)
    pub sender_id: String,
    /// Thread identifier, replies go here
    pub chat_id: String,
    /// Message text content (empty for non-text messages)
    pub content: String,
    /// Message timestamp
    pub timestamp: DateTime<Utc>,
    /// Channel-specific metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

impl InboundMessage {
    /// Create a new inbound message
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            sender_id: sender_id.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Add metadata to the message
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether the message was typed from the bot's own account
    pub fn is_from_me(&self) -> bool {
        self.flag(META_FROM_ME)
    }

    /// Whether the message belongs to a group chat
    pub fn is_group(&self) -> bool {
        self.flag(META_IS_GROUP)
    }

    /// Whether the message is an explicit operator takeover request
    pub fn is_operator_interrupt(&self) -> bool {
        self.flag(META_OPERATOR_INTERRUPT)
    }

    fn flag(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Message to send to a chat channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Channel identifier
    pub channel: String,
    /// Target chat identifier
    pub chat_id: String,
    /// Message text content
    pub content: String,
}

impl OutboundMessage {
    /// Create a new outbound message
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_default_to_false() {
        let msg = InboundMessage::new("whatsapp", "12345", "12345@s.whatsapp.net", "hi");
        assert!(!msg.is_from_me());
        assert!(!msg.is_group());
        assert!(!msg.is_operator_interrupt());
    }

    #[test]
    fn test_flags_read_metadata() {
        let msg = InboundMessage::new("whatsapp", "12345", "12345@s.whatsapp.net", "hi")
            .with_metadata(META_FROM_ME, true)
            .with_metadata(META_IS_GROUP, "yes");

        assert!(msg.is_from_me());
        // Non-boolean values are not treated as set
        assert!(!msg.is_group());
    }
}
