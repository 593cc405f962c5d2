//! Channel registry used by the gateway

use crate::base::{ChannelError, ChannelHandler, ChannelHandlerPtr, Result};
use crate::whatsapp::WhatsAppHandler;
use josephine_core::bus::{InboundMessage, OutboundMessage};
use josephine_core::config::schema::Config;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Owns the configured channel handlers, keyed by channel name
pub struct ChannelManager {
    config: Config,
    inbound_tx: Option<mpsc::Sender<InboundMessage>>,
    channels: RwLock<BTreeMap<String, ChannelHandlerPtr>>,
}

impl ChannelManager {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            inbound_tx: None,
            channels: RwLock::new(BTreeMap::new()),
        }
    }

    /// Queue that handlers created by [`initialize`](Self::initialize) feed
    pub fn set_inbound_sender(&mut self, tx: mpsc::Sender<InboundMessage>) {
        self.inbound_tx = Some(tx);
    }

    /// Register a handler for every enabled channel
    pub async fn initialize(&self) -> Result<()> {
        let whatsapp = &self.config.channels.whatsapp;
        if !whatsapp.enabled {
            tracing::warn!("WhatsApp channel is disabled, no messages will be received");
            return Ok(());
        }

        let mut handler = WhatsAppHandler::new(whatsapp.clone());
        if let Some(tx) = &self.inbound_tx {
            handler.set_inbound_sender(tx.clone());
        }
        let name = handler.name().to_string();
        let handler: ChannelHandlerPtr = Arc::new(RwLock::new(handler));
        self.channels.write().await.insert(name.clone(), handler);
        tracing::info!(channel = %name, "Channel registered");
        Ok(())
    }

    /// Start every registered handler; a failing channel does not stop the rest
    pub async fn start_all(&self) -> Result<()> {
        for (name, handler) in self.channels.read().await.iter() {
            tracing::info!(channel = %name, "Starting channel");
            if let Err(e) = handler.write().await.start().await {
                tracing::error!(channel = %name, "Failed to start channel: {}", e);
            }
        }
        Ok(())
    }

    /// Stop and unregister every handler
    pub async fn stop_all(&self) -> Result<()> {
        let channels = std::mem::take(&mut *self.channels.write().await);
        for (name, handler) in channels {
            tracing::info!(channel = %name, "Stopping channel");
            if let Err(e) = handler.write().await.stop().await {
                tracing::error!(channel = %name, "Failed to stop channel: {}", e);
            }
        }
        Ok(())
    }

    pub async fn get_handler(&self, name: &str) -> Option<ChannelHandlerPtr> {
        self.channels.read().await.get(name).cloned()
    }

    /// Deliver `message` through the named channel
    pub async fn send(&self, channel: &str, message: OutboundMessage) -> Result<()> {
        let handler = self
            .get_handler(channel)
            .await
            .ok_or_else(|| ChannelError::NotConfigured(format!("Channel {} not found", channel)))?;
        let handler = handler.read().await;
        handler.send(message).await
    }

    pub async fn is_channel_running(&self, name: &str) -> bool {
        match self.get_handler(name).await {
            Some(handler) => handler.read().await.is_running(),
            None => false,
        }
    }

    /// Registered channel names in sorted order
    pub async fn list_channels(&self) -> Vec<String> {
        self.channels.read().await.keys().cloned().collect()
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_config() -> Config {
        let mut config = Config::default();
        config.channels.whatsapp.enabled = true;
        config.channels.whatsapp.bridge_url = "ws://127.0.0.1:9".to_string();
        config
    }

    #[tokio::test]
    async fn test_disabled_whatsapp_registers_nothing() {
        let manager = ChannelManager::default();
        manager.initialize().await.unwrap();
        assert!(manager.list_channels().await.is_empty());
        assert!(manager.get_handler("whatsapp").await.is_none());
    }

    #[tokio::test]
    async fn test_enabled_whatsapp_lifecycle() {
        let manager = ChannelManager::new(enabled_config());
        manager.initialize().await.unwrap();
        assert_eq!(manager.list_channels().await, vec!["whatsapp".to_string()]);
        assert!(!manager.is_channel_running("whatsapp").await);

        manager.start_all().await.unwrap();
        assert!(manager.is_channel_running("whatsapp").await);

        manager.stop_all().await.unwrap();
        assert!(manager.list_channels().await.is_empty());
        assert!(!manager.is_channel_running("whatsapp").await);
    }

    #[tokio::test]
    async fn test_send_to_unknown_channel() {
        let manager = ChannelManager::default();
        let err = manager
            .send("telegram", OutboundMessage::new("telegram", "1", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_send_while_disconnected_fails() {
        let manager = ChannelManager::new(enabled_config());
        manager.initialize().await.unwrap();
        let err = manager
            .send(
                "whatsapp",
                OutboundMessage::new("whatsapp", "255700000001@s.whatsapp.net", "hi"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::NotRunning(_)));
    }
}
