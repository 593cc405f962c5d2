//! WhatsApp channel integration
//!
//! Connects to a Node.js bridge via WebSocket to communicate with WhatsApp Web.
//! The bridge uses the @whiskeysockets/baileys library and keeps its pairing
//! credentials in the configured auth directory.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};

use josephine_core::bus::events::{META_FROM_ME, META_IS_GROUP, META_MESSAGE_ID};
use josephine_core::bus::{InboundMessage, OutboundMessage};
use josephine_core::config::WhatsAppConfig;
use josephine_core::utils::truncate;

use crate::base::{sender_allowed, ChannelError, ChannelHandler, Result};

type WsSink = futures::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    WsMessage,
>;

const RECONNECT_DELAY: tokio::time::Duration = tokio::time::Duration::from_secs(5);

/// Messages received from the bridge
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum BridgeMessage {
    #[serde(rename = "message")]
    Message {
        #[serde(default)]
        id: String,
        /// Chat JID the message belongs to
        #[serde(default)]
        sender: String,
        /// Phone number JID when the chat is addressed by LID
        #[serde(default)]
        pn: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        timestamp: Option<i64>,
        #[serde(default, alias = "isGroup")]
        is_group: bool,
        /// Written from the paired account itself
        #[serde(default, alias = "fromMe")]
        from_me: bool,
    },
    #[serde(rename = "status")]
    Status { status: String },
    #[serde(rename = "qr")]
    Qr {
        #[allow(dead_code)]
        qr: String,
    },
    #[serde(rename = "error")]
    Error { error: String },
    #[serde(rename = "sent")]
    Sent { to: String },
}

/// Send command to the bridge
#[derive(Debug, Clone, Serialize)]
struct SendCommand {
    #[serde(rename = "type")]
    msg_type: String,
    to: String,
    text: String,
}

impl SendCommand {
    fn new(to: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            msg_type: "send".to_string(),
            to: to.into(),
            text: text.into(),
        }
    }
}

/// State shared between the handler and its connection task
#[derive(Clone)]
struct BridgeReader {
    name: String,
    allow_from: Vec<String>,
    inbound_tx: Option<mpsc::Sender<InboundMessage>>,
    connected: Arc<RwLock<bool>>,
}

impl BridgeReader {
    async fn handle(&self, raw: &str) {
        let data: BridgeMessage = match serde_json::from_str(raw) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(
                    "Invalid JSON from bridge: {} (raw: {})",
                    e,
                    truncate(raw, 100)
                );
                return;
            }
        };

        match data {
            BridgeMessage::Message {
                id,
                sender,
                pn,
                content,
                timestamp,
                is_group,
                from_me,
            } => {
                if sender.ends_with("@broadcast") {
                    debug!("Skipping broadcast message from {}", sender);
                    return;
                }

                let user_id = if pn.is_empty() { &sender } else { &pn };
                let sender_id = user_id.split('@').next().unwrap_or(user_id).to_string();

                if !from_me && !sender_allowed(&self.allow_from, &sender_id) {
                    info!(
                        "Dropping WhatsApp message from non-allowlisted sender: {}",
                        sender_id
                    );
                    return;
                }

                debug!("Received message in chat {} (from_me: {})", sender, from_me);

                let is_group = is_group || sender.ends_with("@g.us");
                let mut msg = InboundMessage::new(self.name.clone(), sender_id, sender, content)
                    .with_metadata(META_IS_GROUP, is_group)
                    .with_metadata(META_FROM_ME, from_me);
                if !id.is_empty() {
                    msg = msg.with_metadata(META_MESSAGE_ID, id);
                }
                if let Some(ts) = timestamp {
                    msg = msg.with_metadata("timestamp", ts);
                }

                if let Some(tx) = &self.inbound_tx {
                    if let Err(e) = tx.send(msg).await {
                        error!("Failed to send inbound message: {}", e);
                    }
                }
            }
            BridgeMessage::Status { status } => {
                info!("WhatsApp status: {}", status);
                *self.connected.write().await = status == "connected";
            }
            BridgeMessage::Qr { .. } => {
                info!("QR code received - scan it with the WhatsApp mobile app to pair");
            }
            BridgeMessage::Error { error } => {
                error!("WhatsApp bridge error: {}", error);
            }
            BridgeMessage::Sent { to } => {
                debug!("Message sent to: {}", to);
            }
        }
    }
}

/// WhatsApp channel handler
///
/// Reconnects to the bridge every five seconds after a close or error until
/// stopped. Sends fail while the bridge is disconnected.
pub struct WhatsAppHandler {
    bridge_url: String,
    reader: BridgeReader,
    running: bool,
    /// WebSocket write stream
    ws_tx: Arc<RwLock<Option<WsSink>>>,
    /// Background task handle
    task_handle: Option<JoinHandle<()>>,
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl WhatsAppHandler {
    /// Create a new WhatsApp handler
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            bridge_url: config.bridge_url,
            reader: BridgeReader {
                name: "whatsapp".to_string(),
                allow_from: config.allow_from,
                inbound_tx: None,
                connected: Arc::new(RwLock::new(false)),
            },
            running: false,
            ws_tx: Arc::new(RwLock::new(None)),
            task_handle: None,
            shutdown_tx: None,
        }
    }

    /// Whether the bridge reports an open WhatsApp session
    pub async fn is_connected(&self) -> bool {
        *self.reader.connected.read().await
    }

    /// Handle a raw frame from the bridge
    pub async fn handle_bridge_message(&self, raw: &str) {
        self.reader.handle(raw).await;
    }

    /// WebSocket connection loop with reconnection
    async fn connection_loop(
        bridge_url: String,
        reader: BridgeReader,
        ws_tx: Arc<RwLock<Option<WsSink>>>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut running = true;

        while running {
            info!("Connecting to WhatsApp bridge at {}...", bridge_url);

            match connect_async(bridge_url.as_str()).await {
                Ok((ws_stream, _)) => {
                    info!("Connected to WhatsApp bridge");
                    let (write, mut read) = ws_stream.split();
                    *ws_tx.write().await = Some(write);
                    *reader.connected.write().await = true;

                    loop {
                        tokio::select! {
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(WsMessage::Text(text))) => reader.handle(&text).await,
                                    Some(Ok(WsMessage::Close(_))) | None => {
                                        info!("WebSocket closed by bridge");
                                        break;
                                    }
                                    Some(Err(e)) => {
                                        error!("WebSocket error: {}", e);
                                        break;
                                    }
                                    _ => {}
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                info!("Shutdown signal received");
                                running = false;
                                break;
                            }
                        }
                    }

                    *reader.connected.write().await = false;
                    *ws_tx.write().await = None;
                }
                Err(e) => {
                    error!("Failed to connect to WhatsApp bridge: {}", e);
                }
            }

            if running {
                info!("Reconnecting in {} seconds...", RECONNECT_DELAY.as_secs());
                tokio::select! {
                    _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    _ = shutdown_rx.recv() => running = false,
                }
            }
        }

        info!("WhatsApp connection loop ended");
    }
}

#[async_trait]
impl ChannelHandler for WhatsAppHandler {
    fn name(&self) -> &str {
        &self.reader.name
    }

    fn is_running(&self) -> bool {
        self.running
    }

    async fn start(&mut self) -> Result<()> {
        if self.running {
            return Ok(());
        }
        if !(self.bridge_url.starts_with("ws://") || self.bridge_url.starts_with("wss://")) {
            return Err(ChannelError::InvalidConfig(format!(
                "bridge URL must be a ws:// or wss:// URL, got '{}'",
                self.bridge_url
            )));
        }

        info!("Starting WhatsApp channel...");
        info!("Bridge URL: {}", self.bridge_url);

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        self.shutdown_tx = Some(shutdown_tx);

        let handle = tokio::spawn(Self::connection_loop(
            self.bridge_url.clone(),
            self.reader.clone(),
            self.ws_tx.clone(),
            shutdown_rx,
        ));

        self.task_handle = Some(handle);
        self.running = true;

        info!("WhatsApp channel started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }

        info!("Stopping WhatsApp channel...");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }

        if let Some(mut write) = self.ws_tx.write().await.take() {
            let _ = write.close().await;
        }
        *self.reader.connected.write().await = false;

        self.running = false;
        info!("WhatsApp channel stopped");

        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<()> {
        if !self.is_connected().await {
            return Err(ChannelError::NotRunning(
                "WhatsApp bridge not connected".to_string(),
            ));
        }

        let cmd = SendCommand::new(&msg.chat_id, &msg.content);
        let payload = serde_json::to_string(&cmd)
            .map_err(|e| ChannelError::SendError(format!("Failed to serialize message: {}", e)))?;

        let mut tx = self.ws_tx.write().await;
        match tx.as_mut() {
            Some(write) => write
                .send(WsMessage::Text(payload))
                .await
                .map_err(|e| ChannelError::SendError(format!("Failed to send: {}", e))),
            None => Err(ChannelError::NotRunning(
                "WebSocket not initialized".to_string(),
            )),
        }
    }

    fn set_inbound_sender(&mut self, tx: mpsc::Sender<InboundMessage>) {
        self.reader.inbound_tx = Some(tx);
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        sender_allowed(&self.reader.allow_from, sender_id)
    }
}

impl Default for WhatsAppHandler {
    fn default() -> Self {
        Self::new(WhatsAppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::time::{timeout, Duration};

    fn config(allow_from: Vec<&str>) -> WhatsAppConfig {
        WhatsAppConfig {
            enabled: true,
            bridge_url: "ws://127.0.0.1:9".to_string(),
            allow_from: allow_from.into_iter().map(String::from).collect(),
            ..WhatsAppConfig::default()
        }
    }

    fn handler_with_inbox(
        allow_from: Vec<&str>,
    ) -> (WhatsAppHandler, mpsc::Receiver<InboundMessage>) {
        let mut handler = WhatsAppHandler::new(config(allow_from));
        let (tx, rx) = mpsc::channel(4);
        handler.set_inbound_sender(tx);
        (handler, rx)
    }

    fn message(sender: &str, content: &str, from_me: bool) -> String {
        json!({
            "type": "message",
            "id": "m1",
            "sender": sender,
            "pn": "",
            "content": content,
            "timestamp": 1700000000,
            "isGroup": false,
            "fromMe": from_me
        })
        .to_string()
    }

    async fn assert_nothing(rx: &mut mpsc::Receiver<InboundMessage>) {
        let received = timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(received.is_err(), "message should have been dropped");
    }

    #[test]
    fn test_whatsapp_handler_new() {
        let handler = WhatsAppHandler::new(config(vec![]));
        assert_eq!(handler.name(), "whatsapp");
        assert!(!handler.is_running());
    }

    #[test]
    fn test_is_allowed() {
        let handler = WhatsAppHandler::new(config(vec!["255700000001"]));
        assert!(handler.is_allowed("255700000001"));
        assert!(!handler.is_allowed("255700000009"));
    }

    #[tokio::test]
    async fn test_message_metadata() {
        let (handler, mut rx) = handler_with_inbox(vec![]);

        handler
            .handle_bridge_message(&message("255700000001@s.whatsapp.net", "hello", false))
            .await;
        let msg = rx.recv().await.unwrap();

        assert_eq!(msg.channel, "whatsapp");
        assert_eq!(msg.sender_id, "255700000001");
        assert_eq!(msg.chat_id, "255700000001@s.whatsapp.net");
        assert_eq!(msg.content, "hello");
        assert_eq!(msg.metadata.get(META_MESSAGE_ID), Some(&json!("m1")));
        assert!(!msg.is_group());
        assert!(!msg.is_from_me());
    }

    #[tokio::test]
    async fn test_from_me_and_legacy_field_names() {
        let (handler, mut rx) = handler_with_inbox(vec![]);

        let raw = json!({
            "type": "message",
            "sender": "120363041234567890@g.us",
            "content": "hi all",
            "is_group": true,
            "from_me": true
        })
        .to_string();
        handler.handle_bridge_message(&raw).await;
        let msg = rx.recv().await.unwrap();

        assert!(msg.is_group());
        assert!(msg.is_from_me());
        assert!(msg.metadata.get(META_MESSAGE_ID).is_none());
    }

    #[tokio::test]
    async fn test_phone_number_preferred_for_sender() {
        let (handler, mut rx) = handler_with_inbox(vec!["255700000001"]);

        let raw = json!({
            "type": "message",
            "sender": "99887766@lid",
            "pn": "255700000001@s.whatsapp.net",
            "content": "hello"
        })
        .to_string();
        handler.handle_bridge_message(&raw).await;
        let msg = rx.recv().await.unwrap();

        assert_eq!(msg.sender_id, "255700000001");
        assert_eq!(msg.chat_id, "99887766@lid");
    }

    #[tokio::test]
    async fn test_status_broadcasts_are_dropped() {
        let (handler, mut rx) = handler_with_inbox(vec![]);
        handler
            .handle_bridge_message(&message("status@broadcast", "my story", false))
            .await;
        assert_nothing(&mut rx).await;
    }

    #[tokio::test]
    async fn test_allowlist_blocks_sender() {
        let (handler, mut rx) = handler_with_inbox(vec!["255700000001"]);
        handler
            .handle_bridge_message(&message("255700000009@s.whatsapp.net", "hi", false))
            .await;
        assert_nothing(&mut rx).await;
    }

    #[tokio::test]
    async fn test_own_account_bypasses_allowlist() {
        let (handler, mut rx) = handler_with_inbox(vec!["255700000001"]);
        handler
            .handle_bridge_message(&message("255700000009@s.whatsapp.net", "I'm here", true))
            .await;
        let msg = rx.recv().await.unwrap();
        assert!(msg.is_from_me());
    }

    #[tokio::test]
    async fn test_invalid_json_is_ignored() {
        let (handler, mut rx) = handler_with_inbox(vec![]);
        handler.handle_bridge_message("not json").await;
        handler.handle_bridge_message(r#"{"type":"unknown"}"#).await;
        assert_nothing(&mut rx).await;
    }

    #[tokio::test]
    async fn test_status_updates_connection_flag() {
        let handler = WhatsAppHandler::new(config(vec![]));
        handler
            .handle_bridge_message(r#"{"type":"status","status":"connected"}"#)
            .await;
        assert!(handler.is_connected().await);
        handler
            .handle_bridge_message(r#"{"type":"status","status":"disconnected"}"#)
            .await;
        assert!(!handler.is_connected().await);
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let handler = WhatsAppHandler::new(config(vec![]));
        let err = handler
            .send(OutboundMessage::new("whatsapp", "255700000001@s.whatsapp.net", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::NotRunning(_)));
    }

    #[tokio::test]
    async fn test_start_stop() {
        let mut handler = WhatsAppHandler::new(config(vec![]));

        handler.start().await.unwrap();
        assert!(handler.is_running());

        handler.stop().await.unwrap();
        assert!(!handler.is_running());
        assert!(!handler.is_connected().await);
    }

    #[tokio::test]
    async fn test_start_rejects_non_websocket_url() {
        let mut handler = WhatsAppHandler::new(WhatsAppConfig {
            bridge_url: "http://localhost:3001".to_string(),
            ..config(vec![])
        });
        let err = handler.start().await.unwrap_err();
        assert!(matches!(err, ChannelError::InvalidConfig(_)));
        assert!(!handler.is_running());
    }

    #[test]
    fn test_send_command_shape() {
        let cmd = SendCommand::new("255700000001@s.whatsapp.net", "hello");
        let value = serde_json::to_value(cmd).unwrap();
        assert_eq!(
            value,
            json!({"type": "send", "to": "255700000001@s.whatsapp.net", "text": "hello"})
        );
    }
}
