//! In-process queues between channels and the dialogue loop

use super::events::{InboundMessage, OutboundMessage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify, RwLock};
use tracing::{debug, warn};

type OutboundCallback =
    Arc<dyn Fn(OutboundMessage) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Receiving end that exactly one consumer may claim
type Slot<T> = Arc<Mutex<Option<mpsc::UnboundedReceiver<T>>>>;

/// Async message bus that decouples chat channels from the dialogue loop
///
/// Channels push messages to the inbound queue; the dialogue loop answers on
/// the outbound queue, which [`MessageBus::dispatch_outbound_loop`] delivers
/// to the callbacks subscribed for the message's channel.
#[derive(Clone)]
pub struct MessageBus {
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
    inbound_rx: Slot<InboundMessage>,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    outbound_rx: Slot<OutboundMessage>,
    subscribers: Arc<RwLock<HashMap<String, Vec<OutboundCallback>>>>,
    dispatching: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl MessageBus {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Self {
            inbound_tx,
            inbound_rx: Arc::new(Mutex::new(Some(inbound_rx))),
            outbound_tx,
            outbound_rx: Arc::new(Mutex::new(Some(outbound_rx))),
            subscribers: Arc::default(),
            dispatching: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Claim the inbound receiver; `None` once claimed
    pub async fn take_inbound_receiver(&self) -> Option<mpsc::UnboundedReceiver<InboundMessage>> {
        self.inbound_rx.lock().take()
    }

    /// Claim the outbound receiver; `None` once claimed
    pub async fn take_outbound_receiver(&self) -> Option<mpsc::UnboundedReceiver<OutboundMessage>> {
        self.outbound_rx.lock().take()
    }

    /// Queue a message received by a channel
    pub fn publish_inbound(&self, msg: InboundMessage) -> crate::Result<()> {
        self.inbound_tx
            .send(msg)
            .map_err(|_| crate::Error::Channel("inbound queue closed".to_string()))
    }

    /// Queue a reply for delivery
    pub fn publish_outbound(&self, msg: OutboundMessage) -> crate::Result<()> {
        self.outbound_tx
            .send(msg)
            .map_err(|_| crate::Error::Channel("outbound queue closed".to_string()))
    }

    /// Register `callback` for replies addressed to `channel`
    pub async fn subscribe_outbound<F, Fut>(&self, channel: impl Into<String>, callback: F)
    where
        F: Fn(OutboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: OutboundCallback = Arc::new(move |msg| Box::pin(callback(msg)));
        self.subscribers
            .write()
            .await
            .entry(channel.into())
            .or_default()
            .push(boxed);
    }

    /// Deliver queued replies until [`stop`](Self::stop) is called
    ///
    /// Callbacks are awaited one after the other, so messages for a chat
    /// leave in the order they were published.
    pub async fn dispatch_outbound_loop(&self) {
        let Some(mut outbound_rx) = self.take_outbound_receiver().await else {
            debug!("Outbound receiver already taken");
            return;
        };

        self.dispatching.store(true, Ordering::SeqCst);
        loop {
            tokio::select! {
                next = outbound_rx.recv() => match next {
                    Some(msg) => self.deliver(msg).await,
                    None => break,
                },
                _ = self.shutdown.notified() => break,
            }
        }
        self.dispatching.store(false, Ordering::SeqCst);
        debug!("Outbound dispatcher stopped");
    }

    async fn deliver(&self, msg: OutboundMessage) {
        let callbacks = self.subscribers.read().await.get(&msg.channel).cloned();
        let Some(callbacks) = callbacks else {
            warn!(channel = %msg.channel, "No subscribers for outbound message");
            return;
        };
        for callback in callbacks {
            callback(msg.clone()).await;
        }
    }

    /// Stop the dispatcher loop
    pub fn stop(&self) {
        // notify_one stores a permit if the dispatcher is mid-delivery.
        self.shutdown.notify_one();
    }

    /// Whether a dispatcher loop is active
    pub fn is_running(&self) -> bool {
        self.dispatching.load(Ordering::SeqCst)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
