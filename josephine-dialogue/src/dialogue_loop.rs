//! Dialogue loop: the bridge between the message bus and the engine

use josephine_core::bus::{InboundMessage, MessageBus, OutboundMessage};
use josephine_core::session::CorrespondentId;
use josephine_core::utils::preview;
use josephine_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};

use crate::echo::EchoLedger;
use crate::engine::{Event, Sender, SessionEngine};

/// One classified inbound event, with where to send the answers
#[derive(Debug)]
struct Job {
    event: Event,
    channel: String,
    chat_id: String,
}

/// Reports from workers that have sat idle: who, and how many jobs they
/// have finished
type IdleReport = (CorrespondentId, u64);

/// How long a worker waits for work before offering to retire
const WORKER_IDLE: Duration = Duration::from_secs(10 * 60);

struct Worker {
    tx: mpsc::UnboundedSender<Job>,
    dispatched: u64,
}

/// Reads inbound messages, runs them through the engine and publishes the
/// replies
///
/// Every correspondent gets a worker task that handles its events one at a
/// time, so replies to one correspondent keep their order while different
/// correspondents proceed independently. A worker idle for longer than the
/// idle timeout is retired once everything handed to it has been handled;
/// the correspondent's next message starts a fresh one. Sessions stay in the
/// store either way.
pub struct DialogueLoop {
    bus: MessageBus,
    engine: Arc<SessionEngine>,
    echoes: Arc<EchoLedger>,
    operator_id: Option<String>,
    workers: HashMap<CorrespondentId, Worker>,
    idle_timeout: Duration,
    idle_tx: mpsc::UnboundedSender<IdleReport>,
    idle_rx: Option<mpsc::UnboundedReceiver<IdleReport>>,
    shutdown: Arc<Notify>,
}

impl DialogueLoop {
    pub fn new(bus: MessageBus, engine: Arc<SessionEngine>) -> Self {
        let (idle_tx, idle_rx) = mpsc::unbounded_channel();
        Self {
            bus,
            engine,
            echoes: Arc::new(EchoLedger::new()),
            operator_id: None,
            workers: HashMap::new(),
            idle_timeout: WORKER_IDLE,
            idle_tx,
            idle_rx: Some(idle_rx),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Treat messages authored by this account as the operator's
    ///
    /// Accepts a bare number or a full JID.
    pub fn with_operator(mut self, operator_id: Option<String>) -> Self {
        self.operator_id = operator_id
            .map(|id| CorrespondentId::new(id).user_part().trim().to_string())
            .filter(|id| !id.is_empty());
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Number of live correspondent workers
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn engine(&self) -> &Arc<SessionEngine> {
        &self.engine
    }

    /// Handle used to stop [`DialogueLoop::run`]
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Translate a bus message into an engine event
    ///
    /// Returns `None` for messages with nothing to act on. Own-account texts
    /// matching a recent automation send are consumed from the echo ledger.
    pub fn classify(&self, msg: &InboundMessage) -> Option<(CorrespondentId, Event)> {
        let id = CorrespondentId::new(msg.chat_id.trim());

        if msg.is_operator_interrupt() {
            return Some((id, Event::OperatorInterrupt));
        }
        if msg.content.trim().is_empty() {
            return None;
        }

        let sender = if self.is_own_account(msg) {
            if self.echoes.take(&id, &msg.content) {
                Sender::Automation
            } else {
                Sender::Operator
            }
        } else {
            Sender::Correspondent
        };

        Some((
            id,
            Event::Text {
                text: msg.content.clone(),
                sender,
                multi_party: msg.is_group(),
            },
        ))
    }

    fn is_own_account(&self, msg: &InboundMessage) -> bool {
        if msg.is_from_me() {
            return true;
        }
        match &self.operator_id {
            Some(operator) => CorrespondentId::new(msg.sender_id.as_str()).user_part() == operator,
            None => false,
        }
    }

    /// Run until the bus closes or the shutdown handle is notified
    pub async fn run(&mut self) -> Result<()> {
        info!("Dialogue loop started");

        let Some(mut inbound_rx) = self.bus.take_inbound_receiver().await else {
            error!("Failed to take inbound receiver");
            return Err(Error::Internal("Inbound receiver already taken".to_string()));
        };
        let Some(mut idle_rx) = self.idle_rx.take() else {
            return Err(Error::Internal("Dialogue loop is already running".to_string()));
        };
        let shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                maybe_msg = inbound_rx.recv() => {
                    let Some(msg) = maybe_msg else {
                        info!("Message bus closed, stopping dialogue loop");
                        break;
                    };
                    self.dispatch(msg);
                }
                Some((id, finished)) = idle_rx.recv() => self.retire(&id, finished),
                _ = shutdown.notified() => break,
            }
        }

        self.workers.clear();
        self.idle_rx = Some(idle_rx);
        info!("Dialogue loop stopped");
        Ok(())
    }

    fn dispatch(&mut self, msg: InboundMessage) {
        debug!(
            "Received message from {}:{}: {}",
            msg.channel,
            msg.chat_id,
            preview(&msg.content)
        );
        let Some((id, event)) = self.classify(&msg) else {
            debug!("Nothing to handle in message from {}", msg.chat_id);
            return;
        };

        let mut job = Job {
            event,
            channel: msg.channel,
            chat_id: msg.chat_id,
        };
        if let Some(worker) = self.workers.get_mut(&id) {
            match worker.tx.send(job) {
                Ok(()) => {
                    worker.dispatched += 1;
                    return;
                }
                Err(mpsc::error::SendError(returned)) => {
                    warn!("Worker for {} exited, starting a new one", id);
                    job = returned;
                }
            }
        }

        let tx = self.spawn_worker(id.clone());
        if tx.send(job).is_err() {
            error!("Failed to hand message for {} to its worker", id);
            return;
        }
        self.workers.insert(id, Worker { tx, dispatched: 1 });
    }

    /// Drop an idle worker if it has finished every job handed to it
    ///
    /// Dropping the sender ends the worker's receive loop. A report that
    /// lags behind a newer dispatch is ignored.
    fn retire(&mut self, id: &CorrespondentId, finished: u64) {
        let drained = self
            .workers
            .get(id)
            .is_some_and(|worker| worker.dispatched == finished);
        if drained {
            self.workers.remove(id);
            debug!("Retired idle worker for {}", id);
        }
    }

    fn spawn_worker(&self, id: CorrespondentId) -> mpsc::UnboundedSender<Job> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let engine = self.engine.clone();
        let echoes = self.echoes.clone();
        let bus = self.bus.clone();
        let idle_tx = self.idle_tx.clone();
        let idle_timeout = self.idle_timeout;

        tokio::spawn(async move {
            debug!("Worker for {} started", id);
            let mut finished: u64 = 0;
            loop {
                let job = match tokio::time::timeout(idle_timeout, rx.recv()).await {
                    Ok(Some(job)) => job,
                    Ok(None) => break,
                    Err(_) => {
                        let _ = idle_tx.send((id.clone(), finished));
                        continue;
                    }
                };

                match engine.handle_event(&id, job.event).await {
                    Ok(replies) => {
                        for text in replies {
                            echoes.record(&id, &text);
                            let outbound = OutboundMessage::new(&job.channel, &job.chat_id, text);
                            if let Err(e) = bus.publish_outbound(outbound) {
                                error!("Failed to publish reply to {}: {}", id, e);
                            }
                        }
                    }
                    Err(e) => error!("Error processing message for {}: {}", id, e),
                }
                finished += 1;
            }
            debug!("Worker for {} stopped", id);
        });

        tx
    }
}
