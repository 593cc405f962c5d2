//! Session engine: the per-correspondent dialogue state machine
//!
//! For every inbound event the engine applies, in order: thread filtering,
//! operator takeover and resume, the override gate, the cooldown gate,
//! self-echo suppression, reply validation and finally script advancement.
//! Each stage may stop processing and return the messages to send.

use chrono::{DateTime, Duration, Utc};
use josephine_core::config::{Config, MAX_COOLDOWN_SECS};
use josephine_core::session::{Branch, CorrespondentId, Session, SessionStore, Step};
use josephine_core::utils::preview;
use josephine_core::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::script::{Outcome, Script};
use crate::vocabulary::{normalize, Vocabulary};

/// Sent when the operator takes a thread over (`{}` is the resume keyword)
pub const TAKEOVER_NOTICE: &str =
    "👋 I’ve paused Josephine to let you take over! Use '{}' to bring me back.";

/// Sent when the operator hands a thread back
pub const RESUME_NOTICE: &str = "▶️ Josephine is back online! How can I assist you now?";

/// Sent after too many unmatched replies in a row
pub const REORIENTATION: &str = "🤔 It seems we’re not quite aligned! I’m Josephine—let’s start fresh.\n\
Please reply with ‘yes’ to continue or ‘wait’ to reach Yopinto directly.";

fn takeover_notice(resume_keyword: &str) -> String {
    TAKEOVER_NOTICE.replace("{}", resume_keyword)
}

fn correction(token: &str) -> String {
    format!(
        "❌ I didn’t catch that! Please respond with ‘{}’ to proceed.",
        token
    )
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Who typed a text event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    /// The remote party
    Correspondent,
    /// The human operator, from the bot's own account
    Operator,
    /// A copy of one of the engine's own sends
    Automation,
}

/// Inbound event for one correspondent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Text {
        text: String,
        sender: Sender,
        /// The thread has more than two participants
        multi_party: bool,
    },
    /// The operator takes the thread over without typing in it
    OperatorInterrupt,
}

impl Event {
    /// Text typed by the correspondent in a one-to-one thread
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            sender: Sender::Correspondent,
            multi_party: false,
        }
    }

    /// Text typed by the operator in the correspondent's thread
    pub fn operator(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            sender: Sender::Operator,
            multi_party: false,
        }
    }

    /// Copy of a message the engine sent
    pub fn echo(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            sender: Sender::Automation,
            multi_party: false,
        }
    }
}

/// Engine tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Silence after a finished or deferred conversation
    pub cooldown: Duration,
    /// Unmatched replies in a row that trigger re-orientation
    pub max_invalid_replies: u32,
    /// Normalized text the operator sends to resume automation
    pub resume_keyword: String,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            cooldown: Duration::from_std(std::time::Duration::from_secs(
                config.dialogue.cooldown_secs.min(MAX_COOLDOWN_SECS),
            ))
            .unwrap_or(defaults.cooldown),
            max_invalid_replies: config.dialogue.max_invalid_replies.max(1),
            resume_keyword: normalize(&config.operator.resume_keyword),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::hours(2),
            max_invalid_replies: 3,
            resume_keyword: "resume".to_string(),
        }
    }
}

/// Drives every correspondent's dialogue
pub struct SessionEngine {
    script: Script,
    vocabulary: Vocabulary,
    settings: EngineSettings,
    store: SessionStore,
    clock: Arc<dyn Clock>,
}

impl SessionEngine {
    /// Create an engine running Josephine's script
    pub fn new(store: SessionStore, settings: EngineSettings) -> Result<Self> {
        Self::with_script(store, settings, Script::josephine(), Vocabulary::josephine())
    }

    /// Create an engine for a custom script
    ///
    /// Fails with [`Error::Script`] if the script is incomplete for the
    /// vocabulary.
    pub fn with_script(
        store: SessionStore,
        settings: EngineSettings,
        script: Script,
        vocabulary: Vocabulary,
    ) -> Result<Self> {
        script.validate(&vocabulary)?;
        Ok(Self {
            script,
            vocabulary,
            settings,
            store,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Process one event and return the messages to send, in order
    ///
    /// The correspondent's session is locked for the whole call and only
    /// written back when processing succeeds.
    pub async fn handle_event(&self, id: &CorrespondentId, event: Event) -> Result<Vec<String>> {
        if is_filtered(id, &event) {
            debug!("Ignoring event for {} (group or status)", id);
            return Ok(Vec::new());
        }

        let mut guard = self.store.lock(id).await;
        let mut working = guard.clone();
        let replies = self.transition(id, &mut working, event, self.clock.now())?;
        *guard = working;
        Ok(replies)
    }

    /// Apply one event to `session` at time `now`
    pub fn transition(
        &self,
        id: &CorrespondentId,
        session: &mut Session,
        event: Event,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        if is_filtered(id, &event) {
            return Ok(Vec::new());
        }

        let (text, sender) = match event {
            Event::OperatorInterrupt => return Ok(self.engage_override(id, session)),
            Event::Text { text, sender, .. } => (text, sender),
        };
        let reply = normalize(&text);

        if sender == Sender::Operator {
            return Ok(self.operator_text(id, session, &reply));
        }

        if session.operator_override_active {
            debug!("Automation paused for {}, waiting for operator to resume", id);
            return Ok(Vec::new());
        }

        if session.in_cooldown(now) {
            debug!("{} on cooldown, ignoring", id);
            return Ok(Vec::new());
        }
        if session.cooldown_until.is_some() {
            session.reset_cycle();
            info!("Cooldown expired for {}, starting a fresh cycle", id);
        }

        if sender == Sender::Automation {
            debug!("Skipping copy of our own message to {}", id);
            return Ok(Vec::new());
        }

        if session.awaiting_reply && !self.vocabulary.accepts(session.step, &reply) {
            return Ok(self.reject_reply(id, session));
        }

        self.advance(id, session, &reply, now)
    }

    fn engage_override(&self, id: &CorrespondentId, session: &mut Session) -> Vec<String> {
        if session.operator_override_active {
            debug!("Operator already handling {}", id);
            return Vec::new();
        }
        session.operator_override_active = true;
        info!("Paused automation for {} due to operator takeover", id);
        vec![takeover_notice(&self.settings.resume_keyword)]
    }

    fn operator_text(&self, id: &CorrespondentId, session: &mut Session, reply: &str) -> Vec<String> {
        let is_resume = reply == self.settings.resume_keyword;
        match (session.operator_override_active, is_resume) {
            (true, true) => {
                session.operator_override_active = false;
                info!("Resumed automation for {}", id);
                vec![RESUME_NOTICE.to_string()]
            }
            (true, false) => {
                debug!("Operator message to {} while paused", id);
                Vec::new()
            }
            (false, true) => {
                debug!("Resume for {} ignored, automation is not paused", id);
                Vec::new()
            }
            (false, false) => self.engage_override(id, session),
        }
    }

    fn reject_reply(&self, id: &CorrespondentId, session: &mut Session) -> Vec<String> {
        let token = self.vocabulary.first_token(session.step).unwrap_or("yes");
        session.invalid_reply_count += 1;
        session.awaiting_reply = true;

        if session.invalid_reply_count >= self.settings.max_invalid_replies {
            info!(
                "{} sent {} unmatched replies at step {}, re-orienting",
                id, session.invalid_reply_count, session.step
            );
            session.step = Step::ENTRY;
            session.branch = Branch::Unset;
            session.invalid_reply_count = 0;
            return vec![REORIENTATION.to_string()];
        }

        debug!(
            "Unmatched reply from {} at step {} ({}/{})",
            id, session.step, session.invalid_reply_count, self.settings.max_invalid_replies
        );
        vec![correction(token)]
    }

    fn advance(
        &self,
        id: &CorrespondentId,
        session: &mut Session,
        reply: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let Some(entry) = self.script.entry(session.step, session.branch, reply) else {
            error!(
                "No script entry for step {} on track {} (reply '{}')",
                session.step, session.branch, reply
            );
            return Err(Error::Script(format!(
                "no entry for step {} on track {}",
                session.step, session.branch
            )));
        };

        if let Some(selected) = entry.selects {
            if session.branch.is_set() {
                warn!(
                    "{} already on the {} track, keeping it over {}",
                    id, session.branch, selected
                );
            } else {
                session.branch = selected;
                info!("{} chose the {} track", id, selected);
            }
        }

        session.invalid_reply_count = 0;
        match entry.outcome {
            Outcome::Advance(next) => {
                session.step = next;
                session.awaiting_reply = true;
            }
            Outcome::Defer => {
                let until = self.cooldown_end(now);
                session.cooldown_until = Some(until);
                session.awaiting_reply = true;
                info!("{} asked to wait, silent until {}", id, until);
            }
            Outcome::Finish => {
                session.reset_cycle();
                session.cooldown_until = Some(self.cooldown_end(now));
                session.awaiting_reply = true;
                info!("Dialogue finished for {}, cooldown set", id);
            }
        }

        if let Some(first) = entry.messages.first() {
            debug!("{} -> step {}: {}", id, session.step, preview(first));
        }
        Ok(entry.messages.iter().map(|m| m.to_string()).collect())
    }

    /// End of a cooldown starting at `now`, saturating at the latest
    /// representable instant
    fn cooldown_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.settings.cooldown)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

fn is_filtered(id: &CorrespondentId, event: &Event) -> bool {
    !id.is_one_to_one() || matches!(event, Event::Text { multi_party: true, .. })
}
