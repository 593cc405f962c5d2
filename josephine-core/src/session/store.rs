//! Session data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::step::{Branch, Step};

/// Opaque identifier of the remote party in a conversation
///
/// For WhatsApp this is the chat JID, e.g. `255617513064@s.whatsapp.net`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrespondentId(String);

impl CorrespondentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Portion before the `@server` suffix
    pub fn user_part(&self) -> &str {
        self.0.split('@').next().unwrap_or(&self.0)
    }

    /// Whether this id denotes a one-to-one chat
    ///
    /// Status broadcasts, broadcast lists and group chats are not.
    pub fn is_one_to_one(&self) -> bool {
        let id = self.0.trim();
        !id.is_empty() && !id.ends_with("@broadcast") && !id.contains("@g.us")
    }
}

impl fmt::Display for CorrespondentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrespondentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CorrespondentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Dialogue state for one correspondent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Current position in the dialogue graph
    pub step: Step,
    /// Track chosen at [`Step::TrackChoice`], fixed until the cycle resets
    pub branch: Branch,
    /// Consecutive replies that matched nothing the step accepts
    pub invalid_reply_count: u32,
    /// A human operator has taken the thread over
    pub operator_override_active: bool,
    /// Inbound events are ignored until this instant
    pub cooldown_until: Option<DateTime<Utc>>,
    /// The last send was a prompt expecting a specific reply
    pub awaiting_reply: bool,
}

impl Session {
    /// Create a fresh session
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the cooldown window is still open at `now`
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        matches!(self.cooldown_until, Some(until) if now < until)
    }

    /// Return to the start of a dialogue cycle
    ///
    /// Leaves the operator override untouched.
    pub fn reset_cycle(&mut self) {
        self.step = Step::START;
        self.branch = Branch::Unset;
        self.invalid_reply_count = 0;
        self.cooldown_until = None;
        self.awaiting_reply = false;
    }
}
