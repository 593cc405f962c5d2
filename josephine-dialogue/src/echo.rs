//! Recognizing copies of our own sends

use josephine_core::session::CorrespondentId;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Sends remembered per correspondent
const CAPACITY: usize = 32;

/// Remembers recent automation sends so the bridge's copies of them are not
/// mistaken for operator takeovers
///
/// WhatsApp reports every message written from the bot's own account,
/// including the ones the bot itself sent. A text recorded here and later
/// seen from our own account is an echo; anything else from our own account
/// was typed by the operator.
#[derive(Debug, Default)]
pub struct EchoLedger {
    sent: Mutex<HashMap<CorrespondentId, VecDeque<String>>>,
}

impl EchoLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a text about to be sent to `id`
    pub fn record(&self, id: &CorrespondentId, text: &str) {
        let mut sent = self.sent.lock();
        let texts = sent.entry(id.clone()).or_default();
        if texts.len() == CAPACITY {
            texts.pop_front();
        }
        texts.push_back(text.trim().to_string());
    }

    /// Consume a matching record, returning whether `text` was one of ours
    pub fn take(&self, id: &CorrespondentId, text: &str) -> bool {
        let mut sent = self.sent.lock();
        let Some(texts) = sent.get_mut(id) else {
            return false;
        };
        let text = text.trim();
        match texts.iter().position(|t| t == text) {
            Some(index) => {
                texts.remove(index);
                if texts.is_empty() {
                    sent.remove(id);
                }
                true
            }
            None => false,
        }
    }

    /// Number of unmatched sends remembered for `id`
    #[cfg(test)]
    pub(crate) fn pending(&self, id: &CorrespondentId) -> usize {
        self.sent.lock().get(id).map_or(0, VecDeque::len)
    }
}
