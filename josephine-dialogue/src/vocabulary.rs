//! Accepted reply tokens per step

use josephine_core::session::Step;
use std::collections::HashMap;

const AFFIRMATIVE: &[&str] = &["yes", "yep"];
const CONTINUE_OR_WAIT: &[&str] = &["yes", "yep", "wait"];
const TRACKS: &[&str] = &["business", "fun"];

/// Static mapping from step to the normalized replies it accepts
///
/// A step without an entry accepts any reply.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    accepted: HashMap<Step, &'static [&'static str]>,
}

impl Vocabulary {
    /// The vocabulary matching [`crate::Script::josephine`]
    ///
    /// Offer (15) takes yes/yep rather than "thanks": the Closing message
    /// that leads into it asks the correspondent to reply "yes".
    pub fn josephine() -> Self {
        let mut accepted: HashMap<Step, &'static [&'static str]> = HashMap::new();
        accepted.insert(Step::Welcome, CONTINUE_OR_WAIT);
        accepted.insert(Step::TrackChoice, TRACKS);
        for step in Step::ALL {
            if step.number() >= Step::NameOrigin.number()
                && step.number() <= Step::Offer.number()
                && step != Step::TrackChoice
            {
                accepted.insert(step, AFFIRMATIVE);
            }
        }
        Self { accepted }
    }

    /// Build a vocabulary from explicit entries
    pub fn from_entries(entries: impl IntoIterator<Item = (Step, &'static [&'static str])>) -> Self {
        Self {
            accepted: entries.into_iter().collect(),
        }
    }

    /// Tokens accepted at `step`, if the step restricts replies
    pub fn tokens(&self, step: Step) -> Option<&'static [&'static str]> {
        self.accepted
            .get(&step)
            .copied()
            .filter(|tokens| !tokens.is_empty())
    }

    /// Whether the already-normalized `reply` is accepted at `step`
    pub fn accepts(&self, step: Step, reply: &str) -> bool {
        match self.tokens(step) {
            Some(tokens) => tokens.contains(&reply),
            None => true,
        }
    }

    /// The token named in correction prompts for `step`
    pub fn first_token(&self, step: Step) -> Option<&'static str> {
        self.tokens(step).and_then(|tokens| tokens.first().copied())
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::josephine()
    }
}

/// Normalize a reply for matching: surrounding whitespace trimmed, lowercased
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
