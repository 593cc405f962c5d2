//! Dialogue positions and content tracks

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in the dialogue graph
///
/// The discriminant is the step number. A step names the script entry that
/// runs when a reply arrives while the session sits on it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Step {
    /// Not started, or freshly reset
    #[default]
    Greeting = 0,
    /// Asked whether to continue with the bot or wait for Yopinto
    Welcome = 1,
    NameOrigin = 2,
    Pitch = 3,
    /// Asked to pick the business or fun track
    TrackChoice = 4,
    Showcase = 5,
    Results = 6,
    Value = 7,
    Pricing = 8,
    FirstStory = 9,
    SecondStory = 10,
    Approach = 11,
    Vision = 12,
    Retention = 13,
    Closing = 14,
    Offer = 15,
    /// Last step; any reply ends the cycle
    Farewell = 16,
}

impl Step {
    /// Every step in dialogue order
    pub const ALL: [Step; 17] = [
        Step::Greeting,
        Step::Welcome,
        Step::NameOrigin,
        Step::Pitch,
        Step::TrackChoice,
        Step::Showcase,
        Step::Results,
        Step::Value,
        Step::Pricing,
        Step::FirstStory,
        Step::SecondStory,
        Step::Approach,
        Step::Vision,
        Step::Retention,
        Step::Closing,
        Step::Offer,
        Step::Farewell,
    ];

    /// Where a fresh or reset cycle starts
    pub const START: Step = Step::Greeting;

    /// Where a confused correspondent is sent back to
    pub const ENTRY: Step = Step::Welcome;

    /// The step number
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Look a step up by number
    pub fn from_number(n: u8) -> Option<Step> {
        Self::ALL.get(usize::from(n)).copied()
    }

    /// The step after this one in dialogue order
    pub fn successor(self) -> Option<Step> {
        Self::from_number(self.number() + 1)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.number(), self)
    }
}

/// Content track chosen once per dialogue cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    #[default]
    Unset,
    Business,
    Fun,
}

impl Branch {
    pub fn is_set(self) -> bool {
        self != Branch::Unset
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Branch::Unset => "unset",
            Branch::Business => "business",
            Branch::Fun => "fun",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_match_order() {
        for (i, step) in Step::ALL.iter().enumerate() {
            assert_eq!(usize::from(step.number()), i);
            assert_eq!(Step::from_number(step.number()), Some(*step));
        }
        assert_eq!(Step::from_number(17), None);
    }

    #[test]
    fn test_successor() {
        assert_eq!(Step::Greeting.successor(), Some(Step::Welcome));
        assert_eq!(Step::Offer.successor(), Some(Step::Farewell));
        assert_eq!(Step::Farewell.successor(), None);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Step::default(), Step::Greeting);
        assert_eq!(Branch::default(), Branch::Unset);
        assert!(!Branch::Unset.is_set());
        assert!(Branch::Fun.is_set());
    }

    #[test]
    fn test_display() {
        assert_eq!(Step::TrackChoice.to_string(), "4 (TrackChoice)");
        assert_eq!(Branch::Business.to_string(), "business");
    }
}
