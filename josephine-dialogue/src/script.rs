//! The dialogue script: what Josephine says at each step
//!
//! The script is a typed transition table. Every step maps to [`Content`]
//! that either always sends the same entry, picks an entry by the session's
//! [`Branch`], or picks one by the reply that was accepted. An entry holds
//! the messages to send, in order, and the [`Outcome`] that moves the
//! session on.

use josephine_core::session::{Branch, Step};
use josephine_core::{Error, Result};
use std::collections::{HashMap, HashSet};

use crate::vocabulary::Vocabulary;

/// What happens to the session after an entry's messages are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Move to the given step and wait for a reply there
    Advance(Step),
    /// Stay on the step and start the cooldown
    Defer,
    /// End the cycle: reset and start the cooldown
    Finish,
}

/// Messages sent for one transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    pub messages: &'static [&'static str],
    pub outcome: Outcome,
    /// Track fixed by taking this entry
    pub selects: Option<Branch>,
}

impl ScriptEntry {
    fn new(messages: &'static [&'static str], outcome: Outcome) -> Self {
        Self {
            messages,
            outcome,
            selects: None,
        }
    }

    fn advance(message: &'static [&'static str], next: Step) -> Self {
        Self::new(message, Outcome::Advance(next))
    }

    fn selecting(mut self, branch: Branch) -> Self {
        self.selects = Some(branch);
        self
    }
}

/// An entry taken when the accepted reply is one of `replies`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub replies: &'static [&'static str],
    pub entry: ScriptEntry,
}

/// How a step chooses its entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Fixed(ScriptEntry),
    ByBranch {
        business: ScriptEntry,
        fun: ScriptEntry,
    },
    ByReply(Vec<Choice>),
}

impl Content {
    fn entries(&self) -> Vec<&ScriptEntry> {
        match self {
            Content::Fixed(entry) => vec![entry],
            Content::ByBranch { business, fun } => vec![business, fun],
            Content::ByReply(choices) => choices.iter().map(|c| &c.entry).collect(),
        }
    }
}

/// Static, read-only dialogue table
#[derive(Debug, Clone)]
pub struct Script {
    steps: HashMap<Step, Content>,
}

impl Script {
    /// Build a script from explicit step contents
    pub fn from_steps(steps: impl IntoIterator<Item = (Step, Content)>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }

    /// Content registered for `step`
    pub fn content(&self, step: Step) -> Option<&Content> {
        self.steps.get(&step)
    }

    /// Steps with content, in dialogue order
    pub fn steps(&self) -> Vec<(Step, &Content)> {
        let mut steps: Vec<(Step, &Content)> =
            self.steps.iter().map(|(step, content)| (*step, content)).collect();
        steps.sort_by_key(|(step, _)| *step);
        steps
    }

    /// Resolve the entry for `step` given the session branch and the
    /// normalized reply that was accepted
    pub fn entry(&self, step: Step, branch: Branch, reply: &str) -> Option<&ScriptEntry> {
        match self.content(step)? {
            Content::Fixed(entry) => Some(entry),
            Content::ByBranch { business, fun } => match branch {
                Branch::Business => Some(business),
                Branch::Fun => Some(fun),
                Branch::Unset => None,
            },
            Content::ByReply(choices) => choices
                .iter()
                .find(|choice| choice.replies.contains(&reply))
                .map(|choice| &choice.entry),
        }
    }

    /// Completeness check run before the engine accepts traffic
    ///
    /// Walks every step reachable from [`Step::START`] and [`Step::ENTRY`]
    /// and fails if a lookup the engine could perform would come back empty.
    pub fn validate(&self, vocabulary: &Vocabulary) -> Result<()> {
        let mut errors = Vec::new();

        // (step, branch chosen) states reachable by the engine's transitions.
        let mut seen: HashSet<(Step, bool)> = HashSet::new();
        let mut pending = vec![(Step::START, false), (Step::ENTRY, false)];
        let mut finishes = false;

        while let Some((step, branch_set)) = pending.pop() {
            if !seen.insert((step, branch_set)) {
                continue;
            }

            let Some(content) = self.content(step) else {
                errors.push(format!("step {} is reachable but has no content", step));
                continue;
            };

            match content {
                Content::ByBranch { .. } if !branch_set => {
                    errors.push(format!(
                        "step {} depends on the track but is reachable before one is chosen",
                        step
                    ));
                }
                Content::ByReply(choices) => match vocabulary.tokens(step) {
                    None => errors.push(format!(
                        "step {} branches on the reply but accepts any reply",
                        step
                    )),
                    Some(tokens) => {
                        for token in tokens {
                            if !choices.iter().any(|c| c.replies.contains(token)) {
                                errors.push(format!(
                                    "step {} accepts '{}' but has no entry for it",
                                    step, token
                                ));
                            }
                        }
                    }
                },
                _ => {}
            }

            for entry in content.entries() {
                if entry.messages.is_empty() || entry.messages.iter().any(|m| m.trim().is_empty())
                {
                    errors.push(format!("step {} has an entry with an empty message", step));
                }
                let branch_set = branch_set || entry.selects.is_some();
                match entry.outcome {
                    Outcome::Advance(next) => pending.push((next, branch_set)),
                    Outcome::Finish => finishes = true,
                    Outcome::Defer => {}
                }
            }
        }

        if !finishes {
            errors.push("no reachable entry finishes the dialogue".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            errors.sort();
            errors.dedup();
            Err(Error::Script(errors.join("; ")))
        }
    }

    /// Josephine's dialogue
    pub fn josephine() -> Self {
        use Step::*;

        let mut steps = vec![
            (
                Greeting,
                Content::Fixed(ScriptEntry::advance(&[GREETING, GREETING_PROMPT], Welcome)),
            ),
            (
                Welcome,
                Content::ByReply(vec![
                    Choice {
                        replies: &["yes", "yep"],
                        entry: ScriptEntry::advance(&[WELCOME_CONTINUE], NameOrigin),
                    },
                    Choice {
                        replies: &["wait"],
                        entry: ScriptEntry::new(&[WELCOME_WAIT], Outcome::Defer),
                    },
                ]),
            ),
            (
                NameOrigin,
                Content::Fixed(ScriptEntry::advance(&[NAME_ORIGIN], Pitch)),
            ),
            (Pitch, Content::Fixed(ScriptEntry::advance(&[PITCH], TrackChoice))),
            (
                TrackChoice,
                Content::ByReply(vec![
                    Choice {
                        replies: &["business"],
                        entry: ScriptEntry::advance(&[TRACK_BUSINESS], Showcase)
                            .selecting(Branch::Business),
                    },
                    Choice {
                        replies: &["fun"],
                        entry: ScriptEntry::advance(&[TRACK_FUN], Showcase).selecting(Branch::Fun),
                    },
                ]),
            ),
            (
                Farewell,
                Content::Fixed(ScriptEntry::new(&[FAREWELL], Outcome::Finish)),
            ),
        ];

        for &(step, business, fun) in TRACK_STEPS {
            let Some(next) = step.successor() else {
                continue;
            };
            steps.push((
                step,
                Content::ByBranch {
                    business: ScriptEntry::advance(business, next),
                    fun: ScriptEntry::advance(fun, next),
                },
            ));
        }

        Self::from_steps(steps)
    }
}

impl Default for Script {
    fn default() -> Self {
        Self::josephine()
    }
}

const GREETING: &str = "👋 Greetings! I’m Josephine, your dedicated assistant, crafted by the exceptional Yopinto.\n\n\
Yopinto is a visionary expert in:\n\
🌐 Crafting elegant, high-performing websites that captivate.\n\
📱 Developing innovative apps tailored to your needs.\n\
📈 Designing strategic business solutions for growth.\n\
📣 Creating impactful advertising campaigns that shine.\n\
💻 Offering insightful computing advice to solve challenges.\n\n\
I’m here to assist you with his top-tier services. How may I support you today?";

const GREETING_PROMPT: &str = "🤝 Would you like to explore my capabilities, or connect with Yopinto personally?\n\
Please reply with ‘yes’ to continue with me, or ‘wait’ to reach Yopinto.";

const WELCOME_CONTINUE: &str = "🎉 Excellent choice! I’m excited to assist you.\n\
Are you curious about the inspiration behind my name, Josephine?\n\
Please reply with ‘yes’ to find out!";

const WELCOME_WAIT: &str = "✅ No problem! I’m notifying Yopinto to bring his expertise your way.\n\
He’ll reach out soon—feel free to check back in 2 hours if needed!";

const NAME_ORIGIN: &str = "🙌 Thank you for your interest! My name’s origin is a mystery—perhaps a tribute to someone special to Yopinto.\n\
Would you like to learn how a custom bot like me can enhance your WhatsApp experience?\n\
Please reply with ‘yes’ to explore more!";

const PITCH: &str = "🌟 Wonderful! I’m built to elevate your communication.\n\
Are you looking for a bot for business efficiency or personal enjoyment?\n\
Please reply with ‘business’ or ‘fun’ to choose.";

const TRACK_BUSINESS: &str = "📊 A strategic choice! Businesses flourish with automation like me.\n\
I optimize client interactions, save time, and boost revenue.\n\
Want to know how? Please reply with ‘yes’!";

const TRACK_FUN: &str = "😊 A delightful pick! I bring joy and engagement to your chats.\n\
Curious why I’m so entertaining? Please reply with ‘yes’!";

const FAREWELL: &str = "🙏 Thank you for your time! I’m Josephine, and it’s been a pleasure.\n\
Reach out again in 2 hours for more support! 🌟";

/// Track-dependent steps: (step, business copy, fun copy). Each advances to
/// the step after it.
const TRACK_STEPS: &[(Step, &[&str], &[&str])] = &[
    (
        Step::Showcase,
        &["🚀 Here’s how I empower businesses:\n\
• Instant client responses.\n\
• Enhanced satisfaction and loyalty.\n\
• 24/7 availability.\n\
Interested in the benefits? Reply with ‘yes’!"],
        &["🎈 Here’s what makes me fun:\n\
• Engaging chats that spark joy.\n\
• Unique flair for lively talks.\n\
• A companion for great moments.\n\
Want more perks? Reply with ‘yes’!"],
    ),
    (
        Step::Results,
        &["📈 The results speak for themselves:\n\
• Attract more clients effortlessly.\n\
• Project professionalism with ease.\n\
• Increase revenue seamlessly.\n\
More benefits? Reply with ‘yes’!"],
        &["✨ The perks are exciting:\n\
• Daily engaging conversations.\n\
• Stand out with charm.\n\
• Create a buzz in your chats.\n\
More details? Reply with ‘yes’!"],
    ),
    (
        Step::Value,
        &["💼 Here’s the value:\n\
• Cost-effective over staff.\n\
• Quick setup, instant results.\n\
• Outshines traditional ads.\n\
Curious about pricing? Reply with ‘yes’!"],
        &["🎉 Why it’s a win:\n\
• Affordable chat enhancement.\n\
• Unique presence in your circle.\n\
• Engaging at your fingertips.\n\
Want the cost? Reply with ‘yes’!"],
    ),
    (
        Step::Pricing,
        &["💰 Just 20,000 TSH for a business bot!\n\
A smart investment for growth.\n\
Want success stories? Reply with ‘yes’!"],
        &["💸 Only 5,000 TSH for a fun bot!\n\
A small price to shine in chats.\n\
Hear success tales? Reply with ‘yes’!"],
    ),
    (
        Step::FirstStory,
        &["🏆 A retailer doubled orders in a week with me!\n\
Clients loved the prompt service.\n\
Another example? Reply with ‘yes’!"],
        &["🌟 A user became the chat star with me!\n\
Friends loved the daily fun.\n\
More stories? Reply with ‘yes’!"],
    ),
    (
        Step::SecondStory,
        &["☕ A café saved hours daily with my order management!\n\
Sales soared with happy customers.\n\
How it works? Reply with ‘yes’!"],
        &["💖 A user connected meaningfully with my charm!\n\
Chats led to great outcomes.\n\
The approach? Reply with ‘yes’!"],
    ),
    (
        Step::Approach,
        &["🛠️ It’s simple:\n\
• Always on for clients.\n\
• Build trust effortlessly.\n\
• Drive profits automatically.\n\
More insights? Reply with ‘yes’!"],
        &["😄 It’s easy:\n\
• Fresh, engaging chats.\n\
• Boost your presence.\n\
• Rewarding interactions.\n\
More benefits? Reply with ‘yes’!"],
    ),
    (
        Step::Vision,
        &["🌍 Imagine: Competitors lag while you thrive.\n\
I handle it all with precision.\n\
A unique edge? Reply with ‘yes’!"],
        &["👑 Picture: Your chats outshine others.\n\
I make you the focal point.\n\
A special twist? Reply with ‘yes’!"],
    ),
    (
        Step::Retention,
        &["📢 One business retained clients with my flair!\n\
Sales grew with deeper engagement.\n\
Ready to start? Reply with ‘yes’!"],
        &["💬 One user built lasting ties with my wit!\n\
Chats became rewarding.\n\
Ready to go? Reply with ‘yes’!"],
    ),
    (
        Step::Closing,
        &["🏁 Final advantage:\n\
• Stand out effortlessly.\n\
• Grow with proven results.\n\
• Simplify with confidence.\n\
Join now? Reply with ‘yes’!"],
        &["🎯 Closing benefit:\n\
• Elevate your presence.\n\
• Delight contacts consistently.\n\
• Enjoy exceptional chats.\n\
Begin now? Reply with ‘yes’!"],
    ),
    (
        Step::Offer,
        &["🎉 Fantastic! Visit https://yopinto241.github.io/yopinto.github.io/\n\
Secure your business bot for 20,000 TSH!\n\
Say ‘thanks’ to wrap up!"],
        &["🌟 Excellent! Visit https://yopinto241.github.io/yopinto.github.io/\n\
Get your fun bot for 5,000 TSH!\n\
Say ‘thanks’ to finish!"],
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_josephine_script_is_complete() {
        let script = Script::josephine();
        script.validate(&Vocabulary::josephine()).unwrap();
        assert_eq!(script.steps().len(), Step::ALL.len());
    }

    #[test]
    fn test_greeting_is_a_pair() {
        let script = Script::josephine();
        let entry = script.entry(Step::Greeting, Branch::Unset, "hi").unwrap();
        assert_eq!(entry.messages.len(), 2);
        assert!(entry.messages[0].starts_with("👋 Greetings! I’m Josephine"));
        assert!(entry.messages[1].contains("‘wait’ to reach Yopinto"));
        assert_eq!(entry.outcome, Outcome::Advance(Step::Welcome));
    }

    #[test]
    fn test_welcome_branches_on_reply() {
        let script = Script::josephine();
        let go_on = script.entry(Step::Welcome, Branch::Unset, "yep").unwrap();
        assert_eq!(go_on.outcome, Outcome::Advance(Step::NameOrigin));

        let wait = script.entry(Step::Welcome, Branch::Unset, "wait").unwrap();
        assert_eq!(wait.outcome, Outcome::Defer);
        assert!(wait.messages[0].contains("notifying Yopinto"));
    }

    #[test]
    fn test_track_choice_selects_branch() {
        let script = Script::josephine();
        let business = script.entry(Step::TrackChoice, Branch::Unset, "business").unwrap();
        assert_eq!(business.selects, Some(Branch::Business));
        assert_eq!(business.outcome, Outcome::Advance(Step::Showcase));

        let fun = script.entry(Step::TrackChoice, Branch::Unset, "fun").unwrap();
        assert_eq!(fun.selects, Some(Branch::Fun));
    }

    #[test]
    fn test_track_steps_need_a_branch() {
        let script = Script::josephine();
        assert!(script.entry(Step::Pricing, Branch::Unset, "yes").is_none());

        let business = script.entry(Step::Pricing, Branch::Business, "yes").unwrap();
        assert!(business.messages[0].contains("20,000 TSH"));
        let fun = script.entry(Step::Pricing, Branch::Fun, "yes").unwrap();
        assert!(fun.messages[0].contains("5,000 TSH"));
    }

    #[test]
    fn test_track_steps_advance_in_order() {
        let script = Script::josephine();
        for (step, _, _) in TRACK_STEPS {
            let entry = script.entry(*step, Branch::Fun, "yes").unwrap();
            assert_eq!(entry.outcome, Outcome::Advance(step.successor().unwrap()));
        }
    }

    #[test]
    fn test_farewell_finishes() {
        let script = Script::josephine();
        let entry = script.entry(Step::Farewell, Branch::Business, "thanks").unwrap();
        assert_eq!(entry.outcome, Outcome::Finish);
        assert!(entry.messages[0].starts_with("🙏 Thank you for your time!"));
    }

    #[test]
    fn test_validate_reports_missing_step() {
        let mut script = Script::josephine();
        script.steps.remove(&Step::Value);

        let err = script.validate(&Vocabulary::josephine()).unwrap_err();
        assert!(matches!(err, Error::Script(_)));
        assert!(err.to_string().contains("step 7 (Value) is reachable but has no content"));
    }

    #[test]
    fn test_validate_reports_uncovered_token() {
        const WELCOME: &[&str] = &["yes", "yep", "wait"];
        const TRACKS_AND_MORE: &[&str] = &["business", "fun", "both"];

        let script = Script::josephine();
        let vocabulary = Vocabulary::from_entries([
            (Step::Welcome, WELCOME),
            (Step::TrackChoice, TRACKS_AND_MORE),
        ]);

        let err = script.validate(&vocabulary).unwrap_err().to_string();
        assert!(err.contains("accepts 'both' but has no entry"));
    }

    #[test]
    fn test_validate_reports_branch_before_choice() {
        let script = Script::from_steps([
            (
                Step::Greeting,
                Content::Fixed(ScriptEntry::advance(&["hello"], Step::Welcome)),
            ),
            (
                Step::Welcome,
                Content::ByBranch {
                    business: ScriptEntry::new(&["b"], Outcome::Finish),
                    fun: ScriptEntry::new(&["f"], Outcome::Finish),
                },
            ),
        ]);

        let err = script.validate(&Vocabulary::josephine()).unwrap_err().to_string();
        assert!(err.contains("reachable before one is chosen"));
    }

    #[test]
    fn test_validate_requires_a_finish() {
        let script = Script::from_steps([
            (
                Step::Greeting,
                Content::Fixed(ScriptEntry::advance(&["hello"], Step::Welcome)),
            ),
            (
                Step::Welcome,
                Content::Fixed(ScriptEntry::advance(&["again"], Step::Greeting)),
            ),
        ]);

        let err = script.validate(&Vocabulary::josephine()).unwrap_err().to_string();
        assert!(err.contains("no reachable entry finishes"));
    }
}
