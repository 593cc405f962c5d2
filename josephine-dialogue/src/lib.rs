//! Scripted dialogue for Josephine
//!
//! This crate holds the static dialogue content (script and vocabulary),
//! the per-correspondent session engine, and the loop that connects the
//! engine to the message bus.

pub mod dialogue_loop;
pub mod echo;
pub mod engine;
pub mod script;
pub mod vocabulary;

pub use dialogue_loop::DialogueLoop;
pub use echo::EchoLedger;
pub use engine::{Clock, EngineSettings, Event, ManualClock, Sender, SessionEngine, SystemClock};
pub use script::{Content, Outcome, Script, ScriptEntry};
pub use vocabulary::Vocabulary;
