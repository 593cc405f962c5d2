//! Message bus between channels and the dialogue loop
//!
//! Channels push inbound messages onto one queue; the dialogue loop pushes
//! replies onto the other, which a dispatcher fans out to channel callbacks.

pub mod events;
pub mod queue;

pub use events::{InboundMessage, OutboundMessage};
pub use queue::MessageBus;
