//! Chat platform integrations for Josephine
//!
//! Josephine speaks WhatsApp through a WhatsApp Web bridge. Channels turn
//! platform events into bus messages and deliver the dialogue loop's replies.

pub mod base;
pub mod manager;
pub mod whatsapp;

pub use base::{ChannelError, ChannelHandler, ChannelHandlerPtr, Result};
pub use manager::ChannelManager;
pub use whatsapp::WhatsAppHandler;
