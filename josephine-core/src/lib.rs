//! Core types for Josephine
//!
//! This crate provides the message bus, configuration, per-correspondent
//! session state and logging setup shared by the dialogue engine, the
//! channel integrations and the CLI.

pub mod bus;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod utils;

pub use error::{Error, Result};
