//! Per-correspondent conversation state
//!
//! Sessions live in memory for the lifetime of the process. They are never
//! removed, a finished dialogue cycle resets its session in place.

pub mod manager;
pub mod step;
pub mod store;

pub use manager::SessionStore;
pub use step::{Branch, Step};
pub use store::{CorrespondentId, Session};
