//! SQLite implementations
//!
//! Provides a local attendee record store for single-station deployments
//! and offline rehearsal.

mod record_store;

pub use record_store::*;
