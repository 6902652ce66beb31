//! Infrastructure layer for check-in
//!
//! Contains the record store contract and its implementations:
//! - In-memory store (development, tests)
//! - SQLite store (single-station deployments)

mod error;
mod memory;
pub mod sqlite;
mod traits;

pub use error::*;
pub use memory::InMemoryRecordStore;
pub use sqlite::SqliteRecordStore;
pub use traits::*;
