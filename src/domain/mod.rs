//! Domain models for attendee check-in
//!
//! Records, decoded scan payloads, scan outcomes and record queries.

mod outcome;
mod payload;
mod query;
mod record;
mod types;

pub use outcome::*;
pub use payload::*;
pub use query::*;
pub use record::*;
pub use types::*;
