//! Fest Check-in Library
//!
//! QR check-in and one-time food coupon redemption for event attendees.
//! Staff scan an attendee's code; the code is decoded (optionally decrypted),
//! the attendee's record is looked up and its coupon is redeemed at most once.
//!
//! ## Modules
//!
//! - [`domain`] - Records, payloads, outcomes and queries
//! - [`crypto`] - Encrypted QR envelopes (AES-GCM)
//! - [`scan`] - Payload codec, redemption guard, scan session controller, decoder adapters
//! - [`infra`] - Record store contract and its in-memory and SQLite implementations
//! - [`auth`] - Identity provider contract and a local account directory
//! - [`portal`] - Student self-service view of their own record
//! - [`search`] - Admin lookup, recent redemptions and manual toggle
//! - [`config`] - Environment configuration
//! - [`metrics`] - In-process counters and histograms
//! - [`telemetry`] - Logging setup

pub mod auth;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod infra;
pub mod metrics;
pub mod migrations;
pub mod portal;
pub mod scan;
pub mod search;
pub mod telemetry;

// Re-export commonly used types
pub use domain::{
    AttendeeProfile, AttendeeRecord, DisplayWindows, DocumentId, FoodPreference, RecordKey,
    RecordQuery, Redemption, RollNumber, ScanOutcome, ScanPayload,
};

pub use infra::{CheckinError, InMemoryRecordStore, RecordStore, Result, SqliteRecordStore};

pub use scan::{
    PayloadCodec, PayloadIssuer, PayloadMode, RedemptionGuard, RedemptionPolicy, ScanController,
};
