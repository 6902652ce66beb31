//! Error types for check-in infrastructure

use thiserror::Error;

use crate::auth::AuthError;
use crate::crypto::EnvelopeError;
use crate::domain::RecordKey;

/// Errors that can occur while decoding, redeeming or administering records
#[derive(Error, Debug)]
pub enum CheckinError {
    /// Scanned text is not a recognised payload, or lacks required fields
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Encrypted payload could not be opened
    #[error("decryption failed: {0}")]
    DecryptionFailed(#[from] EnvelopeError),

    /// No record for the scanned identity
    #[error("record not found: {0}")]
    NotFound(RecordKey),

    /// Signed-in account has no attendee record
    #[error("no record for account: {0}")]
    NoRecordForAccount(String),

    /// Coupon already redeemed
    #[error("already redeemed: {name}")]
    AlreadyRedeemed {
        name: String,
        redeemed_at: Option<chrono::DateTime<chrono::Utc>>,
    },

    /// Capture device failure
    #[error("device error: {0}")]
    Device(String),

    /// Sign-in or session failure
    #[error("authentication failed: {0}")]
    AuthFailed(#[from] AuthError),

    /// Store or identity service unreachable
    #[error("transport error: {0}")]
    Transport(String),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl CheckinError {
    /// Transport-class failures: the request never got a definitive answer
    pub fn is_transport(&self) -> bool {
        matches!(self, CheckinError::Transport(_) | CheckinError::Database(_))
    }
}

/// Result type for check-in operations
pub type Result<T> = std::result::Result<T, CheckinError>;
