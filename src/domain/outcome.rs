//! Per-scan outcomes and the messages staff see for them.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::record::{format_local_timestamp, AttendeeRecord};

pub const SUCCESS_MESSAGE: &str = "Food coupon validated successfully!";
pub const INVALID_PAYLOAD_MESSAGE: &str = "Invalid QR code format";
pub const DECRYPTION_FAILED_MESSAGE: &str = "Invalid QR code";
pub const NOT_FOUND_MESSAGE: &str = "Student not found in database";
pub const DEVICE_ERROR_MESSAGE: &str = "Camera error. Please check permissions and try again.";
pub const TRANSPORT_ERROR_MESSAGE: &str =
    "Could not reach the record store. Check the connection and scan again.";

/// Result of one scan attempt. Produced once, displayed, then expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Coupon redeemed now; carries the record as it is after redemption
    Success { record: AttendeeRecord },
    /// Coupon was redeemed earlier
    AlreadyRedeemed {
        name: String,
        redeemed_at: Option<DateTime<Utc>>,
    },
    InvalidPayload,
    NotFound,
    DecryptionFailed,
    DeviceError,
    /// Store could not be reached; distinct from a bad code
    TransportError { reason: String },
}

impl ScanOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScanOutcome::Success { .. })
    }

    /// Short stable name, used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            ScanOutcome::Success { .. } => "success",
            ScanOutcome::AlreadyRedeemed { .. } => "already_redeemed",
            ScanOutcome::InvalidPayload => "invalid_payload",
            ScanOutcome::NotFound => "not_found",
            ScanOutcome::DecryptionFailed => "decryption_failed",
            ScanOutcome::DeviceError => "device_error",
            ScanOutcome::TransportError { .. } => "transport_error",
        }
    }

    /// User-facing message for the outcome
    pub fn message(&self) -> String {
        match self {
            ScanOutcome::Success { .. } => SUCCESS_MESSAGE.to_string(),
            ScanOutcome::AlreadyRedeemed { name, redeemed_at } => {
                let when = redeemed_at
                    .map(format_local_timestamp)
                    .unwrap_or_else(|| "previously".to_string());
                format!("{name} has already scanned at {when}")
            }
            ScanOutcome::InvalidPayload => INVALID_PAYLOAD_MESSAGE.to_string(),
            ScanOutcome::NotFound => NOT_FOUND_MESSAGE.to_string(),
            ScanOutcome::DecryptionFailed => DECRYPTION_FAILED_MESSAGE.to_string(),
            ScanOutcome::DeviceError => DEVICE_ERROR_MESSAGE.to_string(),
            ScanOutcome::TransportError { .. } => TRANSPORT_ERROR_MESSAGE.to_string(),
        }
    }

    /// How long the outcome stays on screen before the session re-arms
    pub fn display_window(&self, windows: &DisplayWindows) -> Duration {
        if self.is_success() {
            windows.success
        } else {
            windows.error
        }
    }
}

/// Display lifetimes for scan outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayWindows {
    pub success: Duration,
    pub error: Duration,
}

impl Default for DisplayWindows {
    fn default() -> Self {
        Self {
            success: Duration::from_secs(5),
            error: Duration::from_secs(3),
        }
    }
}
