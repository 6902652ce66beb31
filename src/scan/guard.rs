//! Redemption guard
//!
//! Marks a record redeemed at most once. Two policies are available:
//!
//! - **check-then-set**: read, reject if redeemed, then write. Not atomic
//!   against a second station scanning the same code between the read and
//!   the write; both may report success.
//! - **conditional**: the write only applies while the record is unredeemed.
//!   A station that loses the race re-reads the record and reports the
//!   winner's timestamp.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{redemption_timestamp, AttendeeRecord, RecordKey, Redemption};
use crate::infra::{CheckinError, RecordStore, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedemptionPolicy {
    #[default]
    CheckThenSet,
    Conditional,
}

impl RedemptionPolicy {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "check-then-set" | "check_then_set" | "simple" => Ok(Self::CheckThenSet),
            "conditional" | "cas" | "compare-and-set" => Ok(Self::Conditional),
            other => Err(CheckinError::Configuration(format!(
                "invalid CHECKIN_REDEMPTION_POLICY={other} (expected: check-then-set|conditional)"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckThenSet => "check-then-set",
            Self::Conditional => "conditional",
        }
    }
}

#[derive(Clone)]
pub struct RedemptionGuard {
    store: Arc<dyn RecordStore>,
    policy: RedemptionPolicy,
}

impl RedemptionGuard {
    pub fn new(store: Arc<dyn RecordStore>, policy: RedemptionPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> RedemptionPolicy {
        self.policy
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Redeem the record addressed by `key`.
    ///
    /// Returns the record as it was read, with the new redemption timestamp
    /// applied.
    pub async fn redeem(&self, key: &RecordKey) -> Result<AttendeeRecord> {
        let record = self
            .store
            .get(key)
            .await?
            .ok_or_else(|| CheckinError::NotFound(key.clone()))?;

        if let Redemption::Redeemed { at } = record.redemption {
            debug!(%key, redeemed_at = %at, "coupon already redeemed");
            return Err(CheckinError::AlreadyRedeemed {
                name: record.name,
                redeemed_at: Some(at),
            });
        }

        let now = redemption_timestamp();
        match self.policy {
            RedemptionPolicy::CheckThenSet => {
                self.store
                    .set_redemption(&record.doc_id, Redemption::Redeemed { at: now })
                    .await?;
            }
            RedemptionPolicy::Conditional => {
                if !self.store.redeem_if_unredeemed(&record.doc_id, now).await? {
                    return Err(self.lost_race(key, &record).await);
                }
            }
        }

        info!(
            doc_id = %record.doc_id,
            roll_num = %record.roll_num,
            policy = self.policy.as_str(),
            "coupon redeemed"
        );

        Ok(AttendeeRecord {
            redemption: Redemption::Redeemed { at: now },
            ..record
        })
    }

    /// Another station redeemed between our read and our conditional write
    async fn lost_race(&self, key: &RecordKey, snapshot: &AttendeeRecord) -> CheckinError {
        warn!(%key, "conditional redemption lost to a concurrent scan");
        match self.store.get_by_id(&snapshot.doc_id).await {
            Ok(Some(current)) => CheckinError::AlreadyRedeemed {
                name: current.name,
                redeemed_at: current.redemption.redeemed_at(),
            },
            Ok(None) => CheckinError::NotFound(key.clone()),
            Err(e) => e,
        }
    }
}
