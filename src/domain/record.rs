//! Attendee records and their redemption state.

use chrono::{DateTime, Local, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::types::{AttendeeProfile, DocumentId, FoodPreference, RollNumber};

/// Redemption state of an attendee's one-time coupon.
///
/// `redeemed == true` holds exactly when a redemption timestamp exists, so the
/// two flags are folded into one enum. On the wire they stay as the flat
/// `redeemed` / `redeemed_at` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "RedemptionFields", try_from = "RedemptionFields")]
pub enum Redemption {
    #[default]
    Unredeemed,
    Redeemed { at: DateTime<Utc> },
}

impl Redemption {
    pub fn is_redeemed(&self) -> bool {
        matches!(self, Redemption::Redeemed { .. })
    }

    pub fn redeemed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Redemption::Redeemed { at } => Some(*at),
            Redemption::Unredeemed => None,
        }
    }

    /// Rebuild from the flat storage representation.
    ///
    /// A timestamp left behind on an unredeemed record is dropped; a redeemed
    /// flag without a timestamp is rejected.
    pub fn from_parts(redeemed: bool, at: Option<DateTime<Utc>>) -> Result<Self, String> {
        match (redeemed, at) {
            (true, Some(at)) => Ok(Redemption::Redeemed { at }),
            (true, None) => Err("record is redeemed but has no redeemed_at".to_string()),
            (false, _) => Ok(Redemption::Unredeemed),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RedemptionFields {
    #[serde(default)]
    redeemed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    redeemed_at: Option<DateTime<Utc>>,
}

impl From<Redemption> for RedemptionFields {
    fn from(r: Redemption) -> Self {
        Self {
            redeemed: r.is_redeemed(),
            redeemed_at: r.redeemed_at(),
        }
    }
}

impl TryFrom<RedemptionFields> for Redemption {
    type Error = String;

    fn try_from(fields: RedemptionFields) -> Result<Self, Self::Error> {
        Redemption::from_parts(fields.redeemed, fields.redeemed_at)
    }
}

/// An attendee document as held by the record store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeRecord {
    pub doc_id: DocumentId,
    pub roll_num: RollNumber,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<AttendeeProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_image_url: Option<String>,
    #[serde(flatten)]
    pub redemption: Redemption,
}

impl AttendeeRecord {
    pub fn new(doc_id: DocumentId, roll_num: RollNumber, name: impl Into<String>) -> Self {
        Self {
            doc_id,
            roll_num,
            name: name.into(),
            email: None,
            profile: None,
            qr_image_url: None,
            redemption: Redemption::Unredeemed,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(normalize_email(&email.into()));
        self
    }

    pub fn with_profile(mut self, profile: AttendeeProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_qr_image_url(mut self, url: impl Into<String>) -> Self {
        self.qr_image_url = Some(url.into());
        self
    }

    pub fn is_redeemed(&self) -> bool {
        self.redemption.is_redeemed()
    }

    pub fn redeemed_at(&self) -> Option<DateTime<Utc>> {
        self.redemption.redeemed_at()
    }

    /// Canonical form for storage: email trimmed and lower-cased, blank email dropped
    pub fn normalized(mut self) -> Self {
        self.email = self
            .email
            .map(|e| normalize_email(&e))
            .filter(|e| !e.is_empty());
        self
    }

    /// Food preference, if this deployment records one
    pub fn preference(&self) -> Option<FoodPreference> {
        match &self.profile {
            Some(AttendeeProfile::Dining { preference }) => Some(*preference),
            _ => None,
        }
    }
}

/// Canonical email form used for storage and sign-in lookups
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Parse a JSON array of attendee records for seeding a store.
///
/// Entries without a `doc_id` get a generated one; emails are normalized.
pub fn parse_roster(raw: &str) -> Result<Vec<AttendeeRecord>, serde_json::Error> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(raw)?;
    entries
        .into_iter()
        .map(|mut entry| {
            if let Some(fields) = entry.as_object_mut() {
                fields
                    .entry("doc_id")
                    .or_insert_with(|| DocumentId::generate().0.into());
            }
            serde_json::from_value::<AttendeeRecord>(entry).map(AttendeeRecord::normalized)
        })
        .collect()
}

/// Current time at the precision record stores keep (microseconds)
pub fn redemption_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Format a timestamp the way staff devices show it (local time, en-US style).
pub fn format_local_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%-m/%-d/%Y, %-I:%M:%S %p")
        .to_string()
}
