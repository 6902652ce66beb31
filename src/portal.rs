//! Student self-service view
//!
//! A student signs in with their institutional account and sees their own
//! record: roll number, dining preference, QR code link and redemption
//! status. Accounts outside the allowed email domain, and accounts with no
//! record, are signed straight back out.

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::{AuthError, Credentials, IdentityProvider, User};
use crate::domain::{
    format_local_timestamp, normalize_email, AttendeeRecord, RecordField, RecordQuery,
};
use crate::infra::{CheckinError, RecordStore, Result};

/// Default institutional domain for student accounts
pub const DEFAULT_STUDENT_DOMAIN: &str = "smail.iitm.ac.in";

/// What a student sees about their own record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalView {
    pub record: AttendeeRecord,
    pub preference: &'static str,
    pub status: String,
}

impl From<AttendeeRecord> for PortalView {
    fn from(record: AttendeeRecord) -> Self {
        let preference = record
            .preference()
            .map(|p| p.label())
            .unwrap_or("Not Specified");
        let status = match record.redeemed_at() {
            Some(at) => format!("Coupon redeemed at {}", format_local_timestamp(at)),
            None => "Coupon not yet redeemed".to_string(),
        };
        Self {
            record,
            preference,
            status,
        }
    }
}

pub struct StudentPortal {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn RecordStore>,
    allowed_domain: String,
}

impl StudentPortal {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn RecordStore>,
        allowed_domain: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            store,
            allowed_domain: allowed_domain.into().trim_start_matches('@').to_ascii_lowercase(),
        }
    }

    pub fn allowed_domain(&self) -> &str {
        &self.allowed_domain
    }

    pub fn is_allowed_email(&self, email: &str) -> bool {
        email
            .trim()
            .to_ascii_lowercase()
            .strip_suffix(&self.allowed_domain)
            .is_some_and(|local| local.len() > 1 && local.ends_with('@'))
    }

    /// Sign in and load the student's record
    pub async fn sign_in(&self, credentials: Credentials) -> Result<PortalView> {
        let user = self.identity.sign_in(credentials).await?;
        self.load_for(&user).await
    }

    /// Reload the current student's record
    pub async fn refresh(&self) -> Result<PortalView> {
        let user = self
            .identity
            .current_user()
            .ok_or(CheckinError::AuthFailed(AuthError::NotSignedIn))?;
        self.load_for(&user).await
    }

    pub async fn sign_out(&self) {
        self.identity.sign_out().await;
    }

    /// Resolve `user` to their record. Any failure ends the session.
    pub async fn load_for(&self, user: &User) -> Result<PortalView> {
        match self.lookup(user).await {
            Ok(record) => {
                info!(uid = %user.uid, doc_id = %record.doc_id, "student record loaded");
                Ok(PortalView::from(record))
            }
            Err(e) => {
                warn!(uid = %user.uid, error = %e, "student record unavailable, signing out");
                self.identity.sign_out().await;
                Err(e)
            }
        }
    }

    async fn lookup(&self, user: &User) -> Result<AttendeeRecord> {
        if !self.is_allowed_email(&user.email) {
            return Err(AuthError::DomainNotAllowed(user.email.clone()).into());
        }

        let query = RecordQuery::new()
            .equals(RecordField::Email, normalize_email(&user.email))
            .limit(1);
        self.store
            .query(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CheckinError::NoRecordForAccount(user.email.clone()))
    }
}
