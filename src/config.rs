//! Station configuration from `CHECKIN_*` environment variables

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{Credentials, IdentityProvider, LocalIdentityProvider, PasswordAccount};
use crate::domain::DisplayWindows;
use crate::infra::{CheckinError, Result};
use crate::portal::DEFAULT_STUDENT_DOMAIN;
use crate::scan::{PayloadCodec, PayloadIssuer, PayloadMode, RedemptionPolicy, DEFAULT_POLL_INTERVAL};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://checkin.db?mode=rwc";

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub payload_mode: PayloadMode,
    /// Pre-shared passphrase for encrypted codes (16 or 32 bytes)
    pub payload_passphrase: Option<String>,
    pub redemption_policy: RedemptionPolicy,
    pub windows: DisplayWindows,
    pub scan_interval: Duration,
    pub student_email_domain: String,
    /// Accounts allowed to run a scanning station
    pub staff_accounts: Vec<PasswordAccount>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url)
            .field("payload_mode", &self.payload_mode)
            .field(
                "payload_passphrase",
                &self.payload_passphrase.as_ref().map(|_| "<redacted>"),
            )
            .field("redemption_policy", &self.redemption_policy)
            .field("windows", &self.windows)
            .field("scan_interval", &self.scan_interval)
            .field("student_email_domain", &self.student_email_domain)
            .field(
                "staff_accounts",
                &self.staff_accounts.iter().map(|a| a.email.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            payload_mode: PayloadMode::default(),
            payload_passphrase: None,
            redemption_policy: RedemptionPolicy::default(),
            windows: DisplayWindows::default(),
            scan_interval: DEFAULT_POLL_INTERVAL,
            student_email_domain: DEFAULT_STUDENT_DOMAIN.to_string(),
            staff_accounts: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let payload_mode = match lookup("CHECKIN_PAYLOAD_MODE") {
            Some(v) => PayloadMode::parse(&v)?,
            None => defaults.payload_mode,
        };
        let redemption_policy = match lookup("CHECKIN_REDEMPTION_POLICY") {
            Some(v) => RedemptionPolicy::parse(&v)?,
            None => defaults.redemption_policy,
        };

        let windows = DisplayWindows {
            success: parse_millis(&lookup, "CHECKIN_SUCCESS_WINDOW_MS")?
                .unwrap_or(defaults.windows.success),
            error: parse_millis(&lookup, "CHECKIN_ERROR_WINDOW_MS")?
                .unwrap_or(defaults.windows.error),
        };
        let scan_interval =
            parse_millis(&lookup, "CHECKIN_SCAN_INTERVAL_MS")?.unwrap_or(defaults.scan_interval);
        if scan_interval.is_zero() {
            return Err(CheckinError::Configuration(
                "CHECKIN_SCAN_INTERVAL_MS must be positive".to_string(),
            ));
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            payload_mode,
            payload_passphrase: lookup("CHECKIN_PAYLOAD_PASSPHRASE").filter(|p| !p.is_empty()),
            redemption_policy,
            windows,
            scan_interval,
            student_email_domain: lookup("CHECKIN_STUDENT_EMAIL_DOMAIN")
                .unwrap_or(defaults.student_email_domain),
            staff_accounts: match lookup("CHECKIN_STAFF_ACCOUNTS") {
                Some(v) => parse_staff_accounts(&v)?,
                None => defaults.staff_accounts,
            },
        })
    }

    /// Sign a staff member in against the configured accounts.
    ///
    /// The returned provider holds the session the scanner is gated on.
    pub async fn sign_in_staff(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Arc<LocalIdentityProvider>> {
        if self.staff_accounts.is_empty() {
            return Err(CheckinError::Configuration(
                "no staff accounts configured (CHECKIN_STAFF_ACCOUNTS)".to_string(),
            ));
        }

        let provider = Arc::new(LocalIdentityProvider::new());
        for account in &self.staff_accounts {
            provider.register(account.clone()).await;
        }
        provider
            .sign_in(Credentials::password(email, password))
            .await?;
        Ok(provider)
    }

    /// Codec for this station's payload mode
    pub fn payload_codec(&self) -> Result<PayloadCodec> {
        match (&self.payload_passphrase, self.payload_mode) {
            (_, PayloadMode::Plain) => Ok(PayloadCodec::plain()),
            (Some(passphrase), mode) => PayloadCodec::with_passphrase(mode, passphrase),
            (None, mode) => PayloadCodec::new(mode, None),
        }
    }

    pub fn payload_issuer(&self) -> Result<PayloadIssuer> {
        let passphrase = self.payload_passphrase.as_deref().ok_or_else(|| {
            CheckinError::Configuration(
                "CHECKIN_PAYLOAD_PASSPHRASE is required to issue encrypted codes".to_string(),
            )
        })?;
        PayloadIssuer::with_passphrase(passphrase)
    }
}

/// `email=salt_hex:hash_hex` entries separated by commas
fn parse_staff_accounts(value: &str) -> Result<Vec<PasswordAccount>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .and_then(|(email, digest)| PasswordAccount::from_digest(email, digest, None))
                .ok_or_else(|| {
                    CheckinError::Configuration(format!(
                        "invalid CHECKIN_STAFF_ACCOUNTS entry {:?} (expected email=salt:hash)",
                        entry.split_once('=').map_or(entry, |(email, _)| email)
                    ))
                })
        })
        .collect()
}

fn parse_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<Duration>> {
    lookup(key)
        .map(|v| {
            v.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| CheckinError::Configuration(format!("invalid {key}={v}: {e}")))
        })
        .transpose()
}
