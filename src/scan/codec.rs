//! Payload codec: scanned text to [`ScanPayload`]
//!
//! Two code variants are in circulation. Plain codes are a JSON object with a
//! `roll_num`. Encrypted codes are an envelope (see [`crate::crypto`]) whose
//! plaintext carries `doc_id` and `roll_num`. The deployment picks which
//! variants a scanner accepts.

use serde_json::Value;
use tracing::debug;

use crate::crypto::{EnvelopeError, PassphraseKey, SealedEnvelope};
use crate::domain::{DocumentId, RollNumber, ScanPayload, SealedIdentity};
use crate::infra::{CheckinError, Result};

/// Which code variants are accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadMode {
    /// Plain JSON only
    Plain,
    /// Plain JSON when the text looks like an object, envelope otherwise
    #[default]
    Auto,
    /// Envelopes only
    Sealed,
}

impl PayloadMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "off" | "false" | "0" => Ok(Self::Plain),
            "auto" | "optional" => Ok(Self::Auto),
            "sealed" | "encrypted" | "on" | "true" | "1" => Ok(Self::Sealed),
            other => Err(CheckinError::Configuration(format!(
                "invalid CHECKIN_PAYLOAD_MODE={other} (expected: plain|auto|sealed)"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Auto => "auto",
            Self::Sealed => "sealed",
        }
    }

    pub fn requires_key(&self) -> bool {
        !matches!(self, Self::Plain)
    }
}

#[derive(Debug)]
pub struct PayloadCodec {
    mode: PayloadMode,
    key: Option<PassphraseKey>,
}

impl PayloadCodec {
    /// Build a codec; every mode except `Plain` needs a key
    pub fn new(mode: PayloadMode, key: Option<PassphraseKey>) -> Result<Self> {
        if mode.requires_key() && key.is_none() {
            return Err(CheckinError::Configuration(format!(
                "CHECKIN_PAYLOAD_PASSPHRASE is required unless CHECKIN_PAYLOAD_MODE=plain (mode={})",
                mode.as_str()
            )));
        }
        Ok(Self { mode, key })
    }

    pub fn plain() -> Self {
        Self {
            mode: PayloadMode::Plain,
            key: None,
        }
    }

    pub fn with_passphrase(mode: PayloadMode, passphrase: &str) -> Result<Self> {
        let key = PassphraseKey::new(passphrase).map_err(|e| {
            CheckinError::Configuration(format!("CHECKIN_PAYLOAD_PASSPHRASE: {e}"))
        })?;
        Self::new(mode, Some(key))
    }

    pub fn mode(&self) -> PayloadMode {
        self.mode
    }

    /// Resolve scanned text into a payload.
    ///
    /// Fails with `InvalidPayload` for unrecognised text or missing fields and
    /// with `DecryptionFailed` for an envelope that cannot be opened.
    pub fn decode(&self, raw: &str) -> Result<ScanPayload> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(CheckinError::InvalidPayload("empty scan".to_string()));
        }
        let looks_plain = text.starts_with('{');

        match self.mode {
            PayloadMode::Plain => decode_plain(text),
            PayloadMode::Sealed if looks_plain => Err(CheckinError::InvalidPayload(
                "plain codes are not accepted".to_string(),
            )),
            PayloadMode::Sealed => self.decode_sealed(text),
            PayloadMode::Auto if looks_plain => decode_plain(text),
            PayloadMode::Auto => match SealedEnvelope::from_qr_text(text) {
                Ok(envelope) => self.open_envelope(&envelope),
                Err(e) => {
                    debug!(error = %e, "text is neither JSON nor an envelope");
                    Err(CheckinError::InvalidPayload(
                        "not a recognised code".to_string(),
                    ))
                }
            },
        }
    }

    fn decode_sealed(&self, text: &str) -> Result<ScanPayload> {
        let envelope = SealedEnvelope::from_qr_text(text)?;
        self.open_envelope(&envelope)
    }

    fn open_envelope(&self, envelope: &SealedEnvelope) -> Result<ScanPayload> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| CheckinError::Configuration("no payload key configured".to_string()))?;

        let plaintext = envelope.open(key)?;
        let value: Value = serde_json::from_slice(&plaintext)
            .map_err(|e| EnvelopeError::InvalidPlaintext(e.to_string()))?;
        if !value.is_object() {
            return Err(EnvelopeError::InvalidPlaintext("expected an object".to_string()).into());
        }

        let doc_id = required_text(&value, "doc_id")?;
        let roll_num = required_text(&value, "roll_num")?;
        Ok(ScanPayload::Sealed {
            doc_id: DocumentId::new(doc_id),
            roll_num: RollNumber::new(roll_num),
        })
    }
}

fn decode_plain(text: &str) -> Result<ScanPayload> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| CheckinError::InvalidPayload(format!("malformed JSON: {e}")))?;
    let roll_num = required_text(&value, "roll_num")?;
    Ok(ScanPayload::Plain {
        roll_num: RollNumber::new(roll_num),
    })
}

/// Non-empty string field; numeric ids are accepted and rendered as text
fn required_text(value: &Value, field: &str) -> Result<String> {
    let text = match value.get(field) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    if text.is_empty() {
        return Err(CheckinError::InvalidPayload(format!("missing {field}")));
    }
    Ok(text)
}

/// Inverse of [`PayloadCodec`] for encrypted codes
#[derive(Debug)]
pub struct PayloadIssuer {
    key: PassphraseKey,
}

impl PayloadIssuer {
    pub fn new(key: PassphraseKey) -> Self {
        Self { key }
    }

    pub fn with_passphrase(passphrase: &str) -> Result<Self> {
        let key = PassphraseKey::new(passphrase).map_err(|e| {
            CheckinError::Configuration(format!("CHECKIN_PAYLOAD_PASSPHRASE: {e}"))
        })?;
        Ok(Self::new(key))
    }

    /// Seal an attendee's identity into scannable text
    pub fn issue(&self, doc_id: &DocumentId, roll_num: &RollNumber) -> Result<String> {
        let identity = SealedIdentity::new(doc_id, roll_num);
        let plaintext = serde_json::to_vec(&identity)
            .map_err(|e| CheckinError::Internal(format!("serialize identity: {e}")))?;
        let envelope = crate::crypto::seal_envelope(&self.key, &plaintext)
            .map_err(|e| CheckinError::Internal(e.to_string()))?;
        Ok(envelope.to_qr_text())
    }

    /// Plain code text for deployments without encryption
    pub fn issue_plain(roll_num: &RollNumber) -> String {
        serde_json::json!({ "roll_num": roll_num.as_str() }).to_string()
    }
}
