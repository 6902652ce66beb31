//! Encrypted QR envelopes
//!
//! The encrypted code variant carries base64 text that decodes to a JSON
//! object `{nonce, ciphertext, tag}`, each field itself standard base64:
//!
//! ```text
//! qr_text  = BASE64(JSON{ "nonce": B64(nonce[12]),
//!                         "ciphertext": B64(ct),
//!                         "tag": B64(tag[16]) })
//! plaintext = AES-GCM-Open(key = UTF8(passphrase), iv = nonce, ct || tag)
//! ```
//!
//! Key material is the raw passphrase bytes with no salt or KDF, so the
//! passphrase length picks the cipher: 16 bytes for AES-128, 32 for AES-256.
//! A single static key shared by every issuing and scanning device is weak:
//! it cannot be rotated per deployment, and anyone holding one scanner's
//! configuration can mint valid codes.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Nonce size for AES-GCM (12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes, 128-bit tag)
pub const TAG_SIZE: usize = 16;

/// Error type for envelope operations
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("invalid base64 in {0}")]
    InvalidBase64(&'static str),

    #[error("invalid envelope format: {0}")]
    InvalidFormat(String),

    #[error("invalid nonce length: expected {NONCE_SIZE}, got {0}")]
    InvalidNonce(usize),

    #[error("invalid tag length: expected {TAG_SIZE}, got {0}")]
    InvalidTag(usize),

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("invalid passphrase length: {0} bytes (expected 16 or 32)")]
    InvalidKeyLength(usize),

    #[error("decrypted payload is not a JSON object: {0}")]
    InvalidPlaintext(String),
}

enum Cipher {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

/// AEAD key built directly from a pre-shared passphrase
pub struct PassphraseKey {
    cipher: Cipher,
}

impl std::fmt::Debug for PassphraseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bits = match self.cipher {
            Cipher::Aes128(_) => 128,
            Cipher::Aes256(_) => 256,
        };
        f.debug_struct("PassphraseKey")
            .field("bits", &bits)
            .finish_non_exhaustive()
    }
}

impl PassphraseKey {
    /// Import the UTF-8 bytes of `passphrase` as an AES-GCM key
    pub fn new(passphrase: &str) -> Result<Self, EnvelopeError> {
        let bytes = passphrase.as_bytes();
        let cipher = match bytes.len() {
            16 => Cipher::Aes128(Box::new(
                Aes128Gcm::new_from_slice(bytes)
                    .map_err(|_| EnvelopeError::InvalidKeyLength(bytes.len()))?,
            )),
            32 => Cipher::Aes256(Box::new(
                Aes256Gcm::new_from_slice(bytes)
                    .map_err(|_| EnvelopeError::InvalidKeyLength(bytes.len()))?,
            )),
            n => return Err(EnvelopeError::InvalidKeyLength(n)),
        };
        Ok(Self { cipher })
    }

    /// Authenticated decryption of `ciphertext || tag`
    pub fn open(
        &self,
        nonce: &[u8; NONCE_SIZE],
        ciphertext_with_tag: &[u8],
    ) -> Result<Vec<u8>, EnvelopeError> {
        if ciphertext_with_tag.len() < TAG_SIZE {
            return Err(EnvelopeError::DecryptionFailed);
        }
        let nonce = Nonce::from_slice(nonce);
        let result = match &self.cipher {
            Cipher::Aes128(c) => c.decrypt(nonce, ciphertext_with_tag),
            Cipher::Aes256(c) => c.decrypt(nonce, ciphertext_with_tag),
        };
        result.map_err(|_| EnvelopeError::DecryptionFailed)
    }

    /// Encrypt, returning `ciphertext || tag`
    pub fn seal(
        &self,
        nonce: &[u8; NONCE_SIZE],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, EnvelopeError> {
        let nonce = Nonce::from_slice(nonce);
        let result = match &self.cipher {
            Cipher::Aes128(c) => c.encrypt(nonce, plaintext),
            Cipher::Aes256(c) => c.encrypt(nonce, plaintext),
        };
        result.map_err(|e| EnvelopeError::EncryptionFailed(e.to_string()))
    }
}

/// The JSON object carried (base64-wrapped) by an encrypted code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedEnvelope {
    /// 12-byte nonce (base64)
    pub nonce: String,

    /// Ciphertext without tag (base64)
    pub ciphertext: String,

    /// 16-byte authentication tag (base64)
    pub tag: String,
}

impl SealedEnvelope {
    /// Parse the outer base64 layer of scanned text
    pub fn from_qr_text(text: &str) -> Result<Self, EnvelopeError> {
        let json = base64_decode(text.trim(), "envelope")?;
        serde_json::from_slice(&json).map_err(|e| EnvelopeError::InvalidFormat(e.to_string()))
    }

    /// Render as scannable text
    pub fn to_qr_text(&self) -> String {
        // Serializing three strings cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        STANDARD.encode(json)
    }

    /// Decode nonce from base64
    pub fn decode_nonce(&self) -> Result<[u8; NONCE_SIZE], EnvelopeError> {
        let bytes = base64_decode(&self.nonce, "nonce")?;
        let len = bytes.len();
        bytes
            .try_into()
            .map_err(|_| EnvelopeError::InvalidNonce(len))
    }

    /// Decode ciphertext from base64
    pub fn decode_ciphertext(&self) -> Result<Vec<u8>, EnvelopeError> {
        base64_decode(&self.ciphertext, "ciphertext")
    }

    /// Decode tag from base64
    pub fn decode_tag(&self) -> Result<[u8; TAG_SIZE], EnvelopeError> {
        let bytes = base64_decode(&self.tag, "tag")?;
        let len = bytes.len();
        bytes.try_into().map_err(|_| EnvelopeError::InvalidTag(len))
    }

    /// Decrypt the envelope, returning the raw plaintext bytes
    pub fn open(&self, key: &PassphraseKey) -> Result<Vec<u8>, EnvelopeError> {
        let nonce = self.decode_nonce()?;
        let ciphertext = self.decode_ciphertext()?;
        let tag = self.decode_tag()?;

        let mut full = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
        full.extend_from_slice(&ciphertext);
        full.extend_from_slice(&tag);

        key.open(&nonce, &full)
    }
}

/// Decode scanned text all the way to plaintext bytes
pub fn open_qr_text(key: &PassphraseKey, text: &str) -> Result<Vec<u8>, EnvelopeError> {
    SealedEnvelope::from_qr_text(text)?.open(key)
}

/// Seal plaintext under a fresh random nonce
pub fn seal_envelope(key: &PassphraseKey, plaintext: &[u8]) -> Result<SealedEnvelope, EnvelopeError> {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    seal_envelope_with_nonce(key, &nonce, plaintext)
}

/// Seal plaintext under a caller-chosen nonce. Never reuse a nonce with the same key.
pub fn seal_envelope_with_nonce(
    key: &PassphraseKey,
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
) -> Result<SealedEnvelope, EnvelopeError> {
    let sealed = key.seal(nonce, plaintext)?;
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_SIZE);

    Ok(SealedEnvelope {
        nonce: STANDARD.encode(nonce),
        ciphertext: STANDARD.encode(ciphertext),
        tag: STANDARD.encode(tag),
    })
}

/// Decode standard base64 (with or without padding)
fn base64_decode(s: &str, field: &'static str) -> Result<Vec<u8>, EnvelopeError> {
    STANDARD
        .decode(s)
        .or_else(|_| STANDARD_NO_PAD.decode(s))
        .map_err(|_| EnvelopeError::InvalidBase64(field))
}
