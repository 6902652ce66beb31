//! Cryptographic utilities for check-in codes
//!
//! Provides:
//! - Passphrase-keyed AES-GCM (128-bit tag)
//! - The base64/JSON envelope carried by encrypted QR codes

mod envelope;

pub use envelope::*;
