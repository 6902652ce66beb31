//! Property-based tests using proptest.
//!
//! These tests verify invariants that should hold for any valid input.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use proptest::prelude::*;
use serde_json::json;

use fest_checkin::crypto::{open_qr_text, seal_envelope, PassphraseKey, SealedEnvelope};
use fest_checkin::domain::{Direction, RecordField, RecordQuery, Redemption};
use fest_checkin::scan::{PayloadCodec, PayloadIssuer, PayloadMode};
use fest_checkin::{AttendeeRecord, CheckinError, DocumentId, RollNumber, ScanPayload};

const PASSPHRASE_128: &str = "0123456789abcdef";
const PASSPHRASE_256: &str = "0123456789abcdef0123456789abcdef";

// ============================================================================
// Custom Strategies
// ============================================================================

/// Generate a roll number like "CS21B042"
fn arb_roll_number() -> impl Strategy<Value = String> {
    "[A-Z]{2}[0-9]{2}[A-Z][0-9]{3}"
}

/// Generate a document id
fn arb_doc_id() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9]{8,28}"
}

/// Either supported passphrase length
fn arb_passphrase() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(PASSPHRASE_128), Just(PASSPHRASE_256)]
}

/// Generate a record, redeemed at a whole-second offset or not at all
fn arb_record() -> impl Strategy<Value = AttendeeRecord> {
    (
        arb_doc_id(),
        arb_roll_number(),
        "[A-Z][a-z]{2,10}",
        proptest::option::of(0i64..1_000_000),
    )
        .prop_map(|(doc, roll, name, offset)| {
            let mut record = AttendeeRecord::new(DocumentId::new(doc), RollNumber::new(roll), name);
            if let Some(secs) = offset {
                record.redemption = Redemption::Redeemed {
                    at: chrono::DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap(),
                };
            }
            record
        })
}

fn flip_byte(encoded: &str, index: usize, mask: u8) -> String {
    let mut bytes = STANDARD.decode(encoded).unwrap();
    let i = index % bytes.len();
    bytes[i] ^= mask;
    STANDARD.encode(bytes)
}

// ============================================================================
// Envelope Properties
// ============================================================================

proptest! {
    /// Sealing then opening returns the plaintext
    #[test]
    fn envelope_roundtrip(passphrase in arb_passphrase(), plaintext in prop::collection::vec(any::<u8>(), 0..256)) {
        let key = PassphraseKey::new(passphrase).unwrap();
        let envelope = seal_envelope(&key, &plaintext).unwrap();
        let opened = open_qr_text(&key, &envelope.to_qr_text()).unwrap();
        prop_assert_eq!(opened, plaintext);
    }

    /// Flipping any ciphertext bit fails authentication
    #[test]
    fn tampered_ciphertext_never_opens(
        passphrase in arb_passphrase(),
        index in any::<usize>(),
        mask in 1u8..=255,
    ) {
        let key = PassphraseKey::new(passphrase).unwrap();
        let mut envelope = seal_envelope(&key, br#"{"doc_id":"d1","roll_num":"CS101"}"#).unwrap();
        envelope.ciphertext = flip_byte(&envelope.ciphertext, index, mask);
        prop_assert!(envelope.open(&key).is_err());
    }

    /// Flipping any tag bit fails authentication
    #[test]
    fn tampered_tag_never_opens(index in any::<usize>(), mask in 1u8..=255) {
        let key = PassphraseKey::new(PASSPHRASE_256).unwrap();
        let mut envelope = seal_envelope(&key, br#"{"doc_id":"d1","roll_num":"CS101"}"#).unwrap();
        envelope.tag = flip_byte(&envelope.tag, index, mask);
        prop_assert!(envelope.open(&key).is_err());
    }

    /// The envelope text survives an encode/parse cycle unchanged
    #[test]
    fn envelope_text_is_stable(plaintext in prop::collection::vec(any::<u8>(), 1..64)) {
        let key = PassphraseKey::new(PASSPHRASE_128).unwrap();
        let envelope = seal_envelope(&key, &plaintext).unwrap();
        let parsed = SealedEnvelope::from_qr_text(&envelope.to_qr_text()).unwrap();
        prop_assert_eq!(parsed, envelope);
    }
}

// ============================================================================
// Codec Properties
// ============================================================================

proptest! {
    /// Issued codes decode back to the sealed identity in both accepting modes
    #[test]
    fn issued_code_decodes(doc in arb_doc_id(), roll in arb_roll_number()) {
        let issuer = PayloadIssuer::with_passphrase(PASSPHRASE_256).unwrap();
        let text = issuer.issue(&DocumentId::new(doc.clone()), &RollNumber::new(roll.clone())).unwrap();

        for mode in [PayloadMode::Auto, PayloadMode::Sealed] {
            let codec = PayloadCodec::with_passphrase(mode, PASSPHRASE_256).unwrap();
            let payload = codec.decode(&text).unwrap();
            prop_assert_eq!(
                payload,
                ScanPayload::Sealed {
                    doc_id: DocumentId::new(doc.clone()),
                    roll_num: RollNumber::new(roll.clone()),
                }
            );
        }
    }

    /// Issued codes never open under a different passphrase
    #[test]
    fn wrong_passphrase_is_decryption_failure(doc in arb_doc_id(), roll in arb_roll_number()) {
        let issuer = PayloadIssuer::with_passphrase(PASSPHRASE_256).unwrap();
        let text = issuer.issue(&DocumentId::new(doc), &RollNumber::new(roll)).unwrap();

        let codec = PayloadCodec::with_passphrase(PayloadMode::Sealed, "fedcba9876543210fedcba9876543210").unwrap();
        prop_assert!(matches!(codec.decode(&text), Err(CheckinError::DecryptionFailed(_))));
    }

    /// Plain codes resolve to their roll number; extra fields are ignored
    #[test]
    fn plain_code_decodes(roll in arb_roll_number(), extra in "[a-z]{0,12}") {
        let text = json!({ "roll_num": roll, "note": extra }).to_string();
        let payload = PayloadCodec::plain().decode(&text).unwrap();
        prop_assert_eq!(payload, ScanPayload::Plain { roll_num: RollNumber::new(roll) });
    }

    /// JSON objects without a roll number are rejected, never redeemed
    #[test]
    fn plain_code_without_roll_is_invalid(key in "[a-z_]{1,12}", value in "[a-zA-Z0-9]{0,12}") {
        prop_assume!(key != "roll_num");
        let mut object = serde_json::Map::new();
        object.insert(key, json!(value));
        let text = serde_json::Value::Object(object).to_string();
        prop_assert!(matches!(
            PayloadCodec::plain().decode(&text),
            Err(CheckinError::InvalidPayload(_))
        ));
    }

    /// Arbitrary text never panics the codec
    #[test]
    fn decode_never_panics(text in ".{0,200}") {
        let codec = PayloadCodec::with_passphrase(PayloadMode::Auto, PASSPHRASE_128).unwrap();
        let _ = codec.decode(&text);
    }
}

// ============================================================================
// Query Properties
// ============================================================================

proptest! {
    /// Results honour the predicate, the ordering and the limit
    #[test]
    fn recent_query_invariants(records in prop::collection::vec(arb_record(), 0..30), limit in 1usize..10) {
        let query = RecordQuery::new()
            .equals(RecordField::Redeemed, true)
            .order_by(RecordField::RedeemedAt, Direction::Descending)
            .limit(limit);
        let results = query.apply(records.iter());

        let redeemed = records.iter().filter(|r| r.is_redeemed()).count();
        prop_assert_eq!(results.len(), redeemed.min(limit));
        prop_assert!(results.iter().all(|r| r.is_redeemed()));
        prop_assert!(results
            .windows(2)
            .all(|w| w[0].redeemed_at() >= w[1].redeemed_at()));
    }

    /// Prefix matches are exactly the records whose field starts with the prefix
    #[test]
    fn prefix_query_matches_exactly(records in prop::collection::vec(arb_record(), 0..30), prefix in "[A-Z]{1,2}") {
        let query = RecordQuery::new().starts_with(RecordField::RollNumber, prefix.clone());
        let results = query.apply(records.iter());

        let expected = records
            .iter()
            .filter(|r| r.roll_num.as_str().starts_with(prefix.as_str()))
            .count();
        prop_assert_eq!(results.len(), expected);
    }
}
