//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use fest_checkin::domain::{AttendeeProfile, FoodPreference};
use fest_checkin::scan::{PayloadCodec, PayloadIssuer, PayloadMode, RedemptionGuard, RedemptionPolicy};
use fest_checkin::{AttendeeRecord, DocumentId, InMemoryRecordStore, RecordStore, RollNumber, ScanController};

/// 32-byte test passphrase (AES-256)
pub const TEST_PASSPHRASE: &str = "test-passphrase-0123456789abcdef";

/// Plain QR text for a roll number
pub fn plain_payload(roll_num: &str) -> String {
    serde_json::json!({ "roll_num": roll_num }).to_string()
}

/// Encrypted QR text for a record
pub fn sealed_payload(doc_id: &str, roll_num: &str) -> String {
    PayloadIssuer::with_passphrase(TEST_PASSPHRASE)
        .unwrap()
        .issue(&DocumentId::from(doc_id), &RollNumber::from(roll_num))
        .unwrap()
}

pub fn attendee(doc_id: &str, roll_num: &str, name: &str) -> AttendeeRecord {
    AttendeeRecord::new(DocumentId::from(doc_id), RollNumber::from(roll_num), name)
        .with_email(format!("{}@smail.iitm.ac.in", roll_num.to_ascii_lowercase()))
        .with_profile(AttendeeProfile::dining(FoodPreference::NonVeg))
}

/// A small roster, all unredeemed
pub fn roster() -> Vec<AttendeeRecord> {
    vec![
        attendee("doc-asha", "CS101", "Asha"),
        attendee("doc-ravi", "CS102", "Ravi"),
        attendee("doc-meera", "ME201", "Meera"),
    ]
}

pub fn memory_store() -> Arc<InMemoryRecordStore> {
    Arc::new(InMemoryRecordStore::with_records(roster()))
}

/// Armed controller accepting both plain and encrypted codes
pub async fn armed_controller(
    store: Arc<dyn RecordStore>,
    policy: RedemptionPolicy,
) -> ScanController {
    let codec = PayloadCodec::with_passphrase(PayloadMode::Auto, TEST_PASSPHRASE).unwrap();
    let controller = ScanController::new(codec, RedemptionGuard::new(store, policy));
    controller.set_camera(true).await;
    controller
}
