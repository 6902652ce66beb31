//! Decoded scan payloads.

use serde::{Deserialize, Serialize};

use super::types::{DocumentId, RollNumber};

/// Identity carried by one scanned code, resolved once at decode time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPayload {
    /// Plain JSON code carrying only the attendee's roll number
    Plain { roll_num: RollNumber },
    /// Decrypted envelope carrying the store document id as well
    Sealed {
        doc_id: DocumentId,
        roll_num: RollNumber,
    },
}

impl ScanPayload {
    pub fn roll_num(&self) -> &RollNumber {
        match self {
            ScanPayload::Plain { roll_num } | ScanPayload::Sealed { roll_num, .. } => roll_num,
        }
    }

    /// Key the redemption guard should look the record up by
    pub fn record_key(&self) -> RecordKey {
        match self {
            ScanPayload::Plain { roll_num } => RecordKey::RollNumber(roll_num.clone()),
            ScanPayload::Sealed { doc_id, .. } => RecordKey::Document(doc_id.clone()),
        }
    }
}

/// How a record is addressed in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Document(DocumentId),
    RollNumber(RollNumber),
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKey::Document(id) => write!(f, "doc:{id}"),
            RecordKey::RollNumber(roll) => write!(f, "roll:{roll}"),
        }
    }
}

/// Plaintext sealed inside an encrypted code.
///
/// Extra fields written by the issuing side are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedIdentity {
    pub doc_id: String,
    pub roll_num: String,
}

impl SealedIdentity {
    pub fn new(doc_id: &DocumentId, roll_num: &RollNumber) -> Self {
        Self {
            doc_id: doc_id.0.clone(),
            roll_num: roll_num.0.clone(),
        }
    }
}
