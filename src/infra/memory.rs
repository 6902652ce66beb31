//! In-memory record store for development, demos and tests

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{AttendeeRecord, DocumentId, RecordKey, RecordQuery, Redemption};

use super::{CheckinError, RecordStore, Result};

/// Record store backed by a map. Each call is atomic with respect to the
/// others, so `redeem_if_unredeemed` is a true compare-and-set.
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<DocumentId, AttendeeRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Create with pre-loaded records (for testing)
    pub fn with_records(records: Vec<AttendeeRecord>) -> Self {
        let map = records
            .into_iter()
            .map(AttendeeRecord::normalized)
            .map(|r| (r.doc_id.clone(), r))
            .collect();
        Self {
            records: RwLock::new(map),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get_by_id(&self, doc_id: &DocumentId) -> Result<Option<AttendeeRecord>> {
        Ok(self.records.read().await.get(doc_id).cloned())
    }

    async fn set_redemption(&self, doc_id: &DocumentId, redemption: Redemption) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(doc_id)
            .ok_or_else(|| CheckinError::NotFound(RecordKey::Document(doc_id.clone())))?;
        record.redemption = redemption;
        Ok(())
    }

    async fn redeem_if_unredeemed(&self, doc_id: &DocumentId, at: DateTime<Utc>) -> Result<bool> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(doc_id)
            .ok_or_else(|| CheckinError::NotFound(RecordKey::Document(doc_id.clone())))?;

        if record.is_redeemed() {
            return Ok(false);
        }
        record.redemption = Redemption::Redeemed { at };
        Ok(true)
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<AttendeeRecord>> {
        let records = self.records.read().await;
        Ok(query.apply(records.values()))
    }

    async fn put(&self, record: AttendeeRecord) -> Result<()> {
        let record = record.normalized();
        self.records
            .write()
            .await
            .insert(record.doc_id.clone(), record);
        Ok(())
    }
}
