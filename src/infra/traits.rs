//! Trait definitions for the external record store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use crate::domain::{
    AttendeeRecord, DocumentId, RecordField, RecordKey, RecordQuery, Redemption, RollNumber,
};

use super::Result;

/// Document store holding attendee records.
///
/// Only the narrow surface the check-in flows need: keyed reads, redemption
/// updates and simple queries.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read a record by document id
    async fn get_by_id(&self, doc_id: &DocumentId) -> Result<Option<AttendeeRecord>>;

    /// Overwrite the redemption fields of a record.
    ///
    /// Fails with `NotFound` if the document does not exist.
    async fn set_redemption(&self, doc_id: &DocumentId, redemption: Redemption) -> Result<()>;

    /// Mark redeemed at `at` only if the record is currently unredeemed.
    ///
    /// Returns `false` when the record was already redeemed and nothing was
    /// written. Fails with `NotFound` if the document does not exist.
    async fn redeem_if_unredeemed(&self, doc_id: &DocumentId, at: DateTime<Utc>) -> Result<bool>;

    /// Run a query, returning matching records in query order
    async fn query(&self, query: &RecordQuery) -> Result<Vec<AttendeeRecord>>;

    /// Insert or replace a record
    async fn put(&self, record: AttendeeRecord) -> Result<()>;

    /// Read a record by roll number
    async fn find_by_roll_number(&self, roll_num: &RollNumber) -> Result<Option<AttendeeRecord>> {
        let query = RecordQuery::new()
            .equals(RecordField::RollNumber, roll_num.as_str())
            .limit(1);
        Ok(self.query(&query).await?.into_iter().next())
    }

    /// Read a record by either addressing scheme
    async fn get(&self, key: &RecordKey) -> Result<Option<AttendeeRecord>> {
        match key {
            RecordKey::Document(doc_id) => self.get_by_id(doc_id).await,
            RecordKey::RollNumber(roll_num) => self.find_by_roll_number(roll_num).await,
        }
    }
}
