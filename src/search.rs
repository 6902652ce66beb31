//! Admin lookup and manual redemption control

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::domain::{
    redemption_timestamp, AttendeeRecord, Direction, DocumentId, RecordField, RecordKey, RecordQuery, Redemption,
};
use crate::infra::{CheckinError, RecordStore, Result};
use crate::metrics::{metric_names, MetricsRegistry};

/// Size of the "recently redeemed" list
pub const RECENT_LIMIT: usize = 5;

pub struct AdminSearch {
    store: Arc<dyn RecordStore>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl AdminSearch {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Records whose name starts with `term`, or whose roll number starts
    /// with `term` upper-cased. Name matches come first; each record appears
    /// once. A blank term matches nothing.
    #[instrument(skip(self))]
    pub async fn search(&self, term: &str) -> Result<Vec<AttendeeRecord>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(metrics) = &self.metrics {
            metrics.inc_counter(metric_names::SEARCHES).await;
        }

        let by_name = RecordQuery::new().starts_with(RecordField::Name, term);
        let by_roll = RecordQuery::new().starts_with(RecordField::RollNumber, term.to_uppercase());

        let (names, rolls) = tokio::try_join!(self.store.query(&by_name), self.store.query(&by_roll))?;

        let mut seen = HashSet::new();
        Ok(names
            .into_iter()
            .chain(rolls)
            .filter(|r| seen.insert(r.doc_id.clone()))
            .collect())
    }

    /// Most recently redeemed records, newest first
    pub async fn recent(&self) -> Result<Vec<AttendeeRecord>> {
        let query = RecordQuery::new()
            .equals(RecordField::Redeemed, true)
            .order_by(RecordField::RedeemedAt, Direction::Descending)
            .limit(RECENT_LIMIT);
        self.store.query(&query).await
    }

    /// Flip a record's redemption state. Setting it stamps the current time;
    /// clearing it drops the timestamp.
    pub async fn toggle(&self, doc_id: &DocumentId) -> Result<AttendeeRecord> {
        let record = self
            .store
            .get_by_id(doc_id)
            .await?
            .ok_or_else(|| CheckinError::NotFound(RecordKey::Document(doc_id.clone())))?;
        let redeem = !record.is_redeemed();
        self.apply(record, redeem).await
    }

    /// Force a record's redemption state
    pub async fn set_redeemed(&self, doc_id: &DocumentId, redeemed: bool) -> Result<AttendeeRecord> {
        let record = self
            .store
            .get_by_id(doc_id)
            .await?
            .ok_or_else(|| CheckinError::NotFound(RecordKey::Document(doc_id.clone())))?;
        if record.is_redeemed() == redeemed {
            return Ok(record);
        }
        self.apply(record, redeemed).await
    }

    async fn apply(&self, record: AttendeeRecord, redeemed: bool) -> Result<AttendeeRecord> {
        let redemption = if redeemed {
            Redemption::Redeemed { at: redemption_timestamp() }
        } else {
            Redemption::Unredeemed
        };
        self.store
            .set_redemption(&record.doc_id, redemption)
            .await?;

        if let Some(metrics) = &self.metrics {
            metrics.inc_counter(metric_names::TOGGLES).await;
        }
        info!(doc_id = %record.doc_id, redeemed, "redemption set manually");

        Ok(AttendeeRecord {
            redemption,
            ..record
        })
    }
}
