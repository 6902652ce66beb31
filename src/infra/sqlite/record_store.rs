//! SQLite record store
//!
//! Local stand-in for the hosted document store. Redemption state is kept in
//! the flat `redeemed` / `redeemed_at` columns; timestamps are fixed-width
//! RFC 3339 UTC strings so text ordering matches time ordering.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqlitePool, SqlitePoolOptions},
    FromRow, QueryBuilder, Sqlite,
};
use tracing::{debug, instrument};

use crate::domain::{
    AttendeeProfile, AttendeeRecord, Direction, DocumentId, FieldValue, Predicate, RecordField,
    RecordKey, RecordQuery, Redemption, RollNumber,
};
use crate::infra::{CheckinError, RecordStore, Result};

const SELECT_COLUMNS: &str = "SELECT doc_id, roll_num, name, email, profile, qr_image_url, \
                              redeemed, redeemed_at FROM attendees";

/// SQLite-backed attendee record store
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Create a new store with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a store from a database URL (e.g. `sqlite://checkin.db?mode=rwc`)
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Open a private in-memory database (single connection so every query sees it)
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    /// Initialize the database schema
    pub async fn initialize(&self) -> Result<()> {
        crate::migrations::run_sqlite(&self.pool)
            .await
            .map_err(|e| CheckinError::Configuration(format!("migration failed: {e}")))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn push_predicate(qb: &mut QueryBuilder<'_, Sqlite>, predicate: &Predicate) {
    match predicate {
        Predicate::Equals(RecordField::Redeemed, FieldValue::Bool(b)) => {
            qb.push("redeemed = ").push_bind(*b);
        }
        Predicate::Equals(RecordField::Redeemed | RecordField::RedeemedAt, _)
        | Predicate::Equals(_, FieldValue::Bool(_)) => {
            qb.push("0 = 1");
        }
        Predicate::Equals(field, FieldValue::Text(value)) => {
            qb.push(field.column()).push(" = ").push_bind(value.clone());
        }
        Predicate::StartsWith(RecordField::Redeemed | RecordField::RedeemedAt, _) => {
            qb.push("0 = 1");
        }
        Predicate::StartsWith(field, prefix) => {
            // substr keeps the match case-sensitive, unlike LIKE
            qb.push("substr(")
                .push(field.column())
                .push(", 1, ")
                .push_bind(prefix.chars().count() as i64)
                .push(") = ")
                .push_bind(prefix.clone());
        }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    #[instrument(skip(self))]
    async fn get_by_id(&self, doc_id: &DocumentId) -> Result<Option<AttendeeRecord>> {
        let row = sqlx::query_as::<_, AttendeeRow>(&format!("{SELECT_COLUMNS} WHERE doc_id = ?"))
            .bind(doc_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(AttendeeRecord::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn set_redemption(&self, doc_id: &DocumentId, redemption: Redemption) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE attendees SET redeemed = ?, redeemed_at = ?
            WHERE doc_id = ?
            "#,
        )
        .bind(redemption.is_redeemed())
        .bind(redemption.redeemed_at().map(encode_timestamp))
        .bind(doc_id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CheckinError::NotFound(RecordKey::Document(doc_id.clone())));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn redeem_if_unredeemed(&self, doc_id: &DocumentId, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE attendees SET redeemed = 1, redeemed_at = ?
            WHERE doc_id = ? AND redeemed = 0
            "#,
        )
        .bind(encode_timestamp(at))
        .bind(doc_id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM attendees WHERE doc_id = ?")
            .bind(doc_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match exists {
            Some(_) => {
                debug!(%doc_id, "conditional redeem lost: already redeemed");
                Ok(false)
            }
            None => Err(CheckinError::NotFound(RecordKey::Document(doc_id.clone()))),
        }
    }

    #[instrument(skip(self))]
    async fn query(&self, query: &RecordQuery) -> Result<Vec<AttendeeRecord>> {
        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);

        for (i, predicate) in query.predicates.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            push_predicate(&mut qb, predicate);
        }

        match &query.order_by {
            Some(order) => {
                qb.push(" ORDER BY ").push(order.field.column());
                qb.push(match order.direction {
                    Direction::Ascending => " ASC",
                    Direction::Descending => " DESC",
                });
                qb.push(", doc_id ASC");
            }
            None => {
                qb.push(" ORDER BY doc_id ASC");
            }
        }

        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = qb
            .build_query_as::<AttendeeRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(AttendeeRecord::try_from).collect()
    }

    #[instrument(skip(self, record), fields(doc_id = %record.doc_id))]
    async fn put(&self, record: AttendeeRecord) -> Result<()> {
        let record = record.normalized();
        let profile_json = record
            .profile
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| CheckinError::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO attendees (
                doc_id, roll_num, name, email, profile, qr_image_url, redeemed, redeemed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(doc_id) DO UPDATE SET
                roll_num = excluded.roll_num,
                name = excluded.name,
                email = excluded.email,
                profile = excluded.profile,
                qr_image_url = excluded.qr_image_url,
                redeemed = excluded.redeemed,
                redeemed_at = excluded.redeemed_at
            "#,
        )
        .bind(record.doc_id.as_str())
        .bind(record.roll_num.as_str())
        .bind(&record.name)
        .bind(&record.email)
        .bind(&profile_json)
        .bind(&record.qr_image_url)
        .bind(record.is_redeemed())
        .bind(record.redeemed_at().map(encode_timestamp))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Raw row from the attendees table
#[derive(Debug, FromRow)]
struct AttendeeRow {
    doc_id: String,
    roll_num: String,
    name: String,
    email: Option<String>,
    profile: Option<String>,
    qr_image_url: Option<String>,
    redeemed: bool,
    redeemed_at: Option<String>,
}

impl TryFrom<AttendeeRow> for AttendeeRecord {
    type Error = CheckinError;

    fn try_from(row: AttendeeRow) -> Result<Self> {
        let profile = row
            .profile
            .map(|s| serde_json::from_str::<AttendeeProfile>(&s))
            .transpose()
            .map_err(|e| CheckinError::Internal(format!("Invalid profile JSON: {}", e)))?;

        let redeemed_at = row
            .redeemed_at
            .map(|s| DateTime::parse_from_rfc3339(&s))
            .transpose()
            .map_err(|e| CheckinError::Internal(format!("Invalid redeemed_at: {}", e)))?
            .map(|dt| dt.with_timezone(&Utc));

        let redemption = Redemption::from_parts(row.redeemed, redeemed_at)
            .map_err(|e| CheckinError::Internal(format!("Corrupt record {}: {}", row.doc_id, e)))?;

        Ok(AttendeeRecord {
            doc_id: DocumentId(row.doc_id),
            roll_num: RollNumber(row.roll_num),
            name: row.name,
            email: row.email,
            profile,
            qr_image_url: row.qr_image_url,
            redemption,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FoodPreference;

    async fn store() -> SqliteRecordStore {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        store.initialize().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_put_and_get_roundtrip() {
        let store = store().await;
        let record = AttendeeRecord::new(DocumentId::from("d1"), RollNumber::from("CS101"), "Asha")
            .with_email("cs101@smail.iitm.ac.in")
            .with_profile(AttendeeProfile::dining(FoodPreference::Veg));

        store.put(record.clone()).await.unwrap();
        let loaded = store.get_by_id(&DocumentId::from("d1")).await.unwrap();
        assert_eq!(loaded, Some(record));
    }

    #[tokio::test]
    async fn test_conditional_redeem() {
        let store = store().await;
        store
            .put(AttendeeRecord::new(
                DocumentId::from("d1"),
                RollNumber::from("CS101"),
                "Asha",
            ))
            .await
            .unwrap();

        let doc = DocumentId::from("d1");
        assert!(store.redeem_if_unredeemed(&doc, Utc::now()).await.unwrap());
        assert!(!store.redeem_if_unredeemed(&doc, Utc::now()).await.unwrap());

        let missing = store
            .redeem_if_unredeemed(&DocumentId::from("nope"), Utc::now())
            .await;
        assert!(matches!(missing, Err(CheckinError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_prefix_is_case_sensitive() {
        let store = store().await;
        store
            .put(AttendeeRecord::new(
                DocumentId::from("d1"),
                RollNumber::from("CS101"),
                "Asha",
            ))
            .await
            .unwrap();

        let upper = RecordQuery::new().starts_with(RecordField::RollNumber, "CS");
        let lower = RecordQuery::new().starts_with(RecordField::RollNumber, "cs");
        assert_eq!(store.query(&upper).await.unwrap().len(), 1);
        assert!(store.query(&lower).await.unwrap().is_empty());
    }
}
