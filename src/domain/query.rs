//! Record queries: equality and prefix predicates, ordering, limit.

use std::cmp::Ordering;

use super::record::AttendeeRecord;

/// Queryable attendee fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    Name,
    RollNumber,
    Email,
    Redeemed,
    RedeemedAt,
}

impl RecordField {
    /// Storage column name
    pub fn column(&self) -> &'static str {
        match self {
            RecordField::Name => "name",
            RecordField::RollNumber => "roll_num",
            RecordField::Email => "email",
            RecordField::Redeemed => "redeemed",
            RecordField::RedeemedAt => "redeemed_at",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Equals(RecordField, FieldValue),
    /// Case-sensitive prefix match on a text field
    StartsWith(RecordField, String),
}

impl Predicate {
    pub fn matches(&self, record: &AttendeeRecord) -> bool {
        match self {
            Predicate::Equals(RecordField::Redeemed, FieldValue::Bool(b)) => {
                record.is_redeemed() == *b
            }
            Predicate::Equals(field, FieldValue::Text(expected)) => {
                text_field(record, *field).is_some_and(|v| v == expected)
            }
            Predicate::Equals(_, FieldValue::Bool(_)) => false,
            Predicate::StartsWith(field, prefix) => {
                text_field(record, *field).is_some_and(|v| v.starts_with(prefix.as_str()))
            }
        }
    }
}

fn text_field(record: &AttendeeRecord, field: RecordField) -> Option<&str> {
    match field {
        RecordField::Name => Some(record.name.as_str()),
        RecordField::RollNumber => Some(record.roll_num.as_str()),
        RecordField::Email => record.email.as_deref(),
        RecordField::Redeemed | RecordField::RedeemedAt => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: RecordField,
    pub direction: Direction,
}

impl OrderBy {
    pub fn compare(&self, a: &AttendeeRecord, b: &AttendeeRecord) -> Ordering {
        let ord = match self.field {
            RecordField::Name => a.name.cmp(&b.name),
            RecordField::RollNumber => a.roll_num.cmp(&b.roll_num),
            RecordField::Email => a.email.cmp(&b.email),
            RecordField::Redeemed => a.is_redeemed().cmp(&b.is_redeemed()),
            RecordField::RedeemedAt => a.redeemed_at().cmp(&b.redeemed_at()),
        };
        let ord = match self.direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        };
        ord.then_with(|| a.doc_id.cmp(&b.doc_id))
    }
}

/// Conjunction of predicates with optional ordering and limit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub predicates: Vec<Predicate>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equals(mut self, field: RecordField, value: impl Into<FieldValue>) -> Self {
        self.predicates.push(Predicate::Equals(field, value.into()));
        self
    }

    pub fn starts_with(mut self, field: RecordField, prefix: impl Into<String>) -> Self {
        self.predicates
            .push(Predicate::StartsWith(field, prefix.into()));
        self
    }

    pub fn order_by(mut self, field: RecordField, direction: Direction) -> Self {
        self.order_by = Some(OrderBy { field, direction });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &AttendeeRecord) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }

    /// Evaluate the query over an in-memory set of records
    pub fn apply<'a, I>(&self, records: I) -> Vec<AttendeeRecord>
    where
        I: IntoIterator<Item = &'a AttendeeRecord>,
    {
        let mut matched: Vec<AttendeeRecord> = records
            .into_iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect();

        match &self.order_by {
            Some(order) => matched.sort_by(|a, b| order.compare(a, b)),
            None => matched.sort_by(|a, b| a.doc_id.cmp(&b.doc_id)),
        }

        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentId, Redemption, RollNumber};
    use chrono::{Duration, Utc};

    fn record(doc: &str, roll: &str, name: &str) -> AttendeeRecord {
        AttendeeRecord::new(DocumentId::from(doc), RollNumber::from(roll), name)
    }

    #[test]
    fn test_prefix_and_equality() {
        let records = vec![
            record("1", "CS101", "Asha").with_email("cs101@smail.iitm.ac.in"),
            record("2", "CS102", "Arjun"),
            record("3", "EE201", "Bala"),
        ];

        let by_name = RecordQuery::new()
            .starts_with(RecordField::Name, "A")
            .apply(&records);
        assert_eq!(by_name.len(), 2);

        let by_email = RecordQuery::new()
            .equals(RecordField::Email, "cs101@smail.iitm.ac.in")
            .apply(&records);
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].doc_id, DocumentId::from("1"));
    }

    #[test]
    fn test_order_and_limit() {
        let now = Utc::now();
        let mut records = Vec::new();
        for i in 0..4 {
            let mut r = record(&i.to_string(), &format!("R{i}"), "x");
            r.redemption = Redemption::Redeemed {
                at: now - Duration::minutes(i),
            };
            records.push(r);
        }
        records.push(record("9", "R9", "y"));

        let recent = RecordQuery::new()
            .equals(RecordField::Redeemed, true)
            .order_by(RecordField::RedeemedAt, Direction::Descending)
            .limit(2)
            .apply(&records);

        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].doc_id, DocumentId::from("0"));
        assert_eq!(recent[1].doc_id, DocumentId::from("1"));
    }
}
