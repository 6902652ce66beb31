//! SQLite store integration tests
//!
//! Runs the scan, search and admin flows against an in-memory SQLite
//! database with the real migrations applied.

mod common;

use std::sync::Arc;
use std::time::Duration;

use fest_checkin::domain::{Direction, RecordField, RecordQuery};
use fest_checkin::scan::{RedemptionGuard, RedemptionPolicy};
use fest_checkin::search::AdminSearch;
use fest_checkin::{CheckinError, DocumentId, RecordStore, RollNumber, ScanOutcome, SqliteRecordStore};

use common::*;

async fn seeded_store() -> Arc<SqliteRecordStore> {
    let store = SqliteRecordStore::in_memory().await.unwrap();
    store.initialize().await.unwrap();
    for record in roster() {
        store.put(record).await.unwrap();
    }
    Arc::new(store)
}

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let store = seeded_store().await;
    store.initialize().await.unwrap();

    let all = store.query(&RecordQuery::new()).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_find_by_roll_number() {
    let store = seeded_store().await;

    let found = store
        .find_by_roll_number(&RollNumber::from("ME201"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.doc_id.as_str(), "doc-meera");

    let missing = store
        .find_by_roll_number(&RollNumber::from("XX999"))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_scan_redeems_and_persists_timestamp() {
    let store = seeded_store().await;
    let controller = armed_controller(store.clone(), RedemptionPolicy::CheckThenSet).await;

    let outcome = controller.on_scan(&plain_payload("CS102")).await.unwrap();
    let ScanOutcome::Success { record } = outcome else {
        panic!("expected success, got {outcome:?}");
    };

    let stored = store
        .get_by_id(&DocumentId::from("doc-ravi"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.redeemed_at(), record.redeemed_at());
}

#[tokio::test]
async fn test_guard_replay_reports_stored_timestamp() {
    let store = seeded_store().await;
    let guard = RedemptionGuard::new(store.clone(), RedemptionPolicy::Conditional);
    let key = fest_checkin::domain::RecordKey::Document(DocumentId::from("doc-asha"));

    let first = guard.redeem(&key).await.unwrap();
    match guard.redeem(&key).await {
        Err(CheckinError::AlreadyRedeemed { name, redeemed_at }) => {
            assert_eq!(name, "Asha");
            assert_eq!(redeemed_at, first.redeemed_at());
        }
        other => panic!("expected AlreadyRedeemed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_search_merges_name_and_roll_matches() {
    let store = seeded_store().await;
    let search = AdminSearch::new(store);

    let by_roll = search.search("cs1").await.unwrap();
    let mut rolls: Vec<_> = by_roll.iter().map(|r| r.roll_num.as_str()).collect();
    rolls.sort_unstable();
    assert_eq!(rolls, vec!["CS101", "CS102"]);

    let by_name = search.search("Mee").await.unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].name, "Meera");

    assert!(search.search("").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_recent_lists_newest_first() {
    let store = seeded_store().await;
    let search = AdminSearch::new(store.clone());

    search.set_redeemed(&DocumentId::from("doc-asha"), true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    search.set_redeemed(&DocumentId::from("doc-meera"), true).await.unwrap();

    let recent = search.recent().await.unwrap();
    let names: Vec<_> = recent.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Meera", "Asha"]);

    let ordered = store
        .query(
            &RecordQuery::new()
                .equals(RecordField::Redeemed, true)
                .order_by(RecordField::RedeemedAt, Direction::Descending)
                .limit(1),
        )
        .await
        .unwrap();
    assert_eq!(ordered[0].name, "Meera");
}

#[tokio::test]
async fn test_toggle_round_trip_clears_timestamp() {
    let store = seeded_store().await;
    let search = AdminSearch::new(store.clone());
    let doc = DocumentId::from("doc-ravi");

    let on = search.toggle(&doc).await.unwrap();
    assert!(on.is_redeemed());
    assert!(on.redeemed_at().is_some());

    let off = search.toggle(&doc).await.unwrap();
    assert!(!off.is_redeemed());

    let stored = store.get_by_id(&doc).await.unwrap().unwrap();
    assert!(!stored.is_redeemed());
    assert_eq!(stored.redeemed_at(), None);
}

#[tokio::test]
async fn test_toggle_unknown_document_fails() {
    let search = AdminSearch::new(seeded_store().await);
    let result = search.toggle(&DocumentId::from("doc-nobody")).await;
    assert!(matches!(result, Err(CheckinError::NotFound(_))));
}

#[tokio::test]
async fn test_conditional_policy_two_guards_single_winner() {
    let store = seeded_store().await;
    let a = RedemptionGuard::new(store.clone(), RedemptionPolicy::Conditional);
    let b = RedemptionGuard::new(store.clone(), RedemptionPolicy::Conditional);
    let key = fest_checkin::domain::RecordKey::RollNumber(RollNumber::from("CS101"));

    let (first, second) = tokio::join!(a.redeem(&key), b.redeem(&key));
    let wins = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!([first, second]
        .into_iter()
        .any(|r| matches!(r, Err(CheckinError::AlreadyRedeemed { .. }))));
}

#[tokio::test]
async fn test_seeded_mixed_case_email_found_by_portal() {
    use fest_checkin::auth::{Credentials, LocalIdentityProvider};
    use fest_checkin::domain::parse_roster;
    use fest_checkin::portal::StudentPortal;

    let store = Arc::new(SqliteRecordStore::in_memory().await.unwrap());
    store.initialize().await.unwrap();
    let roster = parse_roster(
        r#"[{"roll_num": "CS22B001", "name": "Kiran", "email": "CS22B001@smail.iitm.ac.in"}]"#,
    )
    .unwrap();
    for record in roster {
        store.put(record).await.unwrap();
    }

    let identity = Arc::new(LocalIdentityProvider::new().allow_federated("google"));
    let portal = StudentPortal::new(identity, store, "smail.iitm.ac.in");
    let view = portal
        .sign_in(Credentials::federated("google", "cs22b001@smail.iitm.ac.in"))
        .await
        .unwrap();
    assert_eq!(view.record.name, "Kiran");
    assert_eq!(view.record.doc_id.as_str().len(), 20);
}
