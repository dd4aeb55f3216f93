mod common;

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{Value, json};
use warden_core::{
    ManualClock, ViewError, ViewRouter, ViewStateRehydrator,
    views::{LeaveNoticeBlueprint, PersistedView},
};

use common::MemoryViewStore;

#[derive(Debug)]
struct Bot;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).single().expect("valid date")
}

fn leave_menu(id: &str, message_id: u64, expiry: DateTime<Utc>) -> Value {
    json!({
        "_id": {"$oid": id},
        "view_type": "LOAMenu",
        "message_id": message_id,
        "args": [
            "SELF",
            [987654321],
            "123456789",
            {"_id": {"$oid": format!("notice-{id}")}, "expiry": expiry.timestamp()},
        ],
    })
}

fn rehydrator(
    store: Arc<MemoryViewStore>,
    router: Arc<ViewRouter>,
) -> ViewStateRehydrator<Bot> {
    ViewStateRehydrator::new(store, router)
        .with_clock(Arc::new(ManualClock::new(now())))
        .register(Arc::new(LeaveNoticeBlueprint))
}

#[tokio::test]
async fn expired_record_is_deleted_and_not_bound() {
    let store = MemoryViewStore::from_documents(&[leave_menu(
        "expired",
        1001,
        now() - Duration::days(2),
    )]);
    let router = Arc::new(ViewRouter::new());

    let report = rehydrator(store.clone(), router.clone())
        .rehydrate(&Arc::new(Bot))
        .await
        .expect("rehydrate");

    assert_eq!(report.expired, 1);
    assert_eq!(report.restored, 0);
    assert!(router.view_for(1001).is_none());
    assert_eq!(store.deleted.lock().len(), 1);
    assert!(store.ids().is_empty());
}

#[tokio::test]
async fn live_record_is_bound_to_its_message() {
    let store =
        MemoryViewStore::from_documents(&[leave_menu("live", 2002, now() + Duration::days(5))]);
    let router = Arc::new(ViewRouter::new());

    let report = rehydrator(store.clone(), router.clone())
        .rehydrate(&Arc::new(Bot))
        .await
        .expect("rehydrate");

    assert_eq!(report.restored, 1);
    let view = router.view_for(2002).expect("bound view");
    assert_eq!(view.view_type(), "LOAMenu");
    assert!(router.route(2002, "LOAMenu:accept").is_some());
    assert!(router.route(2002, "ShiftMenu:start").is_none());
    assert_eq!(store.ids(), vec!["live"]);
}

#[tokio::test]
async fn unknown_view_type_is_left_alone() {
    let store = MemoryViewStore::from_documents(&[json!({
        "_id": "shift",
        "view_type": "ShiftMenu",
        "message_id": "3003",
        "args": ["SELF", 42],
    })]);
    let router = Arc::new(ViewRouter::new());

    let report = rehydrator(store.clone(), router.clone())
        .rehydrate(&Arc::new(Bot))
        .await
        .expect("unknown types are not an error");

    assert_eq!(report.unknown, 1);
    assert!(report.failed.is_empty());
    assert!(router.is_empty());
    assert_eq!(store.ids(), vec!["shift"]);
    assert!(store.deleted.lock().is_empty());
}

#[tokio::test]
async fn malformed_record_does_not_stop_its_neighbours() {
    let later = now() + Duration::hours(6);
    let store = MemoryViewStore::from_documents(&[
        leave_menu("first", 1, later),
        json!({
            "_id": "second",
            "view_type": "LOAMenu",
            "message_id": 2,
            "args": ["SELF", [1]],
        }),
        leave_menu("third", 3, later),
    ]);
    let router = Arc::new(ViewRouter::new());

    let report = rehydrator(store.clone(), router.clone())
        .rehydrate(&Arc::new(Bot))
        .await
        .expect("rehydrate");

    assert_eq!(report.scanned, 3);
    assert_eq!(report.restored, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id.0, "second");
    assert!(router.view_for(1).is_some());
    assert!(router.view_for(2).is_none());
    assert!(router.view_for(3).is_some());
}

#[tokio::test]
async fn notice_without_object_carries_no_expiry() {
    let store = MemoryViewStore::from_documents(&[json!({
        "_id": "bare",
        "view_type": "LOAMenu",
        "message_id": 77,
        "args": ["SELF", null, "5", "notice-id"],
    })]);
    let router = Arc::new(ViewRouter::new());

    let report = rehydrator(store.clone(), router.clone())
        .rehydrate(&Arc::new(Bot))
        .await
        .expect("rehydrate");

    assert_eq!(report.restored, 1);
    assert!(router.view_for(77).is_some());
}

#[tokio::test]
async fn listing_failure_is_surfaced() {
    let router = Arc::new(ViewRouter::new());

    let err = rehydrator(MemoryViewStore::broken(), router)
        .rehydrate(&Arc::new(Bot))
        .await
        .expect_err("listing fails");

    assert!(matches!(err, ViewError::Store(_)));
}

#[test]
fn owner_sentinel_becomes_owner_slot() {
    let record = PersistedView::from_document(&json!({
        "_id": "x",
        "view_type": "LOAMenu",
        "message_id": 5,
        "args": [1, "SELF", 2],
    }))
    .expect("decode");

    assert_eq!(record.owner_slot, Some(1));
    assert_eq!(record.args, vec![json!(1), json!(2)]);

    let duplicate = PersistedView::from_document(&json!({
        "_id": "y",
        "view_type": "LOAMenu",
        "message_id": 5,
        "args": ["SELF", "SELF"],
    }));
    assert!(matches!(duplicate, Err(ViewError::Malformed { .. })));
}
