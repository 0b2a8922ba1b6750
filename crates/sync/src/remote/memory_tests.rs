// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use futures_util::StreamExt;
use mk_core::ManualClock;
use serde_json::json;
use yare::parameterized;

fn store_at(ms: i64) -> MemoryRemoteStore {
    MemoryRemoteStore::with_clock(Arc::new(ManualClock::new(ms)))
}

fn request(id: Option<&str>, fields: serde_json::Value, updated_at: i64) -> UpsertRequest {
    UpsertRequest {
        entity_type: EntityType::Expense,
        id: id.map(str::to_string),
        group_id: "g1".to_string(),
        natural_key: None,
        fields,
        updated_at,
    }
}

#[tokio::test]
async fn upsert_creates_document_with_given_id() {
    let store = store_at(0);
    let ack = store.upsert(request(Some("e1"), json!({"amount": 500}), 100)).await.unwrap();

    assert_eq!(ack, UpsertAck { id: "e1".to_string(), updated_at: 100 });
    let doc = store.get(EntityType::Expense, "e1").unwrap();
    assert_eq!(doc.fields, json!({"amount": 500}));
    assert_eq!(doc.group_id, "g1");
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn upsert_without_id_assigns_one() {
    let store = store_at(0);
    let ack = store.upsert(request(None, json!({}), 1)).await.unwrap();
    assert!(!ack.id.is_empty());
    assert!(store.get(EntityType::Expense, &ack.id).is_some());
}

#[tokio::test]
async fn replayed_upsert_does_not_duplicate() {
    let store = store_at(0);
    store.upsert(request(Some("e1"), json!({"amount": 500}), 100)).await.unwrap();
    store.upsert(request(Some("e1"), json!({"amount": 500}), 100)).await.unwrap();

    assert_eq!(store.documents(EntityType::Expense).len(), 1);
}

#[tokio::test]
async fn upsert_merges_fields() {
    let store = store_at(0);
    store.upsert(request(Some("e1"), json!({"amount": 500, "title": "rice"}), 100)).await.unwrap();
    store.upsert(request(Some("e1"), json!({"amount": 650}), 200)).await.unwrap();

    let doc = store.get(EntityType::Expense, "e1").unwrap();
    assert_eq!(doc.fields, json!({"amount": 650, "title": "rice"}));
    assert_eq!(doc.updated_at, 200);
}

#[parameterized(
    newer = { 100, 200, 200 },
    stale = { 200, 100, 201 },
    equal = { 100, 100, 101 },
)]
fn accepted_timestamps_only_grow(first: i64, second: i64, expected: i64) {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    rt.block_on(async {
        let store = store_at(0);
        store.upsert(request(Some("a"), json!({}), first)).await.unwrap();
        let ack = store.upsert(request(Some("b"), json!({}), second)).await.unwrap();
        assert_eq!(ack.updated_at, expected);
    });
}

#[tokio::test]
async fn delete_leaves_tombstone() {
    let store = store_at(0);
    store.upsert(request(Some("e1"), json!({"amount": 1}), 100)).await.unwrap();
    store.delete(EntityType::Expense, "e1", 150).await.unwrap();

    let doc = store.get(EntityType::Expense, "e1").unwrap();
    assert!(doc.deleted);
    assert_eq!(doc.updated_at, 150);
    assert!(store.documents(EntityType::Expense).is_empty());
}

#[tokio::test]
async fn delete_missing_document_succeeds() {
    let store = store_at(0);
    store.delete(EntityType::Expense, "nope", 10).await.unwrap();
    store.upsert(request(Some("e1"), json!({}), 100)).await.unwrap();
    store.delete(EntityType::Expense, "e1", 150).await.unwrap();
    store.delete(EntityType::Expense, "e1", 160).await.unwrap();

    assert_eq!(store.write_count(), 2);
}

#[tokio::test]
async fn upsert_revives_tombstone_with_fresh_fields() {
    let store = store_at(0);
    store.upsert(request(Some("e1"), json!({"amount": 1, "note": "old"}), 100)).await.unwrap();
    store.delete(EntityType::Expense, "e1", 150).await.unwrap();
    store.upsert(request(Some("e1"), json!({"amount": 2}), 200)).await.unwrap();

    let doc = store.get(EntityType::Expense, "e1").unwrap();
    assert!(!doc.deleted);
    assert_eq!(doc.fields, json!({"amount": 2}));
}

#[tokio::test]
async fn query_since_and_filter() {
    let store = store_at(0);
    store.upsert(request(Some("e1"), json!({}), 100)).await.unwrap();
    store.upsert(request(Some("e2"), json!({}), 200)).await.unwrap();
    let mut other = request(Some("e3"), json!({}), 300);
    other.group_id = "g2".to_string();
    store.upsert(other).await.unwrap();

    let all = store.query(EntityType::Expense, &DocumentFilter::default(), None).await.unwrap();
    assert_eq!(all.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), ["e1", "e2", "e3"]);

    let recent =
        store.query(EntityType::Expense, &DocumentFilter::group("g1"), Some(100)).await.unwrap();
    assert_eq!(recent.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), ["e2"]);

    let meals = store.query(EntityType::Meal, &DocumentFilter::default(), None).await.unwrap();
    assert!(meals.is_empty());
}

#[parameterized(
    offline = { false, true, RemoteError::Unavailable("offline".into()) },
    signed_out = { true, false, RemoteError::Unauthenticated },
)]
fn unreachable_store_rejects_requests(online: bool, authenticated: bool, expected: RemoteError) {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    rt.block_on(async {
        let store = store_at(0);
        store.set_online(online);
        store.set_authenticated(authenticated);

        let err = store.upsert(request(Some("e1"), json!({}), 1)).await.unwrap_err();
        assert_eq!(err, expected);
        assert_eq!(store.write_count(), 0);
    });
}

#[tokio::test]
async fn injected_failures_apply_in_order() {
    let store = store_at(0);
    store.fail_next(RemoteError::Timeout);
    store.fail_next(RemoteError::Rejected("bad".into()));

    assert_eq!(store.upsert(request(Some("e1"), json!({}), 1)).await.unwrap_err(), RemoteError::Timeout);
    assert!(matches!(
        store.upsert(request(Some("e1"), json!({}), 1)).await.unwrap_err(),
        RemoteError::Rejected(_)
    ));
    store.upsert(request(Some("e1"), json!({}), 1)).await.unwrap();
}

#[tokio::test]
async fn subscribe_sends_snapshot_then_changes() {
    let store = store_at(0);
    store.upsert(request(Some("e1"), json!({}), 100)).await.unwrap();

    let mut stream = store.subscribe(EntityType::Expense, &DocumentFilter::group("g1")).await.unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.len(), 1);

    let mut other_group = request(Some("x"), json!({}), 150);
    other_group.group_id = "g2".to_string();
    store.upsert(other_group).await.unwrap();
    store.upsert(request(Some("e2"), json!({}), 200)).await.unwrap();

    let next = stream.next().await.unwrap().unwrap();
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].id, "e2");
}

#[tokio::test]
async fn put_document_keeps_its_timestamp() {
    let store = store_at(0);
    store.put_document(RemoteDocument {
        id: "m1".to_string(),
        entity_type: EntityType::Meal,
        group_id: "g1".to_string(),
        natural_key: None,
        fields: json!({"lunch": 1}),
        updated_at: 500,
        deleted: false,
    });

    assert_eq!(store.get(EntityType::Meal, "m1").unwrap().updated_at, 500);
    let ack = store.upsert(request(Some("e1"), json!({}), 10)).await.unwrap();
    assert_eq!(ack.updated_at, 501);
}

#[tokio::test(start_paused = true)]
async fn latency_delays_requests() {
    let store = store_at(0);
    store.set_latency(Some(Duration::from_secs(10)));

    let result = tokio::time::timeout(
        Duration::from_secs(1),
        store.upsert(request(Some("e1"), json!({}), 1)),
    )
    .await;
    assert!(result.is_err());
    assert_eq!(store.write_count(), 0);
}
