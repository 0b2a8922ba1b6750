// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use super::*;
use serde_json::json;
use yare::parameterized;

const MAX_RETRY: u32 = 5;

fn record(local_id: &str, remote_id: Option<&str>, updated_at: i64) -> SyncableRecord {
    SyncableRecord {
        local_id: local_id.to_string(),
        remote_id: remote_id.map(str::to_string),
        entity_type: EntityType::Expense,
        group_id: "g1".to_string(),
        natural_key: None,
        payload: json!({"amount": updated_at}),
        updated_at,
        sync_status: SyncStatus::PendingUpload,
        pending_action: Some(Operation::Create),
    }
}

fn enqueue(db: &Database, op: Operation, rec: &SyncableRecord, at: i64) -> EnqueueOutcome {
    db.upsert_record(rec).unwrap();
    db.enqueue(&Intent::for_record(op, rec, at).unwrap()).unwrap()
}

fn queued_id(outcome: EnqueueOutcome) -> i64 {
    match outcome {
        EnqueueOutcome::Queued(id) => id,
        EnqueueOutcome::Cancelled => panic!("expected a queued item"),
    }
}

#[test]
fn enqueue_creates_pending_item() {
    let db = Database::open_in_memory().unwrap();
    let id = queued_id(enqueue(&db, Operation::Create, &record("e1", None, 10), 10));

    let item = db.get_queue_item(id).unwrap();
    assert_eq!(item.operation, Operation::Create);
    assert_eq!(item.entity_id, "e1");
    assert_eq!(item.status, QueueStatus::Pending);
    assert_eq!(item.retry_count, 0);
    assert_eq!(item.snapshot().unwrap().updated_at, 10);
    assert_eq!(db.pending_count().unwrap(), 1);
    assert!(db.has_pending().unwrap());
}

#[test]
fn update_over_unuploaded_create_stays_create() {
    let db = Database::open_in_memory().unwrap();
    enqueue(&db, Operation::Create, &record("e1", None, 10), 10);
    let id = queued_id(enqueue(&db, Operation::Update, &record("e1", None, 20), 20));

    let queue = db.list_queue().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, id);
    assert_eq!(queue[0].operation, Operation::Create);
    assert_eq!(queue[0].enqueued_at, 20);
    assert_eq!(queue[0].snapshot().unwrap().updated_at, 20);
}

#[test]
fn update_over_uploaded_create_becomes_update() {
    let db = Database::open_in_memory().unwrap();
    enqueue(&db, Operation::Create, &record("e1", Some("r1"), 10), 10);
    enqueue(&db, Operation::Update, &record("e1", Some("r1"), 20), 20);

    let queue = db.list_queue().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].operation, Operation::Update);
    assert_eq!(queue[0].remote_id.as_deref(), Some("r1"));
}

#[test]
fn remote_id_carries_over_from_prior_intent() {
    let db = Database::open_in_memory().unwrap();
    let id = queued_id(enqueue(&db, Operation::Update, &record("e1", None, 10), 10));
    db.conn
        .execute("UPDATE sync_queue SET remote_id = 'r1' WHERE id = ?1", [id])
        .unwrap();

    enqueue(&db, Operation::Update, &record("e1", None, 20), 20);
    let item = db.queued_item_for(EntityType::Expense, "e1").unwrap().unwrap();
    assert_eq!(item.remote_id.as_deref(), Some("r1"));
}

#[test]
fn delete_over_unuploaded_create_cancels() {
    let db = Database::open_in_memory().unwrap();
    enqueue(&db, Operation::Create, &record("e1", None, 10), 10);
    enqueue(&db, Operation::Update, &record("e1", None, 11), 11);
    let outcome = enqueue(&db, Operation::Delete, &record("e1", None, 12), 12);

    assert_eq!(outcome, EnqueueOutcome::Cancelled);
    assert!(db.list_queue().unwrap().is_empty());
    assert_eq!(db.pending_count().unwrap(), 0);
}

#[test]
fn delete_over_update_becomes_single_delete() {
    let db = Database::open_in_memory().unwrap();
    enqueue(&db, Operation::Update, &record("e1", Some("r1"), 10), 10);
    enqueue(&db, Operation::Delete, &record("e1", Some("r1"), 11), 11);

    let queue = db.list_queue().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].operation, Operation::Delete);
    assert_eq!(queue[0].remote_id.as_deref(), Some("r1"));
}

#[test]
fn delete_over_in_flight_create_targets_local_id() {
    let db = Database::open_in_memory().unwrap();
    let id = queued_id(enqueue(&db, Operation::Create, &record("e1", None, 10), 10));
    assert!(db.mark_processing(id).unwrap());

    enqueue(&db, Operation::Delete, &record("e1", None, 11), 11);

    let queue = db.list_queue().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].operation, Operation::Delete);
    assert_eq!(queue[0].remote_id.as_deref(), Some("e1"));
}

#[test]
fn dequeue_batch_is_fifo_and_filters() {
    let db = Database::open_in_memory().unwrap();
    enqueue(&db, Operation::Create, &record("late", None, 30), 30);
    enqueue(&db, Operation::Create, &record("early", None, 10), 10);
    let mut meal = record("meal", None, 20);
    meal.entity_type = EntityType::Meal;
    enqueue(&db, Operation::Create, &meal, 20);

    let ids: Vec<_> = db
        .dequeue_batch(MAX_RETRY, None)
        .unwrap()
        .into_iter()
        .map(|i| i.entity_id)
        .collect();
    assert_eq!(ids, vec!["early", "meal", "late"]);

    let expenses = db.dequeue_batch(MAX_RETRY, Some(EntityType::Expense)).unwrap();
    assert_eq!(expenses.len(), 2);
    assert!(expenses.iter().all(|i| i.entity_type == EntityType::Expense));
}

#[test]
fn dequeue_batch_skips_processing_items() {
    let db = Database::open_in_memory().unwrap();
    let id = queued_id(enqueue(&db, Operation::Create, &record("e1", None, 10), 10));
    db.mark_processing(id).unwrap();

    assert!(db.dequeue_batch(MAX_RETRY, None).unwrap().is_empty());
    assert_eq!(db.pending_count().unwrap(), 1);
}

#[test]
fn mark_failed_returns_to_pending_below_ceiling() {
    let db = Database::open_in_memory().unwrap();
    let id = queued_id(enqueue(&db, Operation::Create, &record("e1", None, 10), 10));
    db.mark_processing(id).unwrap();

    let status = db.mark_failed(id, "timeout", MAX_RETRY).unwrap();
    assert_eq!(status, Some(QueueStatus::Pending));

    let item = db.get_queue_item(id).unwrap();
    assert_eq!(item.retry_count, 1);
    assert_eq!(item.last_error.as_deref(), Some("timeout"));
}

#[parameterized(
    ceiling_one = { 1 },
    ceiling_three = { 3 },
    ceiling_five = { 5 },
)]
fn retry_ceiling_parks_item(ceiling: u32) {
    let db = Database::open_in_memory().unwrap();
    let id = queued_id(enqueue(&db, Operation::Create, &record("e1", None, 10), 10));

    for attempt in 1..=ceiling {
        assert_eq!(db.dequeue_batch(ceiling, None).unwrap().len(), 1);
        let status = db.mark_failed(id, "rejected", ceiling).unwrap().unwrap();
        let expected = if attempt == ceiling { QueueStatus::Failed } else { QueueStatus::Pending };
        assert_eq!(status, expected);
    }

    assert!(db.dequeue_batch(ceiling, None).unwrap().is_empty());
    assert_eq!(db.pending_count().unwrap(), 0);
    assert_eq!(db.failed_count().unwrap(), 1);
    assert_eq!(db.get_record("e1").unwrap().sync_status, SyncStatus::Conflict);
}

#[test]
fn mark_on_superseded_item_is_noop() {
    let db = Database::open_in_memory().unwrap();
    let old = queued_id(enqueue(&db, Operation::Create, &record("e1", None, 10), 10));
    enqueue(&db, Operation::Update, &record("e1", None, 20), 20);

    assert!(!db.mark_processing(old).unwrap());
    assert!(!db.mark_succeeded(old).unwrap());
    assert_eq!(db.mark_failed(old, "x", MAX_RETRY).unwrap(), None);
    assert_eq!(db.pending_count().unwrap(), 1);
}

#[test]
fn retry_failed_requeues_and_restores_status() {
    let db = Database::open_in_memory().unwrap();
    let id = queued_id(enqueue(&db, Operation::Create, &record("e1", None, 10), 10));
    db.mark_failed(id, "rejected", 1).unwrap();
    assert_eq!(db.failed_items().unwrap().len(), 1);

    assert_eq!(db.retry_failed().unwrap(), 1);

    let item = db.get_queue_item(id).unwrap();
    assert_eq!(item.status, QueueStatus::Pending);
    assert_eq!(item.retry_count, 0);
    assert_eq!(db.get_record("e1").unwrap().sync_status, SyncStatus::PendingUpload);
    assert!(db.failed_items().unwrap().is_empty());
}

#[test]
fn retry_failed_restores_pending_delete() {
    let db = Database::open_in_memory().unwrap();
    let mut rec = record("e1", Some("r1"), 10);
    rec.sync_status = SyncStatus::PendingDelete;
    let id = queued_id(enqueue(&db, Operation::Delete, &rec, 10));
    db.mark_failed(id, "rejected", 1).unwrap();

    db.retry_failed().unwrap();
    assert_eq!(db.get_record("e1").unwrap().sync_status, SyncStatus::PendingDelete);
}

#[test]
fn new_intent_unparks_failed_item() {
    let db = Database::open_in_memory().unwrap();
    let id = queued_id(enqueue(&db, Operation::Create, &record("e1", None, 10), 10));
    db.mark_failed(id, "rejected", 1).unwrap();

    enqueue(&db, Operation::Update, &record("e1", None, 20), 20);
    let item = db.queued_item_for(EntityType::Expense, "e1").unwrap().unwrap();
    assert_eq!(item.status, QueueStatus::Pending);
    assert_eq!(item.retry_count, 0);
    assert_eq!(item.operation, Operation::Create);
}

#[test]
fn recover_interrupted_requeues_processing() {
    let db = Database::open_in_memory().unwrap();
    let id = queued_id(enqueue(&db, Operation::Create, &record("e1", None, 10), 10));
    db.mark_processing(id).unwrap();
    db.begin_checkpoint("g1", EntityType::Expense, 1).unwrap();

    assert_eq!(db.recover_interrupted().unwrap(), 1);
    assert_eq!(db.get_queue_item(id).unwrap().status, QueueStatus::Pending);
    assert!(!db.get_checkpoint("g1", EntityType::Expense).unwrap().unwrap().is_syncing);
    assert_eq!(db.recover_interrupted().unwrap(), 0);
}

#[test]
fn compact_queue_on_clean_queue_removes_nothing() {
    let db = Database::open_in_memory().unwrap();
    enqueue(&db, Operation::Create, &record("a", None, 1), 1);
    enqueue(&db, Operation::Create, &record("b", None, 2), 2);
    assert_eq!(db.compact_queue().unwrap(), 0);
    assert_eq!(db.list_queue().unwrap().len(), 2);
}

#[test]
fn complete_upload_links_and_marks_synced() {
    let db = Database::open_in_memory().unwrap();
    let id = queued_id(enqueue(&db, Operation::Create, &record("e1", None, 10), 10));
    let item = db.get_queue_item(id).unwrap();
    db.mark_processing(id).unwrap();

    let updated = db.complete_upload(&item, "e1", 15).unwrap().unwrap();

    assert_eq!(updated.remote_id.as_deref(), Some("e1"));
    assert_eq!(updated.sync_status, SyncStatus::Synced);
    assert_eq!(updated.updated_at, 15);
    assert_eq!(updated.pending_action, None);
    assert_eq!(db.pending_count().unwrap(), 0);
}

#[test]
fn complete_upload_keeps_newer_local_edit_pending() {
    let db = Database::open_in_memory().unwrap();
    let id = queued_id(enqueue(&db, Operation::Create, &record("e1", None, 10), 10));
    let item = db.get_queue_item(id).unwrap();
    db.mark_processing(id).unwrap();
    enqueue(&db, Operation::Update, &record("e1", None, 20), 20);

    let updated = db.complete_upload(&item, "e1", 10).unwrap().unwrap();

    assert_eq!(updated.remote_id.as_deref(), Some("e1"));
    assert_eq!(updated.sync_status, SyncStatus::PendingUpload);
    assert_eq!(updated.updated_at, 20);
    let next = db.queued_item_for(EntityType::Expense, "e1").unwrap().unwrap();
    assert_eq!(next.remote_id.as_deref(), Some("e1"));
}

#[test]
fn complete_upload_of_delete_removes_record() {
    let db = Database::open_in_memory().unwrap();
    let mut rec = record("e1", Some("r1"), 10);
    rec.sync_status = SyncStatus::PendingDelete;
    rec.pending_action = Some(Operation::Delete);
    let id = queued_id(enqueue(&db, Operation::Delete, &rec, 10));
    let item = db.get_queue_item(id).unwrap();

    assert!(db.complete_upload(&item, "r1", 10).unwrap().is_none());
    assert!(db.find_record("e1").unwrap().is_none());
    assert!(db.list_queue().unwrap().is_empty());
}

#[test]
fn complete_upload_twice_is_idempotent() {
    let db = Database::open_in_memory().unwrap();
    let id = queued_id(enqueue(&db, Operation::Create, &record("e1", None, 10), 10));
    let item = db.get_queue_item(id).unwrap();

    let first = db.complete_upload(&item, "e1", 10).unwrap().unwrap();
    let second = db.complete_upload(&item, "e1", 10).unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(second.sync_status, SyncStatus::Synced);
}

#[test]
fn queue_status_parse() {
    assert_eq!("failed".parse::<QueueStatus>().unwrap(), QueueStatus::Failed);
    assert!("done".parse::<QueueStatus>().is_err());
}

#[test]
fn mark_processing_claims_item_once() {
    let db = Database::open_in_memory().unwrap();
    let id = queued_id(enqueue(&db, Operation::Create, &record("e1", None, 10), 10));

    assert!(db.mark_processing(id).unwrap());
    assert!(!db.mark_processing(id).unwrap());
}

#[test]
fn release_item_returns_to_pending_without_retry() {
    let db = Database::open_in_memory().unwrap();
    let id = queued_id(enqueue(&db, Operation::Create, &record("e1", None, 10), 10));
    assert!(!db.release_item(id).unwrap());

    db.mark_processing(id).unwrap();
    assert!(db.release_item(id).unwrap());

    let item = db.get_queue_item(id).unwrap();
    assert_eq!(item.status, QueueStatus::Pending);
    assert_eq!(item.retry_count, 0);
}
