// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::remote::MemoryRemoteStore;
use crate::test_helpers::{config, expense, group, ledger_at, remote};
use mk_core::SyncStatus;
use yare::parameterized;

fn pump(ledger: &Ledger, store: &MemoryRemoteStore) -> UploadPump {
    UploadPump::new(ledger.clone(), Arc::new(store.clone()), &config())
}

#[tokio::test]
async fn drain_uploads_offline_create() {
    let (ledger, _clock) = ledger_at(100);
    let store = remote();
    let record = ledger.create(&expense("g1", 500.0)).unwrap();
    assert_eq!(ledger.lock().pending_count().unwrap(), 1);

    let report = pump(&ledger, &store).drain(None).await.unwrap();

    assert_eq!(report, DrainReport { succeeded: 1, failed: 0, parked: 0 });
    assert_eq!(ledger.lock().pending_count().unwrap(), 0);
    let synced = ledger.get(&record.local_id).unwrap();
    assert_eq!(synced.sync_status, SyncStatus::Synced);
    assert_eq!(synced.remote_id.as_deref(), Some(record.local_id.as_str()));
    assert_eq!(synced.pending_action, None);

    let doc = store.get(EntityType::Expense, &record.local_id).unwrap();
    assert_eq!(doc.fields["amount"], 500.0);
    assert_eq!(doc.updated_at, synced.updated_at);
}

#[tokio::test]
async fn drain_stamps_timestamp_accepted_by_remote() {
    let (ledger, _clock) = ledger_at(100);
    let store = remote();
    store.put_document(mk_core::RemoteDocument {
        id: "other".to_string(),
        entity_type: EntityType::Expense,
        group_id: "g1".to_string(),
        natural_key: None,
        fields: serde_json::json!({}),
        updated_at: 900,
        deleted: false,
    });
    let record = ledger.create(&expense("g1", 1.0)).unwrap();

    pump(&ledger, &store).drain(Some(EntityType::Expense)).await.unwrap();

    assert_eq!(ledger.get(&record.local_id).unwrap().updated_at, 901);
}

#[tokio::test]
async fn drain_uploads_parents_first() {
    let (ledger, clock) = ledger_at(100);
    let store = remote();
    let child = ledger.create(&expense("g1", 5.0)).unwrap();
    clock.advance(10);
    let parent = ledger.create(&group("Flat 4B")).unwrap();

    pump(&ledger, &store).drain(None).await.unwrap();

    let group_doc = store.get(EntityType::Group, &parent.local_id).unwrap();
    let expense_doc = store.get(EntityType::Expense, &child.local_id).unwrap();
    assert!(group_doc.updated_at < expense_doc.updated_at);
}

#[tokio::test]
async fn drain_with_type_leaves_other_types_queued() {
    let (ledger, _clock) = ledger_at(100);
    let store = remote();
    ledger.create(&group("Flat 4B")).unwrap();
    ledger.create(&expense("g1", 5.0)).unwrap();

    let report = pump(&ledger, &store).drain(Some(EntityType::Group)).await.unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(ledger.lock().pending_count_for(EntityType::Expense).unwrap(), 1);
}

#[tokio::test]
async fn failure_keeps_intent_and_business_fields() {
    let (ledger, _clock) = ledger_at(100);
    let store = remote();
    let record = ledger.create(&expense("g1", 500.0)).unwrap();
    store.fail_next(RemoteError::Rejected("quota".into()));

    let report = pump(&ledger, &store).drain(None).await.unwrap();

    assert_eq!(report, DrainReport { succeeded: 0, failed: 1, parked: 0 });
    let items = ledger.lock().list_queue().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].retry_count, 1);
    assert_eq!(items[0].status, QueueStatus::Pending);
    assert!(items[0].last_error.as_deref().unwrap().contains("quota"));
    assert_eq!(ledger.get(&record.local_id).unwrap(), record);
}

#[tokio::test]
async fn one_failure_does_not_stop_siblings() {
    let (ledger, clock) = ledger_at(100);
    let store = remote();
    ledger.create(&expense("g1", 1.0)).unwrap();
    clock.advance(1);
    ledger.create(&expense("g1", 2.0)).unwrap();
    store.fail_next(RemoteError::Timeout);

    let report = pump(&ledger, &store).drain(None).await.unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(store.documents(EntityType::Expense).len(), 1);
}

#[parameterized(
    one = { 1 },
    three = { 3 },
)]
fn retry_ceiling_parks_and_stops(ceiling: u32) {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    rt.block_on(async {
        let (ledger, _clock) = ledger_at(100);
        let store = remote();
        store.set_online(false);
        let record = ledger.create(&expense("g1", 1.0)).unwrap();
        let config = SyncConfig { max_retries: ceiling, ..config() };
        let pump = UploadPump::new(ledger.clone(), Arc::new(store.clone()), &config);

        let mut parked = 0;
        for _ in 0..ceiling {
            parked += pump.drain(None).await.unwrap().parked;
        }
        assert_eq!(parked, 1);

        let report = pump.drain(None).await.unwrap();
        assert!(report.is_empty());
        assert_eq!(ledger.lock().failed_count().unwrap(), 1);
        assert_eq!(ledger.get(&record.local_id).unwrap().sync_status, SyncStatus::Conflict);
    });
}

#[tokio::test]
async fn replayed_create_does_not_duplicate() {
    let (ledger, _clock) = ledger_at(100);
    let store = remote();
    let record = ledger.create(&expense("g1", 500.0)).unwrap();
    let item = ledger.lock().list_queue().unwrap().remove(0);
    let pump = pump(&ledger, &store);

    // The remote write lands but the acknowledgement is lost
    store
        .upsert(UpsertRequest {
            entity_type: EntityType::Expense,
            id: Some(record.local_id.clone()),
            group_id: "g1".to_string(),
            natural_key: None,
            fields: record.payload.clone(),
            updated_at: record.updated_at,
        })
        .await
        .unwrap();
    pump.drain(None).await.unwrap();

    // A stale copy of the item replays too
    ledger.lock().enqueue(&mk_core::Intent {
        operation: item.operation,
        entity_type: item.entity_type,
        entity_id: item.entity_id.clone(),
        remote_id: None,
        payload_snapshot: item.payload_snapshot.clone(),
        enqueued_at: item.enqueued_at,
    })
    .unwrap();
    pump.drain(None).await.unwrap();

    assert_eq!(store.documents(EntityType::Expense).len(), 1);
    assert_eq!(ledger.get(&record.local_id).unwrap().sync_status, SyncStatus::Synced);
    assert_eq!(ledger.lock().pending_count().unwrap(), 0);
}

#[tokio::test]
async fn update_then_delete_sends_single_delete() {
    let (ledger, clock) = ledger_at(100);
    let store = remote();
    let record = ledger.create(&expense("g1", 500.0)).unwrap();
    let pump = pump(&ledger, &store);
    pump.drain(None).await.unwrap();
    let writes = store.write_count();

    clock.advance(10);
    ledger.update(&record.local_id, &expense("g1", 650.0)).unwrap();
    clock.advance(10);
    assert!(ledger.delete(&record.local_id).unwrap());
    assert_eq!(ledger.lock().pending_count().unwrap(), 1);

    let report = pump.drain(None).await.unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(store.write_count(), writes + 1);
    assert!(store.get(EntityType::Expense, &record.local_id).unwrap().deleted);
    assert!(ledger.lock().find_record(&record.local_id).unwrap().is_none());
}

#[tokio::test]
async fn create_then_delete_offline_never_calls_remote() {
    let (ledger, _clock) = ledger_at(100);
    let store = remote();
    let record = ledger.create(&expense("g1", 500.0)).unwrap();
    assert!(!ledger.delete(&record.local_id).unwrap());

    let report = pump(&ledger, &store).drain(None).await.unwrap();

    assert!(report.is_empty());
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn edit_during_upload_stays_pending() {
    let (ledger, clock) = ledger_at(100);
    let store = remote();
    let record = ledger.create(&expense("g1", 500.0)).unwrap();
    store.set_latency(Some(Duration::from_millis(50)));
    let pump = pump(&ledger, &store);

    let drain = tokio::spawn({
        let pump = pump.clone();
        async move { pump.drain(None).await.unwrap() }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    clock.advance(5);
    ledger.update(&record.local_id, &expense("g1", 650.0)).unwrap();
    drain.await.unwrap();

    let current = ledger.get(&record.local_id).unwrap();
    assert_eq!(current.sync_status, SyncStatus::PendingUpload);
    assert_eq!(current.remote_id.as_deref(), Some(record.local_id.as_str()));
    let queued = ledger.lock().list_queue().unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].remote_id.as_deref(), Some(record.local_id.as_str()));

    store.set_latency(None);
    pump.drain(None).await.unwrap();
    assert_eq!(ledger.get(&record.local_id).unwrap().sync_status, SyncStatus::Synced);
    assert_eq!(store.get(EntityType::Expense, &record.local_id).unwrap().fields["amount"], 650.0);
}

#[tokio::test]
async fn edit_after_upload_survives_its_own_echo() {
    let (ledger, _clock) = ledger_at(100);
    let store = remote();
    store.put_document(mk_core::RemoteDocument {
        id: "other".to_string(),
        entity_type: EntityType::Expense,
        group_id: "g1".to_string(),
        natural_key: None,
        fields: serde_json::json!({}),
        updated_at: 900,
        deleted: false,
    });
    let record = ledger.create(&expense("g1", 1.0)).unwrap();
    pump(&ledger, &store).drain(None).await.unwrap();
    let synced = ledger.get(&record.local_id).unwrap();

    let edited = ledger.update(&record.local_id, &expense("g1", 2.0)).unwrap();
    assert!(edited.updated_at > synced.updated_at);

    let echo = store.get(EntityType::Expense, &record.local_id).unwrap();
    let report = ledger.reconcile(EntityType::Expense, &[echo]).unwrap();

    assert_eq!(report.kept, 1);
    let current = ledger.get(&record.local_id).unwrap();
    assert_eq!(current.payload["amount"], 2.0);
    assert_eq!(current.sync_status, SyncStatus::PendingUpload);
    assert_eq!(ledger.lock().pending_count().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn request_timeout_counts_as_failure() {
    let (ledger, _clock) = ledger_at(100);
    let store = remote();
    ledger.create(&expense("g1", 1.0)).unwrap();
    store.set_latency(Some(Duration::from_secs(60)));

    let report = pump(&ledger, &store).drain(None).await.unwrap();

    assert_eq!(report.failed, 1);
    let item = ledger.lock().list_queue().unwrap().remove(0);
    assert_eq!(item.retry_count, 1);
    assert!(item.last_error.unwrap().contains("timed out"));
}

#[tokio::test(start_paused = true)]
async fn cancelled_drain_releases_claim() {
    let (ledger, _clock) = ledger_at(100);
    let store = remote();
    ledger.create(&expense("g1", 1.0)).unwrap();
    store.set_latency(Some(Duration::from_millis(500)));
    let pump = pump(&ledger, &store);

    let result = tokio::time::timeout(Duration::from_millis(100), pump.drain(None)).await;
    assert!(result.is_err());

    let item = ledger.lock().list_queue().unwrap().remove(0);
    assert_eq!(item.status, QueueStatus::Pending);
    assert_eq!(item.retry_count, 0);
}
