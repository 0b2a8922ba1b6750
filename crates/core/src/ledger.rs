// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Application-facing facade over the local store.
//!
//! A [`Ledger`] is cheap to clone and shares one [`Database`] behind a mutex,
//! which serializes every queue mutation. Local edits write the record and
//! enqueue the matching intent in a single transaction.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::clock::{ClockSource, MonotonicClock, SystemClock};
use crate::db::Database;
use crate::entity::{Entity, EntityType, Operation, SyncStatus};
use crate::error::{Error, Result};
use crate::queue::{EnqueueOutcome, Intent, QueueItem};
use crate::reconcile::{Reconcile, ReconcileReport};
use crate::record::{new_local_id, RemoteDocument, SyncableRecord};

impl Database {
    /// Persist a local change and enqueue its intent atomically.
    ///
    /// A delete that cancels a never-uploaded create removes the record
    /// outright.
    pub fn apply_local_change(
        &self,
        record: &SyncableRecord,
        operation: Operation,
    ) -> Result<EnqueueOutcome> {
        let tx = self.conn.unchecked_transaction()?;
        self.upsert_record(record)?;
        let intent = Intent::for_record(operation, record, record.updated_at)?;
        let outcome = self.write_intent(&intent)?;
        if outcome == EnqueueOutcome::Cancelled {
            self.delete_record(&record.local_id)?;
        }
        tx.commit()?;
        Ok(outcome)
    }
}

/// Shared handle to the local store plus its monotonic clock.
#[derive(Clone)]
pub struct Ledger {
    db: Arc<Mutex<Database>>,
    clock: Arc<MonotonicClock<Arc<dyn ClockSource>>>,
}

impl Ledger {
    /// Open the ledger database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Open an in-memory ledger (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Wrap a database using the system clock.
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    /// Wrap a database using a custom clock source.
    pub fn with_clock(db: Database, clock: Arc<dyn ClockSource>) -> Self {
        Ledger {
            db: Arc::new(Mutex::new(db)),
            clock: Arc::new(MonotonicClock::with_clock(clock)),
        }
    }

    /// Lock the database for direct access.
    ///
    /// Hold the guard only for short synchronous sections.
    pub fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` with the database locked.
    pub fn with_db<R>(&self, f: impl FnOnce(&Database) -> Result<R>) -> Result<R> {
        f(&self.lock())
    }

    /// Next strictly increasing local timestamp.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Next local timestamp strictly after `previous`.
    fn stamp_after(&self, previous: i64) -> i64 {
        self.clock.observe(previous);
        self.clock.now()
    }

    /// Create a new record for `entity` and queue its upload.
    pub fn create<T: Entity>(&self, entity: &T) -> Result<SyncableRecord> {
        let record = SyncableRecord::from_entity(new_local_id(), entity, self.now())?;
        self.lock().apply_local_change(&record, Operation::Create)?;
        tracing::debug!(local_id = %record.local_id, entity_type = %record.entity_type, "created");
        Ok(record)
    }

    /// Replace the entity stored under `local_id` and queue the update.
    pub fn update<T: Entity>(&self, local_id: &str, entity: &T) -> Result<SyncableRecord> {
        let db = self.lock();
        let mut record = live_record(&db, local_id)?;
        record.set_entity(entity)?;
        record.updated_at = self.stamp_after(record.updated_at);
        record.sync_status = SyncStatus::PendingUpload;
        record.pending_action = match (record.pending_action, &record.remote_id) {
            (Some(Operation::Create), None) => Some(Operation::Create),
            _ => Some(Operation::Update),
        };
        db.apply_local_change(&record, Operation::Update)?;
        tracing::debug!(local_id, entity_type = %record.entity_type, "updated");
        Ok(record)
    }

    /// Delete the record under `local_id` and queue the remote delete.
    ///
    /// Returns true if a remote delete was queued, false if the record never
    /// reached the remote store and was simply removed.
    pub fn delete(&self, local_id: &str) -> Result<bool> {
        let db = self.lock();
        let mut record = live_record(&db, local_id)?;
        record.updated_at = self.stamp_after(record.updated_at);
        record.sync_status = SyncStatus::PendingDelete;
        record.pending_action = Some(Operation::Delete);
        let outcome = db.apply_local_change(&record, Operation::Delete)?;
        tracing::debug!(local_id, entity_type = %record.entity_type, ?outcome, "deleted");
        Ok(matches!(outcome, EnqueueOutcome::Queued(_)))
    }

    /// Get a live record.
    pub fn get(&self, local_id: &str) -> Result<SyncableRecord> {
        live_record(&self.lock(), local_id)
    }

    /// Get and decode a live record.
    pub fn get_entity<T: Entity>(&self, local_id: &str) -> Result<T> {
        self.get(local_id)?.decode()
    }

    /// List live records of a type, optionally limited to one group.
    pub fn list(&self, entity_type: EntityType, group_id: Option<&str>) -> Result<Vec<SyncableRecord>> {
        self.lock().list_records(entity_type, group_id)
    }

    /// Merge a batch of remote documents into local state.
    ///
    /// The clock observes the newest remote timestamp so later local edits
    /// sort after it.
    pub fn reconcile(
        &self,
        entity_type: EntityType,
        docs: &[RemoteDocument],
    ) -> Result<ReconcileReport> {
        let report = self.lock().reconcile_all(entity_type, docs)?;
        if let Some(max) = report.max_updated_at {
            self.clock.observe(max);
        }
        Ok(report)
    }

    /// Apply a write the remote store accepted at `accepted_at`.
    ///
    /// The clock observes the accepted timestamp so the next local edit of
    /// the record sorts after its synced state.
    pub fn complete_upload(
        &self,
        item: &QueueItem,
        remote_id: &str,
        accepted_at: i64,
    ) -> Result<Option<SyncableRecord>> {
        let record = self.lock().complete_upload(item, remote_id, accepted_at)?;
        self.clock.observe(accepted_at);
        Ok(record)
    }

    /// Remove all local state (sign-out).
    pub fn wipe(&self) -> Result<()> {
        self.lock().wipe()
    }
}

fn live_record(db: &Database, local_id: &str) -> Result<SyncableRecord> {
    let record = db.get_record(local_id)?;
    if record.is_pending_delete() {
        return Err(Error::RecordNotFound(local_id.to_string()));
    }
    Ok(record)
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
