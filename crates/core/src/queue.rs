// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable mutation queue.
//!
//! Holds at most one intent per `(entity_type, entity_id)`. A new intent for
//! an entity that is already queued replaces the old one:
//! - Delete supersedes anything; deleting a record whose create never
//!   reached the remote cancels the intent outright
//! - Update over a never-uploaded create stays a create
//! - A remote id learned by an earlier intent carries over
//!
//! Items move `Pending -> Processing` during an upload, are removed on
//! success, and return to `Pending` with a bumped retry count on failure
//! until the ceiling parks them as `Failed`.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::db::{parse_db, parse_json, Database};
use crate::entity::{EntityType, Operation, SyncStatus};
use crate::error::{Error, Result};
use crate::record::SyncableRecord;

/// Lifecycle state of a queued intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Processing,
    /// Parked after exhausting the retry ceiling.
    Failed,
}

impl QueueStatus {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "processing" => Ok(QueueStatus::Processing),
            "failed" => Ok(QueueStatus::Failed),
            _ => Err(Error::InvalidQueueStatus(s.to_string())),
        }
    }
}

/// One durable outbound intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: i64,
    pub operation: Operation,
    pub entity_type: EntityType,
    /// Local id of the record.
    pub entity_id: String,
    pub remote_id: Option<String>,
    /// Record state at enqueue time.
    pub payload_snapshot: Value,
    pub enqueued_at: i64,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub status: QueueStatus,
}

impl QueueItem {
    /// Decodes the record snapshot taken at enqueue time.
    pub fn snapshot(&self) -> Result<SyncableRecord> {
        Ok(serde_json::from_value(self.payload_snapshot.clone())?)
    }
}

/// An intent about to be enqueued.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub operation: Operation,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub remote_id: Option<String>,
    pub payload_snapshot: Value,
    pub enqueued_at: i64,
}

impl Intent {
    /// Builds an intent that snapshots the record as it is now.
    pub fn for_record(operation: Operation, record: &SyncableRecord, enqueued_at: i64) -> Result<Self> {
        Ok(Intent {
            operation,
            entity_type: record.entity_type,
            entity_id: record.local_id.clone(),
            remote_id: record.remote_id.clone(),
            payload_snapshot: serde_json::to_value(record)?,
            enqueued_at,
        })
    }
}

/// Result of enqueueing an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The intent is queued under this id.
    Queued(i64),
    /// The intent cancelled a never-uploaded create; nothing is queued.
    Cancelled,
}

const QUEUE_COLUMNS: &str = "id, operation, entity_type, entity_id, remote_id, payload_snapshot, \
     enqueued_at, retry_count, last_error, status";

fn item_from_row(row: &Row<'_>) -> std::result::Result<QueueItem, rusqlite::Error> {
    let op_str: String = row.get(1)?;
    let type_str: String = row.get(2)?;
    let snapshot_str: String = row.get(5)?;
    let status_str: String = row.get(9)?;

    Ok(QueueItem {
        id: row.get(0)?,
        operation: parse_db(&op_str, "operation")?,
        entity_type: parse_db(&type_str, "entity_type")?,
        entity_id: row.get(3)?,
        remote_id: row.get(4)?,
        payload_snapshot: parse_json(&snapshot_str, "payload_snapshot")?,
        enqueued_at: row.get(6)?,
        retry_count: row.get(7)?,
        last_error: row.get(8)?,
        status: parse_db(&status_str, "status")?,
    })
}

/// Keep only the newest intent per entity. Returns the number removed.
pub(crate) fn compact_queue_on(conn: &Connection) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM sync_queue WHERE id NOT IN (
             SELECT MAX(id) FROM sync_queue GROUP BY entity_type, entity_id
         )",
        [],
    )?;
    Ok(removed)
}

impl Database {
    /// Durably enqueue an intent, superseding any intent already queued for
    /// the same entity.
    pub fn enqueue(&self, intent: &Intent) -> Result<EnqueueOutcome> {
        let tx = self.conn.unchecked_transaction()?;
        let outcome = self.write_intent(intent)?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Supersede and insert without opening a transaction.
    ///
    /// Callers must already hold one.
    pub(crate) fn write_intent(&self, intent: &Intent) -> Result<EnqueueOutcome> {
        let prior = self.queued_item_for(intent.entity_type, &intent.entity_id)?;

        let (operation, remote_id) = match prior {
            None => (intent.operation, intent.remote_id.clone()),
            Some(prev) => {
                self.conn
                    .execute("DELETE FROM sync_queue WHERE id = ?1", params![prev.id])?;
                let remote_id = intent.remote_id.clone().or(prev.remote_id);
                match (prev.operation, intent.operation, remote_id) {
                    // An in-flight create may still land under its local id
                    (Operation::Create, Operation::Delete, None)
                        if prev.status == QueueStatus::Processing =>
                    {
                        (Operation::Delete, Some(intent.entity_id.clone()))
                    }
                    (Operation::Create, Operation::Update, None) => (Operation::Create, None),
                    (_, op, remote_id) => (op, remote_id),
                }
            }
        };

        // Never uploaded and nothing in flight: nothing exists remotely
        if operation == Operation::Delete && remote_id.is_none() {
            return Ok(EnqueueOutcome::Cancelled);
        }

        self.conn.execute(
            "INSERT INTO sync_queue (operation, entity_type, entity_id, remote_id,
             payload_snapshot, enqueued_at, retry_count, last_error, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, 'pending')",
            params![
                operation.as_str(),
                intent.entity_type.as_str(),
                intent.entity_id,
                remote_id,
                serde_json::to_string(&intent.payload_snapshot)?,
                intent.enqueued_at,
            ],
        )?;
        Ok(EnqueueOutcome::Queued(self.conn.last_insert_rowid()))
    }

    /// Get a queued item by id.
    pub fn get_queue_item(&self, id: i64) -> Result<QueueItem> {
        let sql = format!("SELECT {QUEUE_COLUMNS} FROM sync_queue WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], item_from_row)
            .optional()?
            .ok_or(Error::QueueItemNotFound(id))
    }

    /// Get the intent queued for an entity, if any.
    pub fn queued_item_for(&self, entity_type: EntityType, entity_id: &str) -> Result<Option<QueueItem>> {
        let sql = format!(
            "SELECT {QUEUE_COLUMNS} FROM sync_queue
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY id DESC LIMIT 1"
        );
        let item = self
            .conn
            .query_row(&sql, params![entity_type.as_str(), entity_id], item_from_row)
            .optional()?;
        Ok(item)
    }

    /// Return retryable items, oldest first.
    ///
    /// Includes `Pending` and `Failed` items whose retry count is below
    /// `max_retry`, optionally limited to one entity type.
    pub fn dequeue_batch(
        &self,
        max_retry: u32,
        entity_type: Option<EntityType>,
    ) -> Result<Vec<QueueItem>> {
        let sql = format!(
            "SELECT {QUEUE_COLUMNS} FROM sync_queue
             WHERE status IN ('pending', 'failed') AND retry_count < ?1
               AND (?2 IS NULL OR entity_type = ?2)
             ORDER BY enqueued_at, id"
        );
        self.query_items(&sql, params![max_retry, entity_type.map(|t| t.as_str())])
    }

    /// List every queued item, oldest first.
    pub fn list_queue(&self) -> Result<Vec<QueueItem>> {
        let sql = format!("SELECT {QUEUE_COLUMNS} FROM sync_queue ORDER BY enqueued_at, id");
        self.query_items(&sql, [])
    }

    /// List items parked after exhausting the retry ceiling.
    pub fn failed_items(&self) -> Result<Vec<QueueItem>> {
        let sql = format!(
            "SELECT {QUEUE_COLUMNS} FROM sync_queue WHERE status = 'failed'
             ORDER BY enqueued_at, id"
        );
        self.query_items(&sql, [])
    }

    /// Remove whatever intent is queued for an entity.
    pub fn drop_intent(&self, entity_type: EntityType, entity_id: &str) -> Result<bool> {
        let affected = self.conn.execute(
            "DELETE FROM sync_queue WHERE entity_type = ?1 AND entity_id = ?2",
            params![entity_type.as_str(), entity_id],
        )?;
        Ok(affected > 0)
    }

    /// Mark an item as being uploaded.
    ///
    /// Returns false if the item was superseded or another drain already
    /// claimed it.
    pub fn mark_processing(&self, id: i64) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE sync_queue SET status = 'processing' WHERE id = ?1 AND status != 'processing'",
            params![id],
        )?;
        Ok(affected > 0)
    }

    /// Return an interrupted upload to `Pending` without counting a retry.
    pub fn release_item(&self, id: i64) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE sync_queue SET status = 'pending' WHERE id = ?1 AND status = 'processing'",
            params![id],
        )?;
        Ok(affected > 0)
    }

    /// Remove an item after the remote accepted it.
    ///
    /// Returns false if the item was superseded in the meantime.
    pub fn mark_succeeded(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM sync_queue WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    /// Record a failed upload attempt.
    ///
    /// Bumps the retry count and stores the error. Once the count reaches
    /// `max_retry` the item is parked as `Failed` and its record marked
    /// `Conflict`. Returns the new status, or `None` if the item was
    /// superseded in the meantime.
    pub fn mark_failed(&self, id: i64, error: &str, max_retry: u32) -> Result<Option<QueueStatus>> {
        let tx = self.conn.unchecked_transaction()?;
        let item = match self.get_queue_item(id) {
            Ok(item) => item,
            Err(Error::QueueItemNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let retry_count = item.retry_count.saturating_add(1);
        let status = if retry_count >= max_retry {
            QueueStatus::Failed
        } else {
            QueueStatus::Pending
        };

        self.conn.execute(
            "UPDATE sync_queue SET retry_count = ?1, last_error = ?2, status = ?3 WHERE id = ?4",
            params![retry_count, error, status.as_str(), id],
        )?;
        if status == QueueStatus::Failed {
            self.conn.execute(
                "UPDATE records SET sync_status = 'conflict' WHERE local_id = ?1",
                params![item.entity_id],
            )?;
        }
        tx.commit()?;
        Ok(Some(status))
    }

    /// Number of intents still eligible for upload (excludes parked items).
    pub fn pending_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sync_queue WHERE status IN ('pending', 'processing')",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Number of eligible intents of one type.
    pub fn pending_count_for(&self, entity_type: EntityType) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sync_queue
             WHERE status IN ('pending', 'processing') AND entity_type = ?1",
            params![entity_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn has_pending(&self) -> Result<bool> {
        Ok(self.pending_count()? > 0)
    }

    /// Number of parked intents.
    pub fn failed_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sync_queue WHERE status = 'failed'",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Return parked items to the queue with a fresh retry budget.
    ///
    /// Their records leave `Conflict` and show the pending action again.
    /// Returns the number of items requeued.
    pub fn retry_failed(&self) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        self.conn.execute(
            "UPDATE records SET sync_status = CASE
                 (SELECT q.operation FROM sync_queue q
                  WHERE q.entity_type = records.entity_type AND q.entity_id = records.local_id)
                 WHEN 'delete' THEN 'delete' ELSE 'pending' END
             WHERE sync_status = 'conflict' AND EXISTS (
                 SELECT 1 FROM sync_queue q
                 WHERE q.entity_type = records.entity_type AND q.entity_id = records.local_id
                   AND q.status = 'failed')",
            [],
        )?;
        let requeued = self.conn.execute(
            "UPDATE sync_queue SET status = 'pending', retry_count = 0 WHERE status = 'failed'",
            [],
        )?;
        tx.commit()?;
        Ok(requeued)
    }

    /// Return items left `Processing` by an interrupted run to `Pending`.
    ///
    /// Also clears stale `is_syncing` flags. Returns the number of items
    /// requeued.
    pub fn recover_interrupted(&self) -> Result<usize> {
        let recovered = self.conn.execute(
            "UPDATE sync_queue SET status = 'pending' WHERE status = 'processing'",
            [],
        )?;
        self.clear_syncing()?;
        if recovered > 0 {
            compact_queue_on(&self.conn)?;
        }
        Ok(recovered)
    }

    /// Drop all but the newest intent per entity. Returns the number removed.
    pub fn compact_queue(&self) -> Result<usize> {
        compact_queue_on(&self.conn)
    }

    /// Apply a successful remote write.
    ///
    /// Removes the item, links the record to `remote_id`, and marks it
    /// `Synced` at `accepted_at` unless the record changed locally after the
    /// snapshot was taken. A confirmed delete removes the record. Returns
    /// the record as it stands afterwards, if it still exists.
    pub fn complete_upload(
        &self,
        item: &QueueItem,
        remote_id: &str,
        accepted_at: i64,
    ) -> Result<Option<SyncableRecord>> {
        let tx = self.conn.unchecked_transaction()?;
        self.mark_succeeded(item.id)?;

        if item.operation == Operation::Delete {
            let record = self.find_record(&item.entity_id)?;
            if record.as_ref().is_some_and(SyncableRecord::is_pending_delete) {
                self.delete_record(&item.entity_id)?;
            }
            tx.commit()?;
            return Ok(None);
        }

        let snapshot_updated_at = item.snapshot()?.updated_at;
        self.conn.execute(
            "UPDATE sync_queue SET remote_id = ?1
             WHERE entity_type = ?2 AND entity_id = ?3 AND remote_id IS NULL",
            params![remote_id, item.entity_type.as_str(), item.entity_id],
        )?;

        let Some(mut record) = self.find_record(&item.entity_id)? else {
            tx.commit()?;
            return Ok(None);
        };
        record.remote_id = Some(remote_id.to_string());
        let newer_intent = self.queued_item_for(item.entity_type, &item.entity_id)?.is_some();
        if record.updated_at == snapshot_updated_at && !newer_intent {
            record.updated_at = accepted_at;
            record.sync_status = SyncStatus::Synced;
            record.pending_action = None;
        }
        self.upsert_record(&record)?;
        tx.commit()?;
        Ok(Some(record))
    }

    fn query_items(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<QueueItem>> {
        let mut stmt = self.conn.prepare(sql)?;
        let items = stmt
            .query_map(params, item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
