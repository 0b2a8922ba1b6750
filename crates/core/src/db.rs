// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed local store.
//!
//! The [`Database`] struct holds replicated records, the outbound mutation
//! queue, and per-type sync checkpoints in one file, so a record write and
//! its queued intent can commit in the same transaction.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::path::Path;

use crate::entity::{EntityType, SyncStatus};
use crate::error::{Error, Result};
use crate::record::SyncableRecord;

/// SQL schema for the local store.
pub const SCHEMA: &str = r#"
-- Replicated business records with sync metadata
CREATE TABLE IF NOT EXISTS records (
    local_id TEXT PRIMARY KEY,
    remote_id TEXT,
    entity_type TEXT NOT NULL,
    group_id TEXT NOT NULL,
    natural_key TEXT,
    payload TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    sync_status TEXT NOT NULL DEFAULT 'pending',
    pending_action TEXT
);

-- Outbound intents awaiting upload
CREATE TABLE IF NOT EXISTS sync_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation TEXT NOT NULL,          -- create|update|delete
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,          -- records.local_id
    remote_id TEXT,
    payload_snapshot TEXT NOT NULL,
    enqueued_at INTEGER NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    status TEXT NOT NULL DEFAULT 'pending'  -- pending|processing|failed
);

-- Download watermark per sync scope and entity type
CREATE TABLE IF NOT EXISTS sync_checkpoints (
    scope TEXT NOT NULL,              -- group id
    entity_type TEXT NOT NULL,
    last_sync_timestamp INTEGER NOT NULL DEFAULT 0,
    pending_operation_count INTEGER NOT NULL DEFAULT 0,
    is_syncing INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    PRIMARY KEY (scope, entity_type)
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_records_remote ON records(entity_type, remote_id);
CREATE INDEX IF NOT EXISTS idx_records_status ON records(entity_type, sync_status);
CREATE INDEX IF NOT EXISTS idx_records_updated ON records(entity_type, updated_at);
CREATE INDEX IF NOT EXISTS idx_records_natural ON records(entity_type, group_id, natural_key);
CREATE UNIQUE INDEX IF NOT EXISTS idx_queue_entity ON sync_queue(entity_type, entity_id);
CREATE INDEX IF NOT EXISTS idx_queue_order ON sync_queue(status, enqueued_at);
"#;

/// Column list shared by every record query.
pub(crate) const RECORD_COLUMNS: &str = "local_id, remote_id, entity_type, group_id, natural_key, \
     payload, updated_at, sync_status, pending_action";

/// Parse a string value from the database, returning a rusqlite error on parse failure.
pub(crate) fn parse_db<T: std::str::FromStr>(
    value: &str,
    column: &str,
) -> std::result::Result<T, rusqlite::Error> {
    value.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(Error::CorruptedData(format!(
                "invalid value '{value}' in column '{column}'"
            ))),
        )
    })
}

/// Parse a stored JSON document.
pub(crate) fn parse_json(value: &str, column: &str) -> std::result::Result<Value, rusqlite::Error> {
    serde_json::from_str(value).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(Error::CorruptedData(format!("invalid JSON in column '{column}'"))),
        )
    })
}

/// Map a row selected with [`RECORD_COLUMNS`].
pub(crate) fn record_from_row(row: &Row<'_>) -> std::result::Result<SyncableRecord, rusqlite::Error> {
    let type_str: String = row.get(2)?;
    let payload_str: String = row.get(5)?;
    let status_str: String = row.get(7)?;
    let action_str: Option<String> = row.get(8)?;

    Ok(SyncableRecord {
        local_id: row.get(0)?,
        remote_id: row.get(1)?,
        entity_type: parse_db(&type_str, "entity_type")?,
        group_id: row.get(3)?,
        natural_key: row.get(4)?,
        payload: parse_json(&payload_str, "payload")?,
        updated_at: row.get(6)?,
        sync_status: parse_db(&status_str, "sync_status")?,
        pending_action: action_str.map(|a| parse_db(&a, "pending_action")).transpose()?,
    })
}

/// Create the schema on a database connection.
///
/// Every statement is `IF NOT EXISTS` so every open can run it.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// SQLite database connection with local store operations.
pub struct Database {
    /// The underlying SQLite connection.
    pub conn: Connection,
}

impl Database {
    /// Open a database connection at the given path, creating and migrating if needed.
    ///
    /// Queue items interrupted mid-upload by a crash are returned to pending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL lets the CLI read while a watcher writes
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        let db = Database { conn };
        run_migrations(&db.conn)?;
        let recovered = db.recover_interrupted()?;
        if recovered > 0 {
            tracing::info!(recovered, "requeued interrupted uploads");
        }
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        run_migrations(&db.conn)?;
        Ok(db)
    }

    /// Get a record by local id.
    pub fn get_record(&self, local_id: &str) -> Result<SyncableRecord> {
        self.find_record(local_id)?
            .ok_or_else(|| Error::RecordNotFound(local_id.to_string()))
    }

    /// Get a record by local id, if it exists.
    pub fn find_record(&self, local_id: &str) -> Result<Option<SyncableRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE local_id = ?1");
        let record = self
            .conn
            .query_row(&sql, params![local_id], record_from_row)
            .optional()?;
        Ok(record)
    }

    /// Insert or replace a record.
    pub fn upsert_record(&self, record: &SyncableRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO records (local_id, remote_id, entity_type, group_id, natural_key,
             payload, updated_at, sync_status, pending_action)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(local_id) DO UPDATE SET
                remote_id = excluded.remote_id,
                entity_type = excluded.entity_type,
                group_id = excluded.group_id,
                natural_key = excluded.natural_key,
                payload = excluded.payload,
                updated_at = excluded.updated_at,
                sync_status = excluded.sync_status,
                pending_action = excluded.pending_action",
            params![
                record.local_id,
                record.remote_id,
                record.entity_type.as_str(),
                record.group_id,
                record.natural_key,
                serde_json::to_string(&record.payload)?,
                record.updated_at,
                record.sync_status.as_str(),
                record.pending_action.map(|a| a.as_str()),
            ],
        )?;
        Ok(())
    }

    /// Delete a record. Returns true if a row was removed.
    pub fn delete_record(&self, local_id: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM records WHERE local_id = ?1", params![local_id])?;
        Ok(affected > 0)
    }

    /// List live records of a type, optionally limited to one group.
    ///
    /// Records deleted locally but awaiting remote confirmation are hidden.
    pub fn list_records(
        &self,
        entity_type: EntityType,
        group_id: Option<&str>,
    ) -> Result<Vec<SyncableRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records
             WHERE entity_type = ?1 AND sync_status != 'delete'
               AND (pending_action IS NULL OR pending_action != 'delete')
               AND (?2 IS NULL OR group_id = ?2)
             ORDER BY local_id"
        );
        self.query_records(&sql, params![entity_type.as_str(), group_id])
    }

    /// List records of a type with an unconfirmed local change.
    pub fn list_unsynced(&self, entity_type: EntityType) -> Result<Vec<SyncableRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records
             WHERE entity_type = ?1 AND sync_status != 'synced'
             ORDER BY updated_at"
        );
        self.query_records(&sql, params![entity_type.as_str()])
    }

    /// List records of a type updated strictly after `since`.
    pub fn list_changed_since(
        &self,
        entity_type: EntityType,
        since: i64,
    ) -> Result<Vec<SyncableRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records
             WHERE entity_type = ?1 AND updated_at > ?2
             ORDER BY updated_at"
        );
        self.query_records(&sql, params![entity_type.as_str(), since])
    }

    /// Find the record linked to a remote document.
    pub fn find_by_remote_id(
        &self,
        entity_type: EntityType,
        remote_id: &str,
    ) -> Result<Option<SyncableRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records
             WHERE entity_type = ?1 AND remote_id = ?2
             ORDER BY local_id LIMIT 1"
        );
        let record = self
            .conn
            .query_row(&sql, params![entity_type.as_str(), remote_id], record_from_row)
            .optional()?;
        Ok(record)
    }

    /// Find a record not yet linked to any remote document by its natural key.
    pub fn find_by_natural_key(
        &self,
        entity_type: EntityType,
        group_id: &str,
        natural_key: &str,
    ) -> Result<Option<SyncableRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records
             WHERE entity_type = ?1 AND group_id = ?2 AND natural_key = ?3
               AND remote_id IS NULL
             ORDER BY local_id LIMIT 1"
        );
        let record = self
            .conn
            .query_row(
                &sql,
                params![entity_type.as_str(), group_id, natural_key],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Count records per type and sync status.
    pub fn record_counts(&self) -> Result<Vec<(EntityType, SyncStatus, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_type, sync_status, COUNT(*) FROM records
             GROUP BY entity_type, sync_status
             ORDER BY entity_type, sync_status",
        )?;
        let counts = stmt
            .query_map([], |row| {
                let type_str: String = row.get(0)?;
                let status_str: String = row.get(1)?;
                Ok((
                    parse_db(&type_str, "entity_type")?,
                    parse_db(&status_str, "sync_status")?,
                    row.get(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    /// Remove all records, queued intents, and checkpoints (sign-out).
    pub fn wipe(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(
            "DELETE FROM sync_queue;
             DELETE FROM sync_checkpoints;
             DELETE FROM records;",
        )?;
        tx.commit()?;
        Ok(())
    }

    fn query_records(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<SyncableRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let records = stmt
            .query_map(params, record_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
