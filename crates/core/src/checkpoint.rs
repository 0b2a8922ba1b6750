// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Download watermarks per sync scope and entity type.
//!
//! A scope is the group a cycle syncs. Each scope keeps its own
//! watermarks, since a query for one group says nothing about another.

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{parse_db, Database};
use crate::entity::EntityType;
use crate::error::Result;

/// Sync progress for one entity type within one scope.
///
/// Remote changes in the scope with `updated_at` at or below
/// `last_sync_timestamp` are assumed already merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    pub scope: String,
    pub entity_type: EntityType,
    pub last_sync_timestamp: i64,
    pub pending_operation_count: i64,
    pub is_syncing: bool,
    pub last_error: Option<String>,
}

impl SyncCheckpoint {
    fn new(scope: &str, entity_type: EntityType) -> Self {
        SyncCheckpoint {
            scope: scope.to_string(),
            entity_type,
            last_sync_timestamp: 0,
            pending_operation_count: 0,
            is_syncing: false,
            last_error: None,
        }
    }
}

const CHECKPOINT_COLUMNS: &str =
    "scope, entity_type, last_sync_timestamp, pending_operation_count, is_syncing, last_error";

fn checkpoint_from_row(row: &Row<'_>) -> std::result::Result<SyncCheckpoint, rusqlite::Error> {
    let type_str: String = row.get(1)?;
    Ok(SyncCheckpoint {
        scope: row.get(0)?,
        entity_type: parse_db(&type_str, "entity_type")?,
        last_sync_timestamp: row.get(2)?,
        pending_operation_count: row.get(3)?,
        is_syncing: row.get(4)?,
        last_error: row.get(5)?,
    })
}

fn upload_rank(entity_type: EntityType) -> usize {
    EntityType::UPLOAD_ORDER
        .iter()
        .position(|t| *t == entity_type)
        .unwrap_or(EntityType::UPLOAD_ORDER.len())
}

impl Database {
    /// Get the checkpoint for a type in `scope`, if one was ever created.
    pub fn get_checkpoint(
        &self,
        scope: &str,
        entity_type: EntityType,
    ) -> Result<Option<SyncCheckpoint>> {
        let checkpoint = self
            .conn
            .query_row(
                &format!(
                    "SELECT {CHECKPOINT_COLUMNS} FROM sync_checkpoints
                     WHERE scope = ?1 AND entity_type = ?2"
                ),
                params![scope, entity_type.as_str()],
                checkpoint_from_row,
            )
            .optional()?;
        Ok(checkpoint)
    }

    /// Get the checkpoint for a type in `scope`, creating it on first use.
    pub fn ensure_checkpoint(&self, scope: &str, entity_type: EntityType) -> Result<SyncCheckpoint> {
        self.conn.execute(
            "INSERT OR IGNORE INTO sync_checkpoints (scope, entity_type) VALUES (?1, ?2)",
            params![scope, entity_type.as_str()],
        )?;
        Ok(self
            .get_checkpoint(scope, entity_type)?
            .unwrap_or_else(|| SyncCheckpoint::new(scope, entity_type)))
    }

    /// List all checkpoints, by scope and then in upload order.
    pub fn list_checkpoints(&self) -> Result<Vec<SyncCheckpoint>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {CHECKPOINT_COLUMNS} FROM sync_checkpoints"))?;
        let mut checkpoints = stmt
            .query_map([], checkpoint_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        checkpoints.sort_by(|a, b| {
            a.scope
                .cmp(&b.scope)
                .then_with(|| upload_rank(a.entity_type).cmp(&upload_rank(b.entity_type)))
        });
        Ok(checkpoints)
    }

    /// Mark a type as syncing and record how many intents it has queued.
    pub fn begin_checkpoint(&self, scope: &str, entity_type: EntityType, pending: usize) -> Result<()> {
        self.ensure_checkpoint(scope, entity_type)?;
        self.conn.execute(
            "UPDATE sync_checkpoints SET is_syncing = 1, pending_operation_count = ?1
             WHERE scope = ?2 AND entity_type = ?3",
            params![pending as i64, scope, entity_type.as_str()],
        )?;
        Ok(())
    }

    /// Advance the watermark after a successful download.
    ///
    /// The watermark never moves backwards.
    pub fn advance_checkpoint(
        &self,
        scope: &str,
        entity_type: EntityType,
        watermark: i64,
        pending: usize,
    ) -> Result<()> {
        self.ensure_checkpoint(scope, entity_type)?;
        self.conn.execute(
            "UPDATE sync_checkpoints
             SET last_sync_timestamp = MAX(last_sync_timestamp, ?1),
                 pending_operation_count = ?2, is_syncing = 0, last_error = NULL
             WHERE scope = ?3 AND entity_type = ?4",
            params![watermark, pending as i64, scope, entity_type.as_str()],
        )?;
        Ok(())
    }

    /// Clear every `is_syncing` flag left by an interrupted cycle.
    pub fn clear_syncing(&self) -> Result<()> {
        self.conn
            .execute("UPDATE sync_checkpoints SET is_syncing = 0 WHERE is_syncing != 0", [])?;
        Ok(())
    }

    /// Record a failed cycle for a type, leaving its watermark untouched.
    pub fn fail_checkpoint(&self, scope: &str, entity_type: EntityType, error: &str) -> Result<()> {
        self.ensure_checkpoint(scope, entity_type)?;
        self.conn.execute(
            "UPDATE sync_checkpoints SET is_syncing = 0, last_error = ?1
             WHERE scope = ?2 AND entity_type = ?3",
            params![error, scope, entity_type.as_str()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
