// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Merge remote documents into local state with last-write-wins.
//!
//! Rules, per document:
//! - No local record: insert it as `Synced` (tombstones are ignored)
//! - Local record `Synced`: remote overwrites it
//! - Local record has an unconfirmed edit: remote wins only if strictly
//!   newer, and then the stale queued intent is dropped
//!
//! A winning tombstone deletes the local record. Each document commits in
//! its own transaction.

use tracing::{debug, warn};

use crate::db::Database;
use crate::entity::EntityType;
use crate::error::Result;
use crate::record::{new_local_id, RemoteDocument, SyncableRecord};

/// What reconciling one document did to local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Inserted,
    Updated,
    Deleted,
    /// Local state already matched the document.
    Unchanged,
    /// A newer or equal local edit survived.
    LocalKept,
    /// The document or its local record could not be processed.
    Skipped,
}

impl ReconcileOutcome {
    /// Returns true if local state visible to readers changed.
    pub fn changed(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::Inserted | ReconcileOutcome::Updated | ReconcileOutcome::Deleted
        )
    }
}

/// Tally of a reconciled batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub kept: usize,
    pub skipped: usize,
    /// Largest `updated_at` seen in the batch.
    pub max_updated_at: Option<i64>,
}

impl ReconcileReport {
    fn record(&mut self, outcome: ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Inserted => self.inserted += 1,
            ReconcileOutcome::Updated => self.updated += 1,
            ReconcileOutcome::Deleted => self.deleted += 1,
            ReconcileOutcome::Unchanged => self.unchanged += 1,
            ReconcileOutcome::LocalKept => self.kept += 1,
            ReconcileOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Returns true if any document changed local state.
    pub fn changed(&self) -> bool {
        self.inserted + self.updated + self.deleted > 0
    }
}

/// Trait for merging remote documents into local state.
pub trait Reconcile {
    /// Reconciles one document.
    fn reconcile(&self, doc: &RemoteDocument) -> Result<ReconcileOutcome>;

    /// Reconciles a batch of documents of one type.
    ///
    /// Documents of another type and records that fail to load are logged
    /// and skipped; they never abort the rest of the batch.
    fn reconcile_all(
        &self,
        entity_type: EntityType,
        docs: &[RemoteDocument],
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        for doc in docs {
            report.max_updated_at = report.max_updated_at.max(Some(doc.updated_at));
            if doc.entity_type != entity_type {
                warn!(doc = %doc.id, expected = %entity_type, actual = %doc.entity_type, "skipping misfiled document");
                report.record(ReconcileOutcome::Skipped);
                continue;
            }
            match self.reconcile(doc) {
                Ok(outcome) => report.record(outcome),
                Err(e) if e.is_corruption() => {
                    warn!(doc = %doc.id, entity_type = %entity_type, error = %e, "skipping corrupt record");
                    report.record(ReconcileOutcome::Skipped);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }
}

impl Database {
    /// Find the local record a remote document refers to.
    ///
    /// Tries the linked remote id, then the local id (creates upload under
    /// their local id), then the natural key of an unlinked record.
    pub fn match_document(&self, doc: &RemoteDocument) -> Result<Option<SyncableRecord>> {
        if let Some(record) = self.find_by_remote_id(doc.entity_type, &doc.id)? {
            return Ok(Some(record));
        }
        if let Some(record) = self.find_record(&doc.id)? {
            let linkable = record.entity_type == doc.entity_type
                && record.remote_id.as_deref().is_none_or(|id| id == doc.id);
            if linkable {
                return Ok(Some(record));
            }
        }
        if let Some(key) = &doc.natural_key {
            return self.find_by_natural_key(doc.entity_type, &doc.group_id, key);
        }
        Ok(None)
    }
}

impl Reconcile for Database {
    fn reconcile(&self, doc: &RemoteDocument) -> Result<ReconcileOutcome> {
        let tx = self.conn.unchecked_transaction()?;

        let outcome = match self.match_document(doc)? {
            None if doc.deleted => ReconcileOutcome::Unchanged,
            None => {
                self.upsert_record(&SyncableRecord::from_remote(new_local_id(), doc))?;
                ReconcileOutcome::Inserted
            }
            Some(local) => {
                let remote_wins =
                    local.sync_status.is_synced() || doc.updated_at > local.updated_at;
                if !remote_wins {
                    ReconcileOutcome::LocalKept
                } else if doc.deleted {
                    self.drop_intent(local.entity_type, &local.local_id)?;
                    self.delete_record(&local.local_id)?;
                    ReconcileOutcome::Deleted
                } else if doc.matches(&local) {
                    ReconcileOutcome::Unchanged
                } else {
                    if self.drop_intent(local.entity_type, &local.local_id)? {
                        debug!(local_id = %local.local_id, "remote edit superseded queued intent");
                    }
                    self.upsert_record(&SyncableRecord::from_remote(local.local_id, doc))?;
                    ReconcileOutcome::Updated
                }
            }
        };

        tx.commit()?;
        debug!(doc = %doc.id, entity_type = %doc.entity_type, ?outcome, "reconciled");
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
