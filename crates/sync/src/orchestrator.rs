// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Full sync cycles.
//!
//! A cycle uploads queued intents one entity type at a time, parents
//! first, then downloads remote changes since the scope's checkpoint for
//! each type and reconciles them. At most one cycle runs per scope; the
//! guard is released when the cycle future completes or is dropped. A
//! dropped cycle ends in `Failed` like any other failure.
//!
//! State machine: `Idle -> Syncing -> {Completed | Failed} -> Idle`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use mk_core::{EntityType, Ledger, QueueItem, ReconcileReport};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::network::NetworkMonitor;
use crate::pump::{DrainReport, UploadPump};
use crate::remote::{DocumentFilter, RemoteStore};

/// The set of documents one device syncs: everything in one group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncScope {
    pub group_id: String,
}

impl SyncScope {
    pub fn group(group_id: impl Into<String>) -> Self {
        SyncScope { group_id: group_id.into() }
    }

    pub fn filter(&self) -> DocumentFilter {
        DocumentFilter::group(self.group_id.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
    Completed,
    Failed,
}

/// Notification that local data of one type changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionChanged(pub EntityType);

/// Progress callbacks for a cycle. Every method defaults to a no-op.
pub trait SyncObserver: Send + Sync {
    fn on_started(&self) {}

    /// `percent` never decreases within a cycle.
    fn on_progress(&self, _percent: u8, _stage: &str) {}

    fn on_completed(&self, _report: &CycleReport) {}

    fn on_failed(&self, _reason: &str) {}

    /// Intents that exhausted their retries during this cycle.
    fn on_parked(&self, _items: &[QueueItem]) {}
}

/// Observer that ignores every callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {}

/// What a completed cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub uploaded: DrainReport,
    pub downloaded: ReconcileReport,
    /// Types whose local data changed, in upload order.
    pub changed: Vec<EntityType>,
}

/// Result of asking for a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// A cycle for this scope was already running.
    AlreadyRunning,
    /// Sync is turned off in the configuration.
    Disabled,
}

struct OrchestratorInner {
    ledger: Ledger,
    remote: Arc<dyn RemoteStore>,
    network: Arc<dyn NetworkMonitor>,
    pump: UploadPump,
    config: SyncConfig,
    running: Mutex<HashSet<SyncScope>>,
    state: watch::Sender<SyncState>,
    changes: broadcast::Sender<CollectionChanged>,
}

/// Runs full sync cycles. Cheap to clone.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl SyncOrchestrator {
    pub fn new(
        ledger: Ledger,
        remote: Arc<dyn RemoteStore>,
        network: Arc<dyn NetworkMonitor>,
        pump: UploadPump,
        config: SyncConfig,
        changes: broadcast::Sender<CollectionChanged>,
    ) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        SyncOrchestrator {
            inner: Arc::new(OrchestratorInner {
                ledger,
                remote,
                network,
                pump,
                config,
                running: Mutex::new(HashSet::new()),
                state,
                changes,
            }),
        }
    }

    pub fn state(&self) -> SyncState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.inner.state.subscribe()
    }

    pub fn is_syncing(&self, scope: &SyncScope) -> bool {
        lock_running(&self.inner.running).contains(scope)
    }

    /// Run one full cycle for `scope`.
    ///
    /// Returns `AlreadyRunning` without side effects if a cycle for the
    /// scope is in flight. Network and authentication are checked before
    /// any work; failures are reported to `observer` with a short reason.
    pub async fn perform_full_sync(
        &self,
        scope: &SyncScope,
        observer: &dyn SyncObserver,
    ) -> SyncResult<CycleOutcome> {
        if !self.inner.config.enabled {
            debug!("sync disabled, skipping cycle");
            return Ok(CycleOutcome::Disabled);
        }
        let Some(mut guard) = CycleGuard::acquire(&self.inner, scope) else {
            debug!(group_id = %scope.group_id, "sync already running");
            return Ok(CycleOutcome::AlreadyRunning);
        };

        self.inner.state.send_replace(SyncState::Syncing);
        observer.on_started();
        info!(group_id = %scope.group_id, "sync started");

        match self.run_cycle(scope, observer).await {
            Ok(report) => {
                guard.settle(SyncState::Completed);
                info!(
                    group_id = %scope.group_id,
                    uploaded = report.uploaded.succeeded,
                    failed = report.uploaded.failed,
                    inserted = report.downloaded.inserted,
                    updated = report.downloaded.updated,
                    deleted = report.downloaded.deleted,
                    "sync completed"
                );
                observer.on_completed(&report);
                Ok(CycleOutcome::Completed(report))
            }
            Err(e) => {
                guard.settle(SyncState::Failed);
                warn!(group_id = %scope.group_id, error = %e, "sync failed");
                self.record_failure(scope, &e);
                observer.on_failed(&e.reason());
                Err(e)
            }
        }
    }

    /// Run a cycle bounded by `deadline`. Running out of time is a failure.
    pub async fn perform_full_sync_with_deadline(
        &self,
        scope: &SyncScope,
        observer: &dyn SyncObserver,
        deadline: Duration,
    ) -> SyncResult<CycleOutcome> {
        match tokio::time::timeout(deadline, self.perform_full_sync(scope, observer)).await {
            Ok(result) => result,
            Err(_) => {
                let err = SyncError::Timeout(deadline);
                warn!(group_id = %scope.group_id, "sync did not finish within {:?}", deadline);
                self.record_failure(scope, &err);
                observer.on_failed(&err.reason());
                Err(err)
            }
        }
    }

    async fn run_cycle(
        &self,
        scope: &SyncScope,
        observer: &dyn SyncObserver,
    ) -> SyncResult<CycleReport> {
        let inner = &self.inner;
        if !inner.network.is_available() {
            return Err(SyncError::NetworkUnavailable);
        }
        if !inner.remote.is_authenticated() {
            return Err(SyncError::Unauthenticated);
        }

        let mut report = CycleReport::default();

        for (step, entity_type) in EntityType::UPLOAD_ORDER.into_iter().enumerate() {
            let percent = 10 + 15 * step as u8;
            observer.on_progress(percent, &format!("Uploading {}", entity_type.collection()));

            inner.ledger.with_db(|db| {
                let pending = db.pending_count_for(entity_type)?;
                db.begin_checkpoint(&scope.group_id, entity_type, pending)
            })?;
            let drained = inner.pump.drain(Some(entity_type)).await?;
            if drained.parked > 0 {
                let parked: Vec<QueueItem> = inner
                    .ledger
                    .with_db(|db| db.failed_items())?
                    .into_iter()
                    .filter(|item| item.entity_type == entity_type)
                    .collect();
                observer.on_parked(&parked);
            }
            report.uploaded += drained;
        }

        observer.on_progress(70, "Downloading updates");
        let filter = scope.filter();
        for entity_type in EntityType::UPLOAD_ORDER {
            let since = inner
                .ledger
                .with_db(|db| db.ensure_checkpoint(&scope.group_id, entity_type))?
                .last_sync_timestamp;
            let docs = match tokio::time::timeout(
                inner.config.request_timeout(),
                inner.remote.query(entity_type, &filter, Some(since)),
            )
            .await
            {
                Ok(result) => result?,
                Err(_) => return Err(SyncError::Timeout(inner.config.request_timeout())),
            };

            let merged = inner.ledger.reconcile(entity_type, &docs)?;
            debug!(entity_type = %entity_type, docs = docs.len(), ?merged, "reconciled download");
            if merged.changed() {
                report.changed.push(entity_type);
                // No listeners is fine
                let _ = inner.changes.send(CollectionChanged(entity_type));
            }

            let watermark = merged.max_updated_at.unwrap_or(since);
            inner.ledger.with_db(|db| {
                let pending = db.pending_count_for(entity_type)?;
                db.advance_checkpoint(&scope.group_id, entity_type, watermark, pending)
            })?;
            add_reconcile(&mut report.downloaded, &merged);
        }

        observer.on_progress(100, "Sync completed");
        Ok(report)
    }

    fn record_failure(&self, scope: &SyncScope, err: &SyncError) {
        let reason = err.reason();
        let result = self.inner.ledger.with_db(|db| {
            for entity_type in EntityType::UPLOAD_ORDER {
                db.fail_checkpoint(&scope.group_id, entity_type, &reason)?;
            }
            Ok(())
        });
        if let Err(e) = result {
            warn!(error = %e, "failed to record sync failure");
        }
    }
}

fn add_reconcile(total: &mut ReconcileReport, batch: &ReconcileReport) {
    total.inserted += batch.inserted;
    total.updated += batch.updated;
    total.deleted += batch.deleted;
    total.unchanged += batch.unchanged;
    total.kept += batch.kept;
    total.skipped += batch.skipped;
    total.max_updated_at = total.max_updated_at.max(batch.max_updated_at);
}

fn lock_running(running: &Mutex<HashSet<SyncScope>>) -> std::sync::MutexGuard<'_, HashSet<SyncScope>> {
    running.lock().unwrap_or_else(|e| e.into_inner())
}

/// Single-flight guard for one scope.
///
/// Dropping it frees the scope, clears stale `is_syncing` flags, and
/// returns the state to `Idle` once no scope is syncing. A guard dropped
/// before [`CycleGuard::settle`] reports `Failed` first.
struct CycleGuard<'a> {
    inner: &'a OrchestratorInner,
    scope: SyncScope,
    settled: bool,
}

impl<'a> CycleGuard<'a> {
    fn acquire(inner: &'a OrchestratorInner, scope: &SyncScope) -> Option<Self> {
        if !lock_running(&inner.running).insert(scope.clone()) {
            return None;
        }
        Some(CycleGuard { inner, scope: scope.clone(), settled: false })
    }

    /// Publish the end state of the cycle.
    fn settle(&mut self, state: SyncState) {
        self.settled = true;
        self.inner.state.send_replace(state);
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.inner.state.send_replace(SyncState::Failed);
        }
        if let Err(e) = self.inner.ledger.with_db(|db| db.clear_syncing()) {
            warn!(error = %e, "failed to clear syncing flags");
        }
        let mut running = lock_running(&self.inner.running);
        running.remove(&self.scope);
        if running.is_empty() {
            self.inner.state.send_replace(SyncState::Idle);
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
