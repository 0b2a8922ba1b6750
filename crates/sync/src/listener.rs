// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime subscriptions.
//!
//! One task per collection feeds document batches to the reconciler and
//! publishes [`CollectionChanged`] when local data moved. Broken
//! subscriptions are reopened with exponential backoff.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mk_core::{EntityType, Ledger, RemoteDocument};

use crate::orchestrator::{CollectionChanged, SyncScope};
use crate::remote::RemoteStore;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

struct Active {
    scope: SyncScope,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

struct ListenerInner {
    ledger: Ledger,
    remote: Arc<dyn RemoteStore>,
    changes: broadcast::Sender<CollectionChanged>,
    active: Mutex<Option<Active>>,
}

/// Keeps local data current while a scope is open.
#[derive(Clone)]
pub struct RealtimeListener {
    inner: Arc<ListenerInner>,
}

impl RealtimeListener {
    pub fn new(
        ledger: Ledger,
        remote: Arc<dyn RemoteStore>,
        changes: broadcast::Sender<CollectionChanged>,
    ) -> Self {
        RealtimeListener {
            inner: Arc::new(ListenerInner { ledger, remote, changes, active: Mutex::new(None) }),
        }
    }

    /// Listen to every collection of `scope`.
    ///
    /// A no-op returning false when already listening to the same scope;
    /// a different scope replaces the old subscriptions. Tasks stop when
    /// `parent` is cancelled.
    pub fn start(&self, scope: &SyncScope, parent: &CancellationToken) -> bool {
        let mut active = self.lock();
        if let Some(current) = active.as_ref() {
            if current.scope == *scope && !current.cancel.is_cancelled() {
                debug!(group_id = %scope.group_id, "already listening");
                return false;
            }
        }
        if let Some(old) = active.take() {
            old.cancel.cancel();
        }

        let cancel = parent.child_token();
        let tasks = EntityType::UPLOAD_ORDER
            .into_iter()
            .map(|entity_type| {
                tokio::spawn(listen(
                    Arc::clone(&self.inner),
                    scope.clone(),
                    entity_type,
                    cancel.clone(),
                ))
            })
            .collect();
        *active = Some(Active { scope: scope.clone(), cancel, tasks });
        info!(group_id = %scope.group_id, "listening for remote changes");
        true
    }

    /// Cancel the subscriptions and wait for their tasks to finish.
    pub async fn stop(&self) {
        let Some(active) = self.lock().take() else {
            return;
        };
        active.cancel.cancel();
        for task in active.tasks {
            let _ = task.await;
        }
        debug!(group_id = %active.scope.group_id, "stopped listening");
    }

    /// The scope being listened to, if any.
    pub fn scope(&self) -> Option<SyncScope> {
        self.lock()
            .as_ref()
            .filter(|a| !a.cancel.is_cancelled())
            .map(|a| a.scope.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CollectionChanged> {
        self.inner.changes.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Active>> {
        self.inner.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ListenerInner {
    fn apply(&self, entity_type: EntityType, batch: &[RemoteDocument]) {
        match self.ledger.reconcile(entity_type, batch) {
            Ok(report) => {
                debug!(entity_type = %entity_type, docs = batch.len(), ?report, "applied remote batch");
                if report.changed() {
                    // No listeners is fine
                    let _ = self.changes.send(CollectionChanged(entity_type));
                }
            }
            Err(e) => warn!(entity_type = %entity_type, error = %e, "failed to apply remote batch"),
        }
    }
}

async fn listen(
    inner: Arc<ListenerInner>,
    scope: SyncScope,
    entity_type: EntityType,
    cancel: CancellationToken,
) {
    let filter = scope.filter();
    let mut backoff = INITIAL_BACKOFF;

    loop {
        let subscribed = tokio::select! {
            _ = cancel.cancelled() => return,
            result = inner.remote.subscribe(entity_type, &filter) => result,
        };

        match subscribed {
            Ok(mut stream) => loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => return,
                    next = stream.next() => next,
                };
                match next {
                    Some(Ok(batch)) => {
                        backoff = INITIAL_BACKOFF;
                        inner.apply(entity_type, &batch);
                    }
                    Some(Err(e)) => {
                        warn!(entity_type = %entity_type, error = %e, "subscription failed");
                        break;
                    }
                    None => {
                        debug!(entity_type = %entity_type, "subscription ended");
                        break;
                    }
                }
            },
            Err(e) => warn!(entity_type = %entity_type, error = %e, "subscribe failed"),
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = std::cmp::min(backoff.saturating_mul(2), MAX_BACKOFF);
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
