// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Application-lifetime owner of the sync runtime.
//!
//! A [`SyncService`] is constructed once with its ledger, remote store and
//! network monitor. [`start`](SyncService::start) spawns:
//! - the drain worker, which serves drain requests one at a time
//! - the network watcher, which requests a drain when connectivity returns
//! - the periodic full sync
//! - the realtime listener (when enabled)
//!
//! Every task hangs off one `CancellationToken`, so
//! [`shutdown`](SyncService::shutdown) stops all in-flight work.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mk_core::{Ledger, QueueItem};

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::listener::RealtimeListener;
use crate::network::{ConnectivityTracker, DrainRequest, NetworkEvent, NetworkMonitor};
use crate::orchestrator::{
    CollectionChanged, CycleOutcome, SyncObserver, SyncOrchestrator, SyncScope,
};
use crate::pump::UploadPump;
use crate::remote::RemoteStore;
use crate::scheduler::{PeriodicSync, Schedule};

const CHANGES_CAPACITY: usize = 64;

struct Running {
    scope: SyncScope,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    periodic: PeriodicSync,
}

/// Owns the sync components and their background tasks.
pub struct SyncService {
    ledger: Ledger,
    network: Arc<dyn NetworkMonitor>,
    config: SyncConfig,
    pump: UploadPump,
    orchestrator: SyncOrchestrator,
    listener: RealtimeListener,
    changes: broadcast::Sender<CollectionChanged>,
    drain_tx: mpsc::Sender<DrainRequest>,
    drain_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<DrainRequest>>>,
    cancel: CancellationToken,
    running: Mutex<Option<Running>>,
}

impl SyncService {
    pub fn new(
        ledger: Ledger,
        remote: Arc<dyn RemoteStore>,
        network: Arc<dyn NetworkMonitor>,
        config: SyncConfig,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGES_CAPACITY);
        let (drain_tx, drain_rx) = mpsc::channel(config.drain_channel_capacity.max(1));
        let pump = UploadPump::new(ledger.clone(), Arc::clone(&remote), &config);
        let orchestrator = SyncOrchestrator::new(
            ledger.clone(),
            Arc::clone(&remote),
            Arc::clone(&network),
            pump.clone(),
            config.clone(),
            changes.clone(),
        );
        let listener = RealtimeListener::new(ledger.clone(), remote, changes.clone());

        SyncService {
            ledger,
            network,
            config,
            pump,
            orchestrator,
            listener,
            changes,
            drain_tx,
            drain_rx: Arc::new(tokio::sync::Mutex::new(drain_rx)),
            cancel: CancellationToken::new(),
            running: Mutex::new(None),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.orchestrator
    }

    /// Start background sync for `scope`.
    ///
    /// Returns false if already running for the same scope or after
    /// shutdown. A different scope replaces the running tasks.
    pub fn start(&self, scope: &SyncScope, observer: Arc<dyn SyncObserver>) -> bool {
        if self.cancel.is_cancelled() {
            warn!("sync service already shut down");
            return false;
        }
        let mut running = self.lock_running();
        if running.as_ref().is_some_and(|r| r.scope == *scope) {
            return false;
        }
        if let Some(old) = running.take() {
            old.cancel.cancel();
        }

        let cancel = self.cancel.child_token();
        let tracker = ConnectivityTracker::new(self.network.is_available(), self.drain_tx.clone());
        let tasks = vec![
            tokio::spawn(drain_worker(
                self.pump.clone(),
                Arc::clone(&self.network),
                Arc::clone(&self.drain_rx),
                self.ledger.clone(),
                self.config.enabled,
                Arc::clone(&observer),
                cancel.clone(),
            )),
            tokio::spawn(watch_network(self.network.subscribe(), tracker, cancel.clone())),
        ];
        let periodic = PeriodicSync::spawn(
            self.orchestrator.clone(),
            Arc::clone(&self.network),
            scope.clone(),
            Schedule { interval: self.config.interval(), deadline: self.config.cycle_timeout() },
            observer,
            &cancel,
        );
        if self.config.listen {
            self.listener.start(scope, &cancel);
        }

        *running = Some(Running { scope: scope.clone(), cancel, tasks, periodic });
        drop(running);
        info!(group_id = %scope.group_id, "sync service started");

        // Flush edits made while the service was down
        if self.ledger.with_db(|db| db.has_pending()).unwrap_or(false) {
            self.request_drain();
        }
        true
    }

    /// Ask the drain worker to upload queued intents.
    ///
    /// Never blocks. Returns false if the request was dropped because one
    /// is already waiting or the service is shut down.
    pub fn request_drain(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        match self.drain_tx.try_send(DrainRequest::Requested) {
            Ok(()) => true,
            Err(e) => {
                debug!("drain request not queued: {}", e);
                false
            }
        }
    }

    /// Run one full cycle now, outside the schedule.
    pub async fn sync_now(
        &self,
        scope: &SyncScope,
        observer: &dyn SyncObserver,
    ) -> SyncResult<CycleOutcome> {
        self.orchestrator.perform_full_sync(scope, observer).await
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<CollectionChanged> {
        self.changes.subscribe()
    }

    /// Intents parked after exhausting their retries.
    pub fn failed_items(&self) -> SyncResult<Vec<QueueItem>> {
        Ok(self.ledger.with_db(|db| db.failed_items())?)
    }

    /// Requeue parked intents and request a drain. Returns how many were
    /// requeued.
    pub fn retry_failed(&self) -> SyncResult<usize> {
        let requeued = self.ledger.with_db(|db| db.retry_failed())?;
        if requeued > 0 {
            info!(requeued, "retrying parked uploads");
            self.request_drain();
        }
        Ok(requeued)
    }

    pub fn pending_count(&self) -> SyncResult<usize> {
        Ok(self.ledger.with_db(|db| db.pending_count())?)
    }

    /// Cancel all background work and wait for it to stop.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let running = self.lock_running().take();
        if let Some(running) = running {
            for task in running.tasks {
                let _ = task.await;
            }
            running.periodic.stop().await;
        }
        self.listener.stop().await;
        info!("sync service stopped");
    }

    /// Sign out: stop everything and wipe records, queue and checkpoints.
    pub async fn reset(&self) -> SyncResult<()> {
        self.shutdown().await;
        self.ledger.wipe()?;
        info!("local sync state wiped");
        Ok(())
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn drain_worker(
    pump: UploadPump,
    network: Arc<dyn NetworkMonitor>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<DrainRequest>>>,
    ledger: Ledger,
    enabled: bool,
    observer: Arc<dyn SyncObserver>,
    cancel: CancellationToken,
) {
    let mut requests = tokio::select! {
        _ = cancel.cancelled() => return,
        requests = receiver.lock() => requests,
    };

    loop {
        let request = tokio::select! {
            _ = cancel.cancelled() => return,
            request = requests.recv() => match request {
                Some(request) => request,
                None => return,
            },
        };
        if !enabled {
            debug!(?request, "sync disabled, ignoring drain request");
            continue;
        }
        if !network.is_available() {
            debug!(?request, "network down, deferring drain");
            continue;
        }

        let drained = tokio::select! {
            _ = cancel.cancelled() => return,
            drained = pump.drain(None) => drained,
        };
        match drained {
            Ok(report) if report.parked > 0 => match ledger.with_db(|db| db.failed_items()) {
                Ok(parked) => observer.on_parked(&parked),
                Err(e) => warn!(error = %e, "failed to list parked uploads"),
            },
            Ok(_) => {}
            Err(e) => warn!(?request, error = %e, "drain failed"),
        }
    }
}

async fn watch_network(
    mut availability: watch::Receiver<bool>,
    tracker: ConnectivityTracker,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            changed = availability.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
        let available = *availability.borrow_and_update();
        let event = if available { NetworkEvent::Available } else { NetworkEvent::Lost };
        if tracker.on_event(event) {
            debug!("connectivity regained, drain requested");
        }
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
