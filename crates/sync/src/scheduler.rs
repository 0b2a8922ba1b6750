// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic full sync.
//!
//! Runs a bounded cycle once at start and then every interval, skipping
//! ticks while the network is down. A failed or timed-out cycle simply
//! waits for the next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::network::NetworkMonitor;
use crate::orchestrator::{CycleOutcome, SyncObserver, SyncOrchestrator, SyncScope};

/// Schedule for the periodic task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub interval: Duration,
    /// Upper bound on each cycle.
    pub deadline: Duration,
}

/// Handle to a running periodic sync task.
pub struct PeriodicSync {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PeriodicSync {
    /// Spawn the periodic task. It stops when `parent` is cancelled or
    /// [`stop`](Self::stop) is called.
    pub fn spawn(
        orchestrator: SyncOrchestrator,
        network: Arc<dyn NetworkMonitor>,
        scope: SyncScope,
        schedule: Schedule,
        observer: Arc<dyn SyncObserver>,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let task = tokio::spawn(run(orchestrator, network, scope, schedule, observer, cancel.clone()));
        PeriodicSync { cancel, task }
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

async fn run(
    orchestrator: SyncOrchestrator,
    network: Arc<dyn NetworkMonitor>,
    scope: SyncScope,
    schedule: Schedule,
    observer: Arc<dyn SyncObserver>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(schedule.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        if !network.is_available() {
            debug!(group_id = %scope.group_id, "network down, skipping scheduled sync");
            continue;
        }

        let cycle = orchestrator.perform_full_sync_with_deadline(&scope, observer.as_ref(), schedule.deadline);
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = cycle => result,
        };
        match result {
            Ok(CycleOutcome::Completed(_)) => debug!(group_id = %scope.group_id, "scheduled sync done"),
            Ok(outcome) => debug!(group_id = %scope.group_id, ?outcome, "scheduled sync skipped"),
            Err(e) => warn!(group_id = %scope.group_id, error = %e, "scheduled sync failed, retrying next interval"),
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
