// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `sync` and `watch`: run the sync runtime against a shared folder.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use mk_core::Ledger;
use mk_sync::{
    AlwaysOnline, CollectionChanged, CycleOutcome, DirRemoteStore, SyncConfig, SyncError,
    SyncScope, SyncService,
};

use super::ProgressPrinter;
use crate::cli::RemoteArgs;
use crate::error::Result;
use crate::state::StateDir;

/// How often `watch` looks for edits made by other `mk` processes.
const LOCAL_POLL: Duration = Duration::from_secs(2);

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread().enable_all().build()?)
}

fn service(ledger: Ledger, args: &RemoteArgs, config: SyncConfig) -> SyncService {
    SyncService::new(
        ledger,
        Arc::new(DirRemoteStore::new(&args.remote)),
        Arc::new(AlwaysOnline::new()),
        config,
    )
}

fn enabled_config(state: &StateDir) -> Result<SyncConfig> {
    let config = state.load_config()?;
    if !config.enabled {
        return Err(SyncError::Disabled.into());
    }
    Ok(config)
}

/// Run one bounded full cycle.
pub fn sync(state: &StateDir, args: RemoteArgs) -> Result<()> {
    let _lock = state.acquire_lock()?;
    let config = enabled_config(state)?;
    let deadline = config.cycle_timeout();
    let service = service(state.open_ledger()?, &args, config);
    let scope = SyncScope::group(args.group.clone());

    let outcome = runtime()?.block_on(async {
        service
            .orchestrator()
            .perform_full_sync_with_deadline(&scope, &ProgressPrinter::one_shot(), deadline)
            .await
    })?;

    match outcome {
        CycleOutcome::Completed(report) => {
            let downloaded =
                report.downloaded.inserted + report.downloaded.updated + report.downloaded.deleted;
            println!(
                "Synced group {}: {} uploaded, {} downloaded",
                scope.group_id, report.uploaded.succeeded, downloaded
            );
            if report.uploaded.failed > 0 || report.uploaded.parked > 0 {
                println!(
                    "{} upload(s) failed, {} parked; see 'mk status'",
                    report.uploaded.failed, report.uploaded.parked
                );
            }
            Ok(())
        }
        CycleOutcome::AlreadyRunning => {
            println!("A sync for group {} is already running", scope.group_id);
            Ok(())
        }
        CycleOutcome::Disabled => Err(SyncError::Disabled.into()),
    }
}

/// Keep the sync service running until Ctrl-C.
pub fn watch(state: &StateDir, args: RemoteArgs) -> Result<()> {
    let _lock = state.acquire_lock()?;
    let config = enabled_config(state)?;
    let service = service(state.open_ledger()?, &args, config);
    let scope = SyncScope::group(args.group.clone());

    runtime()?.block_on(async {
        let mut changes = service.subscribe_changes();
        service.start(&scope, Arc::new(ProgressPrinter::long_running()));
        println!(
            "Watching group {} via {} (Ctrl-C to stop)",
            scope.group_id,
            args.remote.display()
        );

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut poll = tokio::time::interval(LOCAL_POLL);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => break,
                _ = poll.tick() => {
                    if service.pending_count().unwrap_or(0) > 0 {
                        service.request_drain();
                    }
                }
                changed = changes.recv() => match changed {
                    Ok(CollectionChanged(entity_type)) => {
                        info!(%entity_type, "local data updated from remote");
                    }
                    Err(RecvError::Lagged(missed)) => debug!(missed, "change feed lagged"),
                    Err(RecvError::Closed) => break,
                },
            }
        }

        service.shutdown().await;
        println!("Stopped");
    });
    Ok(())
}
