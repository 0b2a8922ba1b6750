// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queue and checkpoint inspection: `status`, `queue`, `retry`.

use serde::Serialize;

use mk_core::{EntityType, QueueItem, SyncCheckpoint, SyncStatus};

use super::format_ms;
use crate::cli::OutputFormat;
use crate::error::Result;
use crate::state::StateDir;

#[derive(Debug, Serialize)]
struct StatusReport {
    state_dir: String,
    pending: usize,
    parked: usize,
    records: Vec<RecordCount>,
    checkpoints: Vec<SyncCheckpoint>,
}

#[derive(Debug, Serialize)]
struct RecordCount {
    entity_type: EntityType,
    sync_status: SyncStatus,
    count: i64,
}

/// Show pending and parked uploads plus per-group checkpoints.
pub fn status(state: &StateDir, output: OutputFormat) -> Result<()> {
    let ledger = state.open_ledger()?;
    let report = ledger.with_db(|db| {
        Ok(StatusReport {
            state_dir: state.root().display().to_string(),
            pending: db.pending_count()?,
            parked: db.failed_count()?,
            records: db
                .record_counts()?
                .into_iter()
                .map(|(entity_type, sync_status, count)| RecordCount {
                    entity_type,
                    sync_status,
                    count,
                })
                .collect(),
            checkpoints: db.list_checkpoints()?,
        })
    })?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_status(&report),
    }
    Ok(())
}

fn print_status(report: &StatusReport) {
    println!("State: {}", report.state_dir);
    println!("Pending uploads: {}", report.pending);
    println!("Parked uploads: {}", report.parked);
    if report.parked > 0 {
        println!("  hint: run 'mk queue --failed' to inspect, 'mk retry' to requeue");
    }

    if !report.records.is_empty() {
        println!();
        println!("Records:");
        for row in &report.records {
            println!(
                "  {:<8} {:<9} {}",
                row.entity_type.as_str(),
                row.sync_status.as_str(),
                row.count
            );
        }
    }

    if !report.checkpoints.is_empty() {
        println!();
        println!("Checkpoints:");
        for cp in &report.checkpoints {
            let mut line = format!(
                "  {:<12} {:<8} last sync {}  pending {}",
                cp.scope.as_str(),
                cp.entity_type.as_str(),
                format_ms(cp.last_sync_timestamp),
                cp.pending_operation_count
            );
            if cp.is_syncing {
                line.push_str("  (syncing)");
            }
            if let Some(err) = &cp.last_error {
                line.push_str(&format!("  error: {}", err));
            }
            println!("{}", line);
        }
    }
}

/// List queued intents, or only the parked ones.
pub fn queue(state: &StateDir, failed: bool, output: OutputFormat) -> Result<()> {
    let ledger = state.open_ledger()?;
    let items = ledger.with_db(|db| if failed { db.failed_items() } else { db.list_queue() })?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    if items.is_empty() {
        println!("{}", if failed { "No parked uploads" } else { "Queue is empty" });
        return Ok(());
    }
    for item in &items {
        print_item(item);
    }
    Ok(())
}

fn print_item(item: &QueueItem) {
    println!(
        "{:>4}  {:<6} {:<8} {}  {}  retries={}",
        item.id,
        item.operation.as_str(),
        item.entity_type.as_str(),
        item.entity_id,
        item.status.as_str(),
        item.retry_count
    );
    if let Some(err) = &item.last_error {
        println!("      error: {}", err);
    }
}

/// Requeue parked intents; they upload on the next sync.
pub fn retry(state: &StateDir) -> Result<()> {
    let ledger = state.open_ledger()?;
    let requeued = ledger.with_db(|db| db.retry_failed())?;
    if requeued == 0 {
        println!("No parked uploads");
    } else {
        println!("Requeued {} parked upload(s); they upload on the next sync", requeued);
    }
    Ok(())
}
