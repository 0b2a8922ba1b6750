// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Upload pump: drains queued intents to the remote store.
//!
//! Each intent is claimed (`Processing`), uploaded with a per-request
//! timeout, and then either completed or marked failed. Failures of one
//! item never stop its siblings. Dropping a drain mid-upload returns the
//! claimed item to `Pending` without counting a retry.

use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use mk_core::{EntityType, Ledger, Operation, QueueItem, QueueStatus};

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::remote::{RemoteError, RemoteStore, UpsertAck, UpsertRequest};

/// Tally of one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub succeeded: usize,
    /// Failed attempts, parked ones included.
    pub failed: usize,
    /// Items that hit the retry ceiling during this drain.
    pub parked: usize,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.succeeded == 0 && self.failed == 0
    }
}

impl AddAssign for DrainReport {
    fn add_assign(&mut self, other: Self) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.parked += other.parked;
    }
}

enum Upload {
    Succeeded,
    Failed,
    Parked,
    /// Superseded or claimed by someone else.
    Skipped,
}

struct PumpInner {
    ledger: Ledger,
    remote: Arc<dyn RemoteStore>,
    max_retries: u32,
    request_timeout: Duration,
    drain_lock: Mutex<()>,
}

/// Drains the mutation queue. Cheap to clone; clones share one drain lock.
#[derive(Clone)]
pub struct UploadPump {
    inner: Arc<PumpInner>,
}

impl UploadPump {
    pub fn new(ledger: Ledger, remote: Arc<dyn RemoteStore>, config: &SyncConfig) -> Self {
        UploadPump {
            inner: Arc::new(PumpInner {
                ledger,
                remote,
                max_retries: config.max_retries,
                request_timeout: config.request_timeout(),
                drain_lock: Mutex::new(()),
            }),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.inner.max_retries
    }

    /// Upload queued intents for one type, or for every type in upload
    /// order.
    ///
    /// Only local store failures abort the drain.
    pub async fn drain(&self, entity_type: Option<EntityType>) -> SyncResult<DrainReport> {
        let _serialized = self.inner.drain_lock.lock().await;

        let types = match entity_type {
            Some(t) => vec![t],
            None => EntityType::UPLOAD_ORDER.to_vec(),
        };
        let mut report = DrainReport::default();
        for entity_type in types {
            report += self.drain_type(entity_type).await?;
        }

        if !report.is_empty() {
            info!(
                succeeded = report.succeeded,
                failed = report.failed,
                parked = report.parked,
                "drained upload queue"
            );
        }
        Ok(report)
    }

    async fn drain_type(&self, entity_type: EntityType) -> SyncResult<DrainReport> {
        let items = self
            .inner
            .ledger
            .with_db(|db| db.dequeue_batch(self.inner.max_retries, Some(entity_type)))?;

        let mut report = DrainReport::default();
        for item in items {
            match self.upload(&item).await? {
                Upload::Succeeded => report.succeeded += 1,
                Upload::Failed => report.failed += 1,
                Upload::Parked => {
                    report.failed += 1;
                    report.parked += 1;
                }
                Upload::Skipped => {}
            }
        }
        Ok(report)
    }

    async fn upload(&self, item: &QueueItem) -> SyncResult<Upload> {
        let ledger = &self.inner.ledger;
        if !ledger.with_db(|db| db.mark_processing(item.id))? {
            debug!(id = item.id, "queue item superseded, skipping");
            return Ok(Upload::Skipped);
        }
        let mut claim = Claim { ledger, id: item.id, armed: true };

        let pushed = match tokio::time::timeout(self.inner.request_timeout, self.push(item)).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout.to_string()),
        };

        let reason = match pushed {
            Ok(ack) => match ledger.complete_upload(item, &ack.id, ack.updated_at) {
                Ok(_) => {
                    claim.armed = false;
                    debug!(
                        id = item.id,
                        entity_type = %item.entity_type,
                        entity_id = %item.entity_id,
                        remote_id = %ack.id,
                        "uploaded"
                    );
                    return Ok(Upload::Succeeded);
                }
                Err(e) if e.is_corruption() => {
                    warn!(entity_id = %item.entity_id, error = %e, "corrupt local record, upload not applied");
                    e.to_string()
                }
                Err(e) => return Err(e.into()),
            },
            Err(reason) => reason,
        };

        let status = ledger.with_db(|db| db.mark_failed(item.id, &reason, self.inner.max_retries))?;
        claim.armed = false;
        warn!(
            id = item.id,
            entity_type = %item.entity_type,
            entity_id = %item.entity_id,
            retry = item.retry_count + 1,
            error = %reason,
            "upload failed"
        );
        Ok(match status {
            Some(QueueStatus::Failed) => Upload::Parked,
            _ => Upload::Failed,
        })
    }

    /// Send one intent. Errors are returned as text for the queue item.
    async fn push(&self, item: &QueueItem) -> Result<UpsertAck, String> {
        let remote = &self.inner.remote;
        match item.operation {
            Operation::Create | Operation::Update => {
                let snapshot = item.snapshot().map_err(|e| e.to_string())?;
                let id = item.remote_id.clone().unwrap_or_else(|| item.entity_id.clone());
                let request = UpsertRequest {
                    entity_type: item.entity_type,
                    id: Some(id),
                    group_id: snapshot.group_id,
                    natural_key: snapshot.natural_key,
                    fields: snapshot.payload,
                    updated_at: snapshot.updated_at,
                };
                remote.upsert(request).await.map_err(|e| e.to_string())
            }
            Operation::Delete => {
                let id = match &item.remote_id {
                    Some(id) => {
                        remote
                            .delete(item.entity_type, id, item.enqueued_at)
                            .await
                            .map_err(|e| e.to_string())?;
                        id.clone()
                    }
                    // Never reached the remote: nothing to delete there
                    None => item.entity_id.clone(),
                };
                Ok(UpsertAck { id, updated_at: item.enqueued_at })
            }
        }
    }
}

/// Returns a claimed item to `Pending` if the upload never finished.
struct Claim<'a> {
    ledger: &'a Ledger,
    id: i64,
    armed: bool,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.ledger.with_db(|db| db.release_item(self.id)) {
            Ok(_) => debug!(id = self.id, "released interrupted upload"),
            Err(e) => warn!(id = self.id, error = %e, "failed to release interrupted upload"),
        }
    }
}

#[cfg(test)]
#[path = "pump_tests.rs"]
mod tests;
