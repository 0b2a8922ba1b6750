// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-process remote store.
//!
//! Clones share one document set, so two ledgers wired to clones of the
//! same store behave like two devices on one backend. Faults can be
//! injected to exercise retry and failure paths.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use mk_core::{ClockSource, EntityType, MonotonicClock, RemoteDocument, SystemClock};

use super::{
    merge_fields, DocumentFilter, DocumentStream, RemoteError, RemoteFuture, RemoteResult,
    RemoteStore, UpsertAck, UpsertRequest,
};

type Collections = HashMap<EntityType, BTreeMap<String, RemoteDocument>>;

struct Inner {
    docs: Mutex<Collections>,
    changes: broadcast::Sender<RemoteDocument>,
    clock: MonotonicClock<Arc<dyn ClockSource>>,
    online: AtomicBool,
    authenticated: AtomicBool,
    failures: Mutex<VecDeque<RemoteError>>,
    latency: Mutex<Option<Duration>>,
    writes: AtomicUsize,
}

/// Shared in-memory document store with a broadcast change feed.
#[derive(Clone)]
pub struct MemoryRemoteStore {
    inner: Arc<Inner>,
}

impl MemoryRemoteStore {
    /// Create an empty, online, authenticated store.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store that stamps writes from `clock`.
    pub fn with_clock(clock: Arc<dyn ClockSource>) -> Self {
        let (changes, _) = broadcast::channel(256);
        MemoryRemoteStore {
            inner: Arc::new(Inner {
                docs: Mutex::new(HashMap::new()),
                changes,
                clock: MonotonicClock::with_clock(clock),
                online: AtomicBool::new(true),
                authenticated: AtomicBool::new(true),
                failures: Mutex::new(VecDeque::new()),
                latency: Mutex::new(None),
                writes: AtomicUsize::new(0),
            }),
        }
    }

    /// Toggle reachability. Requests fail with `Unavailable` while offline.
    pub fn set_online(&self, online: bool) {
        self.inner.online.store(online, Ordering::SeqCst);
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.inner.authenticated.store(authenticated, Ordering::SeqCst);
    }

    /// Fail the next request with `err`. Queued failures are used in order.
    pub fn fail_next(&self, err: RemoteError) {
        lock(&self.inner.failures).push_back(err);
    }

    /// Delay every request by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.inner.latency) = latency;
    }

    /// Number of accepted upserts and deletes.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Get a document, tombstones included.
    pub fn get(&self, entity_type: EntityType, id: &str) -> Option<RemoteDocument> {
        lock(&self.inner.docs).get(&entity_type).and_then(|c| c.get(id)).cloned()
    }

    /// Live documents of a collection, ordered by id.
    pub fn documents(&self, entity_type: EntityType) -> Vec<RemoteDocument> {
        lock(&self.inner.docs)
            .get(&entity_type)
            .map(|c| c.values().filter(|d| !d.deleted).cloned().collect())
            .unwrap_or_default()
    }

    /// Store a document as another writer would, bypassing fault injection.
    ///
    /// The document keeps its own `updated_at`.
    pub fn put_document(&self, doc: RemoteDocument) {
        self.inner.clock.observe(doc.updated_at);
        self.inner.store(doc);
    }

    fn check(&self) -> RemoteResult<()> {
        if !self.inner.online.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("offline".to_string()));
        }
        if !self.is_authenticated() {
            return Err(RemoteError::Unauthenticated);
        }
        match lock(&self.inner.failures).pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn simulate_latency(&self) {
        let latency = *lock(&self.inner.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    /// Next accepted timestamp: no earlier than the writer's own stamp and
    /// later than anything accepted before.
    fn accept(&self, requested: i64) -> i64 {
        self.clock.observe(requested.saturating_sub(1));
        self.clock.now()
    }

    fn store(&self, doc: RemoteDocument) {
        lock(&self.docs)
            .entry(doc.entity_type)
            .or_default()
            .insert(doc.id.clone(), doc.clone());
        self.publish(doc);
    }

    fn publish(&self, doc: RemoteDocument) {
        // No subscribers is fine
        let _ = self.changes.send(doc);
    }

    /// Merge-set a document under the lock.
    fn apply_upsert(&self, id: &str, request: UpsertRequest) -> RemoteDocument {
        let mut docs = lock(&self.docs);
        let updated_at = self.accept(request.updated_at);
        let doc = docs
            .entry(request.entity_type)
            .or_default()
            .entry(id.to_string())
            .or_insert_with(|| RemoteDocument {
                id: id.to_string(),
                entity_type: request.entity_type,
                group_id: request.group_id.clone(),
                natural_key: None,
                fields: Value::Object(Map::new()),
                updated_at,
                deleted: false,
            });
        if doc.deleted {
            doc.fields = Value::Object(Map::new());
            doc.deleted = false;
        }
        merge_fields(&mut doc.fields, request.fields);
        doc.group_id = request.group_id;
        doc.natural_key = request.natural_key;
        doc.updated_at = updated_at;
        let doc = doc.clone();
        drop(docs);

        self.publish(doc.clone());
        doc
    }

    /// Turn a live document into a tombstone. Returns false if there was
    /// nothing to delete.
    fn apply_delete(&self, entity_type: EntityType, id: &str, deleted_at: i64) -> bool {
        let mut docs = lock(&self.docs);
        let Some(doc) = docs.get_mut(&entity_type).and_then(|c| c.get_mut(id)) else {
            return false;
        };
        if doc.deleted {
            return false;
        }
        doc.deleted = true;
        doc.updated_at = self.accept(deleted_at);
        let doc = doc.clone();
        drop(docs);

        self.publish(doc);
        true
    }

    fn snapshot(&self, entity_type: EntityType, filter: &DocumentFilter, since: Option<i64>) -> Vec<RemoteDocument> {
        let docs = lock(&self.docs);
        let mut matched: Vec<RemoteDocument> = docs
            .get(&entity_type)
            .map(|c| {
                c.values()
                    .filter(|d| filter.matches(d))
                    .filter(|d| since.is_none_or(|since| d.updated_at > since))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matched.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
        matched
    }
}

impl RemoteStore for MemoryRemoteStore {
    fn is_authenticated(&self) -> bool {
        self.inner.authenticated.load(Ordering::SeqCst)
    }

    fn upsert(&self, request: UpsertRequest) -> RemoteFuture<'_, UpsertAck> {
        Box::pin(async move {
            self.simulate_latency().await;
            self.check()?;

            let id = request.id.clone().unwrap_or_else(mk_core::new_local_id);
            let doc = self.inner.apply_upsert(&id, request);
            self.inner.writes.fetch_add(1, Ordering::SeqCst);
            Ok(UpsertAck { id, updated_at: doc.updated_at })
        })
    }

    fn delete(&self, entity_type: EntityType, id: &str, deleted_at: i64) -> RemoteFuture<'_, ()> {
        let id = id.to_string();
        Box::pin(async move {
            self.simulate_latency().await;
            self.check()?;

            if self.inner.apply_delete(entity_type, &id, deleted_at) {
                self.inner.writes.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        })
    }

    fn query(
        &self,
        entity_type: EntityType,
        filter: &DocumentFilter,
        since: Option<i64>,
    ) -> RemoteFuture<'_, Vec<RemoteDocument>> {
        let filter = filter.clone();
        Box::pin(async move {
            self.simulate_latency().await;
            self.check()?;
            Ok(self.inner.snapshot(entity_type, &filter, since))
        })
    }

    fn subscribe(
        &self,
        entity_type: EntityType,
        filter: &DocumentFilter,
    ) -> RemoteFuture<'_, DocumentStream> {
        let filter = filter.clone();
        Box::pin(async move {
            self.check()?;

            // Subscribe before the snapshot so no change falls in between
            let rx = self.inner.changes.subscribe();
            let initial = self.inner.snapshot(entity_type, &filter, None);
            let inner = Arc::clone(&self.inner);

            let stream = futures_util::stream::unfold(
                (Some(initial), rx),
                move |(pending, mut rx)| {
                    let inner = Arc::clone(&inner);
                    let filter = filter.clone();
                    async move {
                        if let Some(batch) = pending {
                            return Some((Ok(batch), (None, rx)));
                        }
                        loop {
                            match rx.recv().await {
                                Ok(doc) if doc.entity_type == entity_type && filter.matches(&doc) => {
                                    return Some((Ok(vec![doc]), (None, rx)));
                                }
                                Ok(_) => continue,
                                Err(RecvError::Lagged(missed)) => {
                                    tracing::debug!(missed, "change feed lagged, resending snapshot");
                                    let batch = inner.snapshot(entity_type, &filter, None);
                                    return Some((Ok(batch), (None, rx)));
                                }
                                Err(RecvError::Closed) => return None,
                            }
                        }
                    }
                },
            );
            Ok(Box::pin(stream) as DocumentStream)
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
