// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Directory-backed remote store.
//!
//! Each collection is a JSONL file under the root directory, for example
//! `<root>/expenses.jsonl`. Several devices can share one root through a
//! synced or network folder:
//! - Writers take an exclusive `fs2` lock on `<collection>.lock` for the
//!   read-modify-write
//! - Files are replaced atomically, so readers need no lock
//! - Subscriptions poll the file and emit documents whose state changed
//!
//! A missing root directory is reported as `Unavailable`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fs2::FileExt;
use serde_json::{Map, Value};

use mk_core::{jsonl, ClockSource, EntityType, MonotonicClock, RemoteDocument, SystemClock};

use super::{
    merge_fields, DocumentFilter, DocumentStream, RemoteError, RemoteFuture, RemoteResult,
    RemoteStore, UpsertAck, UpsertRequest,
};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

struct DirInner {
    root: PathBuf,
    clock: MonotonicClock<Arc<dyn ClockSource>>,
}

/// Remote store kept in a shared directory.
#[derive(Clone)]
pub struct DirRemoteStore {
    inner: Arc<DirInner>,
    poll_interval: Duration,
}

impl DirRemoteStore {
    /// Use `root` as the shared directory. The directory is not created.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_clock(root, Arc::new(SystemClock))
    }

    pub fn with_clock(root: impl Into<PathBuf>, clock: Arc<dyn ClockSource>) -> Self {
        DirRemoteStore {
            inner: Arc::new(DirInner { root: root.into(), clock: MonotonicClock::with_clock(clock) }),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set how often subscriptions re-read their collection.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    async fn blocking<R, F>(&self, f: F) -> RemoteResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&DirInner) -> RemoteResult<R> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?
    }
}

impl DirInner {
    fn collection_path(&self, entity_type: EntityType) -> PathBuf {
        self.root.join(format!("{}.jsonl", entity_type.collection()))
    }

    fn check_root(&self) -> RemoteResult<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(RemoteError::Unavailable(format!("{} not found", self.root.display())))
        }
    }

    fn read(&self, entity_type: EntityType) -> RemoteResult<Vec<RemoteDocument>> {
        self.check_root()?;
        jsonl::read_all(&self.collection_path(entity_type)).map_err(unavailable)
    }

    /// Read-modify-write a collection under its lock file.
    ///
    /// `f` receives the documents and the next accepted timestamp for a
    /// write stamped `requested`.
    fn locked<R>(
        &self,
        entity_type: EntityType,
        requested: i64,
        f: impl FnOnce(&mut Vec<RemoteDocument>, i64) -> R,
    ) -> RemoteResult<R> {
        self.check_root()?;
        let lock_path = self.root.join(format!("{}.lock", entity_type.collection()));
        let lock = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        lock.lock_exclusive().map_err(|e| RemoteError::Unavailable(e.to_string()))?;

        let path = self.collection_path(entity_type);
        let result = jsonl::update(&path, |docs: &mut Vec<RemoteDocument>| {
            let newest = docs.iter().map(|d| d.updated_at).max().unwrap_or(0);
            self.clock.observe(newest.max(requested.saturating_sub(1)));
            f(docs, self.clock.now())
        })
        .map_err(unavailable);

        // Dropping the handle also releases the lock
        let _ = fs2::FileExt::unlock(&lock);
        result
    }

    fn upsert(&self, id: String, request: UpsertRequest) -> RemoteResult<UpsertAck> {
        self.locked(request.entity_type, request.updated_at, |docs, accepted| {
            let position = docs.iter().position(|d| d.id == id);
            let doc = match position {
                Some(i) => &mut docs[i],
                None => {
                    docs.push(RemoteDocument {
                        id: id.clone(),
                        entity_type: request.entity_type,
                        group_id: request.group_id.clone(),
                        natural_key: None,
                        fields: Value::Object(Map::new()),
                        updated_at: accepted,
                        deleted: false,
                    });
                    let last = docs.len() - 1;
                    &mut docs[last]
                }
            };
            if doc.deleted {
                doc.fields = Value::Object(Map::new());
                doc.deleted = false;
            }
            merge_fields(&mut doc.fields, request.fields);
            doc.group_id = request.group_id;
            doc.natural_key = request.natural_key;
            doc.updated_at = accepted;
            UpsertAck { id, updated_at: accepted }
        })
    }

    fn delete(&self, entity_type: EntityType, id: &str, deleted_at: i64) -> RemoteResult<()> {
        self.locked(entity_type, deleted_at, |docs, accepted| {
            if let Some(doc) = docs.iter_mut().find(|d| d.id == id && !d.deleted) {
                doc.deleted = true;
                doc.updated_at = accepted;
            }
        })
    }
}

fn unavailable(e: mk_core::Error) -> RemoteError {
    RemoteError::Unavailable(e.to_string())
}

fn select(
    docs: Vec<RemoteDocument>,
    filter: &DocumentFilter,
    since: Option<i64>,
) -> Vec<RemoteDocument> {
    let mut matched: Vec<RemoteDocument> = docs
        .into_iter()
        .filter(|d| filter.matches(d))
        .filter(|d| since.is_none_or(|since| d.updated_at > since))
        .collect();
    matched.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
    matched
}

/// Poll state of one subscription.
struct Poll {
    inner: Arc<DirInner>,
    entity_type: EntityType,
    filter: DocumentFilter,
    interval: Duration,
    seen: HashMap<String, (i64, bool)>,
    first: bool,
}

impl Poll {
    async fn next_batch(&mut self) -> RemoteResult<Vec<RemoteDocument>> {
        loop {
            if !self.first {
                tokio::time::sleep(self.interval).await;
            }
            let inner = Arc::clone(&self.inner);
            let entity_type = self.entity_type;
            let docs = tokio::task::spawn_blocking(move || inner.read(entity_type))
                .await
                .map_err(|e| RemoteError::Unavailable(e.to_string()))??;

            let changed: Vec<RemoteDocument> = select(docs, &self.filter, None)
                .into_iter()
                .filter(|d| self.seen.get(&d.id) != Some(&(d.updated_at, d.deleted)))
                .collect();
            for doc in &changed {
                self.seen.insert(doc.id.clone(), (doc.updated_at, doc.deleted));
            }

            if self.first || !changed.is_empty() {
                self.first = false;
                return Ok(changed);
            }
        }
    }
}

impl RemoteStore for DirRemoteStore {
    fn is_authenticated(&self) -> bool {
        true
    }

    fn upsert(&self, request: UpsertRequest) -> RemoteFuture<'_, UpsertAck> {
        Box::pin(async move {
            let id = request.id.clone().unwrap_or_else(mk_core::new_local_id);
            self.blocking(move |inner| inner.upsert(id, request)).await
        })
    }

    fn delete(&self, entity_type: EntityType, id: &str, deleted_at: i64) -> RemoteFuture<'_, ()> {
        let id = id.to_string();
        Box::pin(async move {
            self.blocking(move |inner| inner.delete(entity_type, &id, deleted_at)).await
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
            let docs = self.blocking(move |inner| inner.read(entity_type)).await?;
            Ok(select(docs, &filter, since))
        })
    }

    fn subscribe(
        &self,
        entity_type: EntityType,
        filter: &DocumentFilter,
    ) -> RemoteFuture<'_, DocumentStream> {
        let filter = filter.clone();
        Box::pin(async move {
            self.inner.check_root()?;
            let poll = Poll {
                inner: Arc::clone(&self.inner),
                entity_type,
                filter,
                interval: self.poll_interval,
                seen: HashMap::new(),
                first: true,
            };
            let stream = futures_util::stream::unfold(poll, |mut poll| async move {
                let batch = poll.next_batch().await;
                Some((batch, poll))
            });
            Ok(Box::pin(stream) as DocumentStream)
        })
    }
}

#[cfg(test)]
#[path = "dir_tests.rs"]
mod tests;
