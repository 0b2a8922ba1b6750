// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote store abstraction.
//!
//! Provides a trait-based document store so the sync runtime can run
//! against:
//! - An in-process [`MemoryRemoteStore`] for tests and embedders
//! - A shared-folder [`DirRemoteStore`] used by the CLI
//!
//! Each [`EntityType`] maps to one collection. The store assigns the
//! accepted `updated_at` of every write; accepted timestamps only grow
//! within a collection, so `query(since)` never misses a later write.

mod dir;
mod memory;

pub use dir::DirRemoteStore;
pub use memory::MemoryRemoteStore;

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;
use serde_json::Value;

use mk_core::{EntityType, RemoteDocument};

/// Error type for remote store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The store could not be reached.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The request did not finish in time.
    #[error("remote request timed out")]
    Timeout,

    /// The store refused the write.
    #[error("rejected by remote: {0}")]
    Rejected(String),

    /// No signed-in identity.
    #[error("not authenticated")]
    Unauthenticated,
}

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Boxed future returned by [`RemoteStore`] methods.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = RemoteResult<T>> + Send + 'a>>;

/// Stream of document batches from a subscription.
///
/// The first batch is the current contents of the collection; later
/// batches carry changed documents.
pub type DocumentStream = Pin<Box<dyn Stream<Item = RemoteResult<Vec<RemoteDocument>>> + Send>>;

/// A create or merge-update of one document.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertRequest {
    pub entity_type: EntityType,
    /// Document id. `None` lets the store assign one.
    pub id: Option<String>,
    pub group_id: String,
    pub natural_key: Option<String>,
    /// Fields to set; fields absent here keep their stored values.
    pub fields: Value,
    /// Timestamp of the local edit being uploaded.
    pub updated_at: i64,
}

/// The store's acknowledgement of a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertAck {
    pub id: String,
    /// Timestamp the store accepted for the document.
    pub updated_at: i64,
}

/// Limits a query or subscription to part of a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub group_id: Option<String>,
}

impl DocumentFilter {
    /// Documents belonging to one group.
    pub fn group(group_id: impl Into<String>) -> Self {
        DocumentFilter { group_id: Some(group_id.into()) }
    }

    pub fn matches(&self, doc: &RemoteDocument) -> bool {
        match &self.group_id {
            None => true,
            Some(group_id) => doc.group_id == *group_id,
        }
    }
}

/// Document store the sync runtime replicates against.
pub trait RemoteStore: Send + Sync {
    /// Returns true if a signed-in identity is available.
    fn is_authenticated(&self) -> bool;

    /// Create or merge-update a document.
    fn upsert(&self, request: UpsertRequest) -> RemoteFuture<'_, UpsertAck>;

    /// Delete a document, leaving a tombstone stamped no earlier than
    /// `deleted_at`.
    ///
    /// Deleting a missing document succeeds.
    fn delete(&self, entity_type: EntityType, id: &str, deleted_at: i64) -> RemoteFuture<'_, ()>;

    /// Documents (tombstones included) accepted after `since`, oldest first.
    fn query(
        &self,
        entity_type: EntityType,
        filter: &DocumentFilter,
        since: Option<i64>,
    ) -> RemoteFuture<'_, Vec<RemoteDocument>>;

    /// Subscribe to changes in a collection.
    fn subscribe(
        &self,
        entity_type: EntityType,
        filter: &DocumentFilter,
    ) -> RemoteFuture<'_, DocumentStream>;
}

/// Merge-set `fields` over `existing`.
///
/// Object fields are overwritten one by one; anything else replaces the
/// stored value.
pub(crate) fn merge_fields(existing: &mut Value, fields: Value) {
    match (existing, fields) {
        (Value::Object(stored), Value::Object(incoming)) => {
            for (key, value) in incoming {
                stored.insert(key, value);
            }
        }
        (existing, fields) => *existing = fields,
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
