// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Type-erased replication wrappers for local records and remote documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::entity::{Entity, EntityType, Operation, SyncStatus};
use crate::error::{Error, Result};

/// Generates a new, time-ordered local id.
pub fn new_local_id() -> String {
    Uuid::now_v7().to_string()
}

/// A business entity plus its replication metadata.
///
/// Invariant: a `Synced` record has a `remote_id` and its `updated_at` is the
/// value last accepted by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncableRecord {
    pub local_id: String,
    pub remote_id: Option<String>,
    pub entity_type: EntityType,
    pub group_id: String,
    pub natural_key: Option<String>,
    pub payload: Value,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
    pub pending_action: Option<Operation>,
}

impl SyncableRecord {
    /// Wraps a freshly created entity.
    ///
    /// The record starts as a pending create. A group owns itself, so its
    /// group id is its own local id.
    pub fn from_entity<T: Entity>(local_id: String, entity: &T, updated_at: i64) -> Result<Self> {
        let group_id = entity.group_id().map(str::to_string).unwrap_or_else(|| local_id.clone());
        Ok(SyncableRecord {
            group_id,
            natural_key: entity.natural_key(),
            payload: serde_json::to_value(entity)?,
            local_id,
            remote_id: None,
            entity_type: T::ENTITY_TYPE,
            updated_at,
            sync_status: SyncStatus::PendingUpload,
            pending_action: Some(Operation::Create),
        })
    }

    /// Decodes the payload into its business type.
    pub fn decode<T: Entity>(&self) -> Result<T> {
        if self.entity_type != T::ENTITY_TYPE {
            return Err(Error::EntityTypeMismatch {
                expected: T::ENTITY_TYPE.to_string(),
                actual: self.entity_type.to_string(),
            });
        }
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Replaces the payload with a new version of the entity.
    pub fn set_entity<T: Entity>(&mut self, entity: &T) -> Result<()> {
        if self.entity_type != T::ENTITY_TYPE {
            return Err(Error::EntityTypeMismatch {
                expected: self.entity_type.to_string(),
                actual: T::ENTITY_TYPE.to_string(),
            });
        }
        self.payload = serde_json::to_value(entity)?;
        self.natural_key = entity.natural_key();
        if let Some(group_id) = entity.group_id() {
            self.group_id = group_id.to_string();
        }
        Ok(())
    }

    /// Returns true if the record has been deleted locally but not remotely.
    ///
    /// A parked delete leaves the record in `Conflict`; it is still deleted.
    pub fn is_pending_delete(&self) -> bool {
        self.sync_status == SyncStatus::PendingDelete
            || self.pending_action == Some(Operation::Delete)
    }

    /// Builds the local record for a remote document seen for the first time.
    pub fn from_remote(local_id: String, doc: &RemoteDocument) -> Self {
        SyncableRecord {
            local_id,
            remote_id: Some(doc.id.clone()),
            entity_type: doc.entity_type,
            group_id: doc.group_id.clone(),
            natural_key: doc.natural_key.clone(),
            payload: doc.fields.clone(),
            updated_at: doc.updated_at,
            sync_status: SyncStatus::Synced,
            pending_action: None,
        }
    }
}

/// A document as stored by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    pub entity_type: EntityType,
    pub group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natural_key: Option<String>,
    pub fields: Value,
    pub updated_at: i64,
    /// Tombstone left behind by a remote delete.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

impl RemoteDocument {
    /// Returns true if the document carries the same state as the record.
    pub fn matches(&self, record: &SyncableRecord) -> bool {
        !self.deleted
            && record.sync_status.is_synced()
            && record.remote_id.as_deref() == Some(self.id.as_str())
            && record.updated_at == self.updated_at
            && record.group_id == self.group_id
            && record.payload == self.fields
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
