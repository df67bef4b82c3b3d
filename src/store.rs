//! Request/response access to the remote collection holding student records.
//!
//! Every handle acts on behalf of one identity: it refuses to list or insert for anybody else,
//! and update/delete only ever touch records that identity owns. Nothing here retries; a failed
//! call is reported once and it's up to the caller what happens next.

use crate::{
    data::record::{NewRecord, Record, RecordFields},
    error::{InvalidCollectionSnafu, RosterResult, StoreError},
};
use async_trait::async_trait;
use std::{fmt, sync::Arc};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub const DEFAULT_COLLECTION: &str = "students";

/// Name of the table/collection records live in. Checked to be a plain SQL identifier so it can
/// be spliced into queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection(Arc<str>);

impl Collection {
    pub fn new(name: &str) -> RosterResult<Self> {
        let valid = !name.is_empty()
            && name.len() <= 63
            && name.starts_with(|c: char| c.is_ascii_lowercase() || c == '_')
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        snafu::ensure!(valid, InvalidCollectionSnafu { name });

        Ok(Self(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self(DEFAULT_COLLECTION.into())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    fn collection(&self) -> &Collection;

    /// The identity this handle acts for.
    fn acting_as(&self) -> Uuid;

    /// All records owned by `owner_id`, newest first. Records created at the same instant come
    /// back in a stable order, so two lists with nothing in between are identical.
    async fn list(&self, owner_id: Uuid) -> Result<Vec<Record>, StoreError>;

    async fn insert(&self, record: NewRecord) -> Result<(), StoreError>;

    /// Replaces all four editable fields. `id`, `owner_id` and `created_at` are left alone.
    async fn update(&self, id: Uuid, fields: RecordFields) -> Result<(), StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

/// Builds store handles for a given identity, so a screen can be mounted before it knows who
/// it belongs to.
pub trait StoreConnector: Send + Sync {
    fn connect(&self, acting_as: Uuid) -> Arc<dyn RecordStore>;
}
