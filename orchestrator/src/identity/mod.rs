//! Bidirectional mapping between opaque identifiers and native (name, group) keys.
//!
//! The orchestrator never caches mappings; every translation goes through an
//! [`IdentityStore`]. Two implementations ship with the crate:
//!
//! - [`InMemoryIdentityStore`] lives for the lifetime of the process.
//! - [`PostgresIdentityStore`] persists rows in the `identity_map` table.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryIdentityStore;
pub use postgres::PostgresIdentityStore;

use crate::errors::IdentityError;
use crate::models::{EntityKind, NativeKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row of the mapping table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityEntry {
    pub id: Uuid,
    pub kind: EntityKind,
    pub key: NativeKey,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Allocate a fresh identifier for `key`; `DuplicateKey` if the key is already mapped
    async fn put(&self, kind: EntityKind, key: &NativeKey) -> Result<Uuid, IdentityError>;

    /// `NotFound` if `id` is not mapped
    async fn resolve(&self, id: Uuid) -> Result<IdentityEntry, IdentityError>;

    /// `NotFound` if `key` is not mapped for `kind`
    async fn reverse_resolve(&self, key: &NativeKey, kind: EntityKind)
        -> Result<Uuid, IdentityError>;

    /// Remove the mapping for `id`; removing an absent id is a no-op
    async fn remove(&self, id: Uuid) -> Result<(), IdentityError>;

    /// Every mapping of `kind`, ordered by group then name
    async fn entries(&self, kind: EntityKind) -> Result<Vec<IdentityEntry>, IdentityError>;
}
