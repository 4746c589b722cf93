// Process-lifetime identity store

use super::{IdentityEntry, IdentityStore};
use crate::errors::IdentityError;
use crate::models::{EntityKind, NativeKey};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Debug, Default)]
struct MappingTable {
    by_id: HashMap<Uuid, IdentityEntry>,
    by_key: HashMap<(EntityKind, NativeKey), Uuid>,
}

/// Identity store held in memory
///
/// Both indexes sit behind one lock so they can never disagree; resolves share the
/// read side, puts and removes take the write side.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    table: RwLock<MappingTable>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mappings held
    pub async fn len(&self) -> usize {
        self.table.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    #[instrument(skip(self, key), fields(key = %key))]
    async fn put(&self, kind: EntityKind, key: &NativeKey) -> Result<Uuid, IdentityError> {
        let mut table = self.table.write().await;

        let index_key = (kind, key.clone());
        if table.by_key.contains_key(&index_key) {
            return Err(IdentityError::DuplicateKey(format!("{} {}", kind, key)));
        }

        let id = Uuid::new_v4();
        table.by_key.insert(index_key, id);
        table.by_id.insert(
            id,
            IdentityEntry {
                id,
                kind,
                key: key.clone(),
            },
        );

        debug!(opaque_id = %id, "Identity mapping stored");
        Ok(id)
    }

    async fn resolve(&self, id: Uuid) -> Result<IdentityEntry, IdentityError> {
        self.table
            .read()
            .await
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| IdentityError::NotFound(id.to_string()))
    }

    async fn reverse_resolve(
        &self,
        key: &NativeKey,
        kind: EntityKind,
    ) -> Result<Uuid, IdentityError> {
        self.table
            .read()
            .await
            .by_key
            .get(&(kind, key.clone()))
            .copied()
            .ok_or_else(|| IdentityError::NotFound(format!("{} {}", kind, key)))
    }

    #[instrument(skip(self))]
    async fn remove(&self, id: Uuid) -> Result<(), IdentityError> {
        let mut table = self.table.write().await;
        if let Some(entry) = table.by_id.remove(&id) {
            table.by_key.remove(&(entry.kind, entry.key));
            debug!(opaque_id = %id, "Identity mapping removed");
        }
        Ok(())
    }

    async fn entries(&self, kind: EntityKind) -> Result<Vec<IdentityEntry>, IdentityError> {
        let table = self.table.read().await;
        let mut entries: Vec<IdentityEntry> = table
            .by_id
            .values()
            .filter(|entry| entry.kind == kind)
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            (a.key.group.as_str(), a.key.name.as_str())
                .cmp(&(b.key.group.as_str(), b.key.name.as_str()))
        });
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_resolve_both_directions() {
        let store = InMemoryIdentityStore::new();
        let key = NativeKey::new("Job1", "Group1");

        let id = store.put(EntityKind::Job, &key).await.unwrap();

        let entry = store.resolve(id).await.unwrap();
        assert_eq!(entry.key, key);
        assert_eq!(entry.kind, EntityKind::Job);
        assert_eq!(store.reverse_resolve(&key, EntityKind::Job).await.unwrap(), id);
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected_per_kind() {
        let store = InMemoryIdentityStore::new();
        let key = NativeKey::new("Shared", "Group1");

        store.put(EntityKind::Job, &key).await.unwrap();
        assert!(matches!(
            store.put(EntityKind::Job, &key).await,
            Err(IdentityError::DuplicateKey(_))
        ));
        // same native key for the other kind is a separate row
        assert!(store.put(EntityKind::Trigger, &key).await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = InMemoryIdentityStore::new();
        let key = NativeKey::new("Trigger1", "DEFAULT");
        let id = store.put(EntityKind::Trigger, &key).await.unwrap();

        store.remove(id).await.unwrap();
        store.remove(id).await.unwrap();

        assert!(matches!(
            store.resolve(id).await,
            Err(IdentityError::NotFound(_))
        ));
        assert!(store
            .reverse_resolve(&key, EntityKind::Trigger)
            .await
            .is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_key_can_be_remapped_after_removal() {
        let store = InMemoryIdentityStore::new();
        let key = NativeKey::new("Job1", "Group1");
        let first = store.put(EntityKind::Job, &key).await.unwrap();
        store.remove(first).await.unwrap();

        let second = store.put(EntityKind::Job, &key).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_entries_filtered_by_kind() {
        let store = InMemoryIdentityStore::new();
        store
            .put(EntityKind::Job, &NativeKey::new("B", "G"))
            .await
            .unwrap();
        store
            .put(EntityKind::Job, &NativeKey::new("A", "G"))
            .await
            .unwrap();
        store
            .put(EntityKind::Trigger, &NativeKey::new("T", "DEFAULT"))
            .await
            .unwrap();

        let jobs = store.entries(EntityKind::Job).await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].key.name, "A");
    }

    #[tokio::test]
    async fn test_entries_ordered_by_group_then_name() {
        let store = InMemoryIdentityStore::new();
        for (name, group) in [("A", "Zulu"), ("Z", "Alpha"), ("B", "Zulu"), ("M", "Alpha")] {
            store
                .put(EntityKind::Job, &NativeKey::new(name, group))
                .await
                .unwrap();
        }

        let order: Vec<(String, String)> = store
            .entries(EntityKind::Job)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| (entry.key.group, entry.key.name))
            .collect();
        assert_eq!(
            order,
            vec![
                ("Alpha".to_string(), "M".to_string()),
                ("Alpha".to_string(), "Z".to_string()),
                ("Zulu".to_string(), "A".to_string()),
                ("Zulu".to_string(), "B".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_puts_of_same_key_admit_one() {
        let store = std::sync::Arc::new(InMemoryIdentityStore::new());
        let key = NativeKey::new("Racy", "Group1");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                let key = key.clone();
                tokio::spawn(async move { store.put(EntityKind::Job, &key).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(store.len().await, 1);
    }
}
