// Path: crates/status/src/registry.rs
//! List-set lifecycle over the versioned store.
//!
//! The registry owns set metadata: which lists exist, their order, and the
//! active-list pointer. It enforces the `list_count` cap and performs
//! rollover as one storage transaction so there is never a window with a
//! full active list and no successor.

use attestor_api::store::{StatusListStore, Versioned};
use attestor_types::config::StatusListOptions;
use attestor_types::error::{AllocationError, StorageError};
use attestor_types::status::{
    BlockRecord, ListBitmap, ListRecord, ListSetRecord, SetKey,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Persists per-set metadata and mints new lists.
#[derive(Clone)]
pub struct StatusListRegistry {
    store: Arc<dyn StatusListStore>,
}

impl StatusListRegistry {
    /// Builds a registry over the given store.
    pub fn new(store: Arc<dyn StatusListStore>) -> Self {
        Self { store }
    }

    /// Loads a set's metadata, if the set was ever created.
    pub async fn load_set(
        &self,
        key: &SetKey,
    ) -> Result<Option<Versioned<ListSetRecord>>, StorageError> {
        self.store.load_set(key).await
    }

    /// Reads a list record.
    pub async fn read_list(&self, list_id: &str) -> Result<Versioned<ListRecord>, StorageError> {
        self.store.read_list(list_id).await
    }

    /// CAS-writes a list record.
    pub async fn write_list(
        &self,
        expect: u64,
        list: &ListRecord,
    ) -> Result<u64, StorageError> {
        self.store.write_list(expect, list).await
    }

    /// Reads a block record.
    pub async fn read_block(
        &self,
        list_id: &str,
        block_id: u32,
    ) -> Result<Option<Versioned<BlockRecord>>, StorageError> {
        self.store.read_block(list_id, block_id).await
    }

    /// CAS-writes a block record.
    pub async fn write_block(
        &self,
        expect: Option<u64>,
        block: &BlockRecord,
    ) -> Result<u64, StorageError> {
        self.store.write_block(expect, block).await
    }

    /// Creates the next list of a set, atomically with the set update and,
    /// on rollover, with marking the exhausted predecessor full.
    ///
    /// `current` is the caller's snapshot (`None` when the set does not
    /// exist yet); `exhausted` is the previous active list with its expected
    /// sequence, already mutated to `Full` by the caller. Fails with
    /// [`AllocationError::QuotaExceeded`] at the `list_count` cap. A
    /// sequence conflict means another task created the list first; the
    /// caller re-loads the set and proceeds with the winner's list.
    pub async fn create_list(
        &self,
        key: &SetKey,
        current: Option<&Versioned<ListSetRecord>>,
        options: &StatusListOptions,
        exhausted: Option<(u64, &ListRecord)>,
    ) -> Result<ListRecord, AllocationError> {
        let (expect, mut set) = match current {
            Some(v) => (Some(v.sequence), v.value.clone()),
            None => (None, ListSetRecord::new(key.clone())),
        };

        let position = set.lists.len() as u32;
        if position >= options.list_count {
            return Err(AllocationError::QuotaExceeded {
                purpose: key.purpose,
                list_count: options.list_count,
            });
        }

        let list = ListRecord::new(
            Uuid::new_v4().to_string(),
            position,
            options.block_count,
            Utc::now(),
        );
        let bitmap = ListBitmap::new(list.list_id.clone(), options.list_length() as u32);
        set.lists.push(list.list_id.clone());
        set.active = Some(list.list_id.clone());

        self.store
            .append_list(expect, &set, exhausted, &list, &bitmap)
            .await?;

        tracing::info!(
            target: "status-registry",
            tenant = %key.tenant_id,
            purpose = %key.purpose,
            list_id = %list.list_id,
            position,
            "created status list"
        );
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attestor_test_utils::MemoryStore;
    use attestor_types::config::{StatusListType, StatusPurpose};
    use attestor_types::status::ListStatus;

    fn options(list_count: u32) -> StatusListOptions {
        StatusListOptions {
            list_type: StatusListType::BitstringStatusList,
            purposes: vec![StatusPurpose::Revocation],
            block_size: 8,
            block_count: 2,
            list_count,
            index_allocator: "urn:uuid:alloc".into(),
        }
    }

    fn key() -> SetKey {
        SetKey {
            tenant_id: "tenant-a".into(),
            purpose: StatusPurpose::Revocation,
            list_type: StatusListType::BitstringStatusList,
        }
    }

    #[tokio::test]
    async fn first_list_creates_the_set() {
        let store = Arc::new(MemoryStore::new());
        let registry = StatusListRegistry::new(store.clone());
        let list = registry
            .create_list(&key(), None, &options(2), None)
            .await
            .unwrap();
        assert_eq!(list.position, 0);

        let set = registry.load_set(&key()).await.unwrap().unwrap();
        assert_eq!(set.value.lists, vec![list.list_id.clone()]);
        assert_eq!(set.value.active.as_deref(), Some(list.list_id.as_str()));
        // The status bitmap spans the whole list.
        let bitmap = store.read_bitmap(&list.list_id).await.unwrap().value;
        assert_eq!(bitmap.bits.len(), 16);
    }

    #[tokio::test]
    async fn rollover_marks_predecessor_full_atomically() {
        let store = Arc::new(MemoryStore::new());
        let registry = StatusListRegistry::new(store.clone());
        let first = registry
            .create_list(&key(), None, &options(2), None)
            .await
            .unwrap();

        let set = registry.load_set(&key()).await.unwrap().unwrap();
        let versioned_first = registry.read_list(&first.list_id).await.unwrap();
        let mut exhausted = versioned_first.value.clone();
        exhausted.status = ListStatus::Full;

        let second = registry
            .create_list(
                &key(),
                Some(&set),
                &options(2),
                Some((versioned_first.sequence, &exhausted)),
            )
            .await
            .unwrap();
        assert_eq!(second.position, 1);

        let set = registry.load_set(&key()).await.unwrap().unwrap();
        assert_eq!(set.value.active.as_deref(), Some(second.list_id.as_str()));
        assert_eq!(
            registry.read_list(&first.list_id).await.unwrap().value.status,
            ListStatus::Full
        );
    }

    #[tokio::test]
    async fn list_count_cap_is_enforced() {
        let store = Arc::new(MemoryStore::new());
        let registry = StatusListRegistry::new(store.clone());
        registry
            .create_list(&key(), None, &options(1), None)
            .await
            .unwrap();
        let set = registry.load_set(&key()).await.unwrap().unwrap();
        let err = registry
            .create_list(&key(), Some(&set), &options(1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AllocationError::QuotaExceeded { list_count: 1, .. }));
    }

    #[tokio::test]
    async fn stale_set_snapshot_conflicts() {
        let store = Arc::new(MemoryStore::new());
        let registry = StatusListRegistry::new(store.clone());
        registry
            .create_list(&key(), None, &options(3), None)
            .await
            .unwrap();
        let set = registry.load_set(&key()).await.unwrap().unwrap();
        registry
            .create_list(&key(), Some(&set), &options(3), None)
            .await
            .unwrap();
        // Re-using the stale snapshot loses the race.
        let err = registry
            .create_list(&key(), Some(&set), &options(3), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AllocationError::Storage(StorageError::Conflict { .. })
        ));
    }
}
