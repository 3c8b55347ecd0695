// Path: crates/status/src/manager.rs
//! List/block selection, exhaustion handling, rollover, and recovery.

use crate::allocator::{AllocatorConfig, BlockAllocator};
use crate::registry::StatusListRegistry;
use attestor_api::random::RandomSource;
use attestor_api::store::{CredentialStore, StatusListStore, Versioned};
use attestor_types::config::{StatusListOptions, StatusPurpose};
use attestor_types::error::{AllocationError, StorageError};
use attestor_types::status::{ListRecord, ListSetRecord, ListStatus, Reservation, SetKey};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Chooses a list and block for each allocation, creating and rolling over
/// lists as sets fill, and reclaiming positions left behind by crashed
/// issuances.
///
/// The manager is stateless between calls; any number of managers across
/// any number of processes coordinate purely through the store's CAS
/// discipline.
#[derive(Clone)]
pub struct ListManager {
    store: Arc<dyn StatusListStore>,
    credentials: Arc<dyn CredentialStore>,
    registry: StatusListRegistry,
    allocator: BlockAllocator,
    random: Arc<dyn RandomSource>,
    config: AllocatorConfig,
}

impl ListManager {
    /// Builds a manager over the given stores.
    pub fn new(
        store: Arc<dyn StatusListStore>,
        credentials: Arc<dyn CredentialStore>,
        random: Arc<dyn RandomSource>,
        config: AllocatorConfig,
    ) -> Self {
        Self {
            registry: StatusListRegistry::new(store.clone()),
            allocator: BlockAllocator::new(store.clone(), config.clone()),
            store,
            credentials,
            random,
            config,
        }
    }

    /// The underlying allocator (shared with writers for finish/cancel).
    pub fn allocator(&self) -> &BlockAllocator {
        &self.allocator
    }

    /// The registry this manager mints lists through.
    pub fn registry(&self) -> &StatusListRegistry {
        &self.registry
    }

    /// Allocates one unique `(list, index)` position for the given purpose.
    ///
    /// `nonce` varies per request and spreads concurrent allocators across
    /// blocks; correctness never depends on the spread.
    pub async fn allocate(
        &self,
        tenant_id: &str,
        options: &StatusListOptions,
        purpose: StatusPurpose,
        nonce: &str,
    ) -> Result<Reservation, AllocationError> {
        let key = SetKey {
            tenant_id: tenant_id.to_string(),
            purpose,
            list_type: options.list_type,
        };

        let max_rounds = 2 * options.list_count + 8;
        for _round in 0..max_rounds {
            let set = self.registry.load_set(&key).await?;

            let candidate = match self.active_candidate(&set).await? {
                Some(list) => Some(list),
                None => {
                    if self.recover_set(&key, set.as_ref(), options).await? > 0 {
                        continue;
                    }
                    match self
                        .registry
                        .create_list(&key, set.as_ref(), options, None)
                        .await
                    {
                        Ok(list) => Some(Versioned::new(1, list)),
                        Err(AllocationError::Storage(StorageError::Conflict { .. })) => continue,
                        Err(e) => return Err(e),
                    }
                }
            };
            let Some(list) = candidate else { continue };

            match self.probe_blocks(&list, options, tenant_id, nonce, purpose).await? {
                Some(reservation) => return Ok(reservation),
                None => {
                    // Every block is full. Reclaim expired reservations on
                    // this list first; only a list with no reclaimable
                    // capacity rolls over.
                    if self.recover_list(&list.value.list_id, options).await? > 0 {
                        continue;
                    }
                    self.roll_over(&key, &list.value.list_id, options).await?;
                }
            }
        }
        Err(AllocationError::Contention {
            attempts: max_rounds,
        })
    }

    /// Finalizes a reservation after its credential became durable.
    pub async fn finalize(&self, reservation: &Reservation) -> Result<(), AllocationError> {
        self.allocator
            .finalize(
                &reservation.list_id,
                reservation.block_id,
                &reservation.reservation_id,
            )
            .await
    }

    /// Releases a reservation after a definite pre-persistence failure.
    pub async fn abandon(&self, reservation: &Reservation) -> Result<(), AllocationError> {
        self.allocator
            .abandon(
                &reservation.list_id,
                reservation.block_id,
                &reservation.reservation_id,
            )
            .await
    }

    /// Runs the recovery pass over every list of the purpose's set.
    ///
    /// Returns the number of reclaimed (abandoned) positions. Pending
    /// reservations whose credential exists are promoted to finalized
    /// instead; in-deadline reservations are never touched.
    pub async fn recover(
        &self,
        tenant_id: &str,
        options: &StatusListOptions,
        purpose: StatusPurpose,
    ) -> Result<usize, AllocationError> {
        let key = SetKey {
            tenant_id: tenant_id.to_string(),
            purpose,
            list_type: options.list_type,
        };
        let set = self.registry.load_set(&key).await?;
        self.recover_set(&key, set.as_ref(), options).await
    }

    async fn active_candidate(
        &self,
        set: &Option<Versioned<ListSetRecord>>,
    ) -> Result<Option<Versioned<ListRecord>>, AllocationError> {
        let Some(set) = set else { return Ok(None) };
        let Some(active_id) = &set.value.active else {
            return Ok(None);
        };
        let list = self.registry.read_list(active_id).await?;
        if list.value.status == ListStatus::Active && list.value.active_blocks.any_set() {
            Ok(Some(list))
        } else {
            Ok(None)
        }
    }

    /// Hash-then-probe block choice: the start block is a stable hash of
    /// the allocation context (perturbed by the injected random source),
    /// and probing walks forward to the first block not known to be full.
    async fn probe_blocks(
        &self,
        list: &Versioned<ListRecord>,
        options: &StatusListOptions,
        tenant_id: &str,
        nonce: &str,
        purpose: StatusPurpose,
    ) -> Result<Option<Reservation>, AllocationError> {
        let list_id = list.value.list_id.clone();
        let list_position = list.value.position;
        let block_count = options.block_count;
        let start = self.start_block(tenant_id, options, nonce, block_count);
        let mut full_blocks = list.value.full_blocks.clone();

        for i in 0..block_count {
            let block_id = (start + i) % block_count;
            if full_blocks.get(block_id) {
                continue;
            }
            let now = Utc::now();
            match self
                .allocator
                .reserve(&list_id, block_id, options.block_size, now)
                .await
            {
                Ok((reservation_id, index_in_block)) => {
                    return Ok(Some(Reservation {
                        reservation_id,
                        tenant_id: tenant_id.to_string(),
                        purpose,
                        list_type: options.list_type,
                        list_id,
                        list_position,
                        block_id,
                        index: block_id as u64 * options.block_size as u64
                            + index_in_block as u64,
                        index_allocator: options.index_allocator.clone(),
                        created_at: now,
                    }));
                }
                Err(AllocationError::BlockFull { .. }) => {
                    full_blocks.set(block_id);
                    if full_blocks.is_full() {
                        // The last block: leave the transition to `Full` to
                        // the rollover, which persists it in the same
                        // transaction that creates the successor list.
                        break;
                    }
                    self.allocator
                        .mark_list_block_full(&list_id, block_id)
                        .await?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    fn start_block(
        &self,
        tenant_id: &str,
        options: &StatusListOptions,
        nonce: &str,
        block_count: u32,
    ) -> u32 {
        let mut hasher = Sha256::new();
        hasher.update(tenant_id.as_bytes());
        hasher.update([0]);
        hasher.update(options.index_allocator.as_bytes());
        hasher.update([0]);
        hasher.update(nonce.as_bytes());
        let digest = hasher.finalize();
        let mut eight = [0u8; 8];
        eight.copy_from_slice(&digest[..8]);
        let hash = u64::from_be_bytes(eight);
        ((hash as u128 + self.random.next_u64() as u128) % block_count as u128) as u32
    }

    /// Atomically transitions an exhausted list to `Full` and creates its
    /// successor in the same storage transaction. At the list cap the
    /// transition is persisted alone and `QuotaExceeded` surfaces.
    async fn roll_over(
        &self,
        key: &SetKey,
        list_id: &str,
        options: &StatusListOptions,
    ) -> Result<(), AllocationError> {
        let fresh = self.registry.read_list(list_id).await?;
        if fresh.value.status == ListStatus::Full {
            // Another task already rolled this list over.
            return Ok(());
        }
        let mut full = fresh.value.clone();
        for block_id in 0..options.block_count {
            full.mark_block_full(block_id);
        }

        let set = self.registry.load_set(key).await?;
        match self
            .registry
            .create_list(key, set.as_ref(), options, Some((fresh.sequence, &full)))
            .await
        {
            Ok(next) => {
                tracing::info!(
                    target: "status-manager",
                    exhausted = %list_id,
                    next = %next.list_id,
                    "status list rolled over"
                );
                Ok(())
            }
            Err(AllocationError::QuotaExceeded { purpose, list_count }) => {
                // No successor is possible; still persist the transition so
                // subsequent allocations fail fast.
                if let Err(e) = self.registry.write_list(fresh.sequence, &full).await {
                    tracing::debug!(target: "status-manager", error = %e, "full-mark lost race");
                }
                Err(AllocationError::QuotaExceeded { purpose, list_count })
            }
            Err(AllocationError::Storage(StorageError::Conflict { .. })) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn recover_set(
        &self,
        key: &SetKey,
        set: Option<&Versioned<ListSetRecord>>,
        options: &StatusListOptions,
    ) -> Result<usize, AllocationError> {
        let Some(set) = set else { return Ok(0) };
        let mut reclaimed = 0;
        for list_id in &set.value.lists {
            reclaimed += self.recover_list(list_id, options).await?;
        }
        if reclaimed > 0 {
            tracing::info!(
                target: "status-manager",
                tenant = %key.tenant_id,
                purpose = %key.purpose,
                reclaimed,
                "recovered abandoned reservations"
            );
        }
        Ok(reclaimed)
    }

    /// Scans one list for expired pending reservations. A reservation whose
    /// `(list, index)` is occupied by a stored credential is finalizable
    /// (the writer crashed between persistence and finish) and is promoted;
    /// an unoccupied one is abandoned and its position reclaimed.
    async fn recover_list(
        &self,
        list_id: &str,
        options: &StatusListOptions,
    ) -> Result<usize, AllocationError> {
        let timeout = chrono::Duration::from_std(self.config.reservation_timeout)
            .unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        let mut reclaimed = 0;

        for block in self.store.list_blocks(list_id).await? {
            for pending in &block.value.pending {
                if now.signed_duration_since(pending.created_at) < timeout {
                    continue;
                }
                let index = block.value.block_id as u64 * options.block_size as u64
                    + pending.index_in_block as u64;
                if self.credentials.occupant(list_id, index).await?.is_some() {
                    self.allocator
                        .finalize(list_id, block.value.block_id, &pending.reservation_id)
                        .await?;
                } else {
                    self.allocator
                        .abandon(list_id, block.value.block_id, &pending.reservation_id)
                        .await?;
                    reclaimed += 1;
                }
            }
        }
        Ok(reclaimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attestor_test_utils::{FixedRandom, MemoryStore};
    use attestor_types::config::StatusListType;
    use attestor_types::credential::{CredentialRecord, StatusEntryRef};
    use std::collections::HashSet;
    use std::time::Duration;

    fn options(block_size: u32, block_count: u32, list_count: u32) -> StatusListOptions {
        StatusListOptions {
            list_type: StatusListType::BitstringStatusList,
            purposes: vec![StatusPurpose::Revocation],
            block_size,
            block_count,
            list_count,
            index_allocator: "urn:uuid:alloc".into(),
        }
    }

    fn manager(store: &Arc<MemoryStore>, timeout: Duration) -> ListManager {
        ListManager::new(
            store.clone(),
            store.clone(),
            Arc::new(FixedRandom(0)),
            AllocatorConfig {
                backoff_base: Duration::from_millis(1),
                backoff_cap: Duration::from_millis(2),
                reservation_timeout: timeout,
                ..AllocatorConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn allocations_are_unique_across_blocks() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(&store, Duration::from_secs(300));
        let opts = options(4, 4, 1);

        let mut seen = HashSet::new();
        for i in 0..16 {
            let r = mgr
                .allocate("tenant-a", &opts, StatusPurpose::Revocation, &format!("n{}", i))
                .await
                .unwrap();
            assert!(seen.insert((r.list_id.clone(), r.index)), "duplicate index {}", r.index);
            assert!(r.index < opts.list_length());
        }
    }

    #[tokio::test]
    async fn rollover_and_quota() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(&store, Duration::from_secs(300));
        let opts = options(8, 1, 2);

        let mut lists = HashSet::new();
        let mut per_list: std::collections::HashMap<String, Vec<u64>> = Default::default();
        for i in 0..16 {
            let r = mgr
                .allocate("tenant-a", &opts, StatusPurpose::Revocation, &format!("n{}", i))
                .await
                .unwrap();
            lists.insert(r.list_id.clone());
            per_list.entry(r.list_id).or_default().push(r.index);
        }
        assert_eq!(lists.len(), 2, "16 allocations span exactly two lists");
        for (_, indices) in per_list {
            assert_eq!(indices.len(), 8);
        }

        let err = mgr
            .allocate("tenant-a", &opts, StatusPurpose::Revocation, "n16")
            .await
            .unwrap_err();
        assert!(matches!(err, AllocationError::QuotaExceeded { list_count: 2, .. }));
    }

    #[tokio::test]
    async fn recovery_promotes_persisted_and_reclaims_orphaned() {
        let store = Arc::new(MemoryStore::new());
        // Zero timeout: every pending reservation is immediately expired.
        let mgr = manager(&store, Duration::ZERO);
        let opts = options(8, 1, 1);

        let r1 = mgr
            .allocate("tenant-a", &opts, StatusPurpose::Revocation, "n0")
            .await
            .unwrap();
        let r2 = mgr
            .allocate("tenant-a", &opts, StatusPurpose::Revocation, "n1")
            .await
            .unwrap();
        assert_ne!(r1.index, r2.index);

        // Credential exists for r1 (crash after persist, before finish);
        // nothing references r2 (crash before persist).
        store
            .insert(&CredentialRecord {
                tenant_id: "tenant-a".into(),
                credential_id: "urn:id1".into(),
                alias_id: None,
                body: serde_json::json!({"id": "urn:id1"}),
                status_entries: vec![StatusEntryRef {
                    purpose: StatusPurpose::Revocation,
                    list_type: StatusListType::BitstringStatusList,
                    list_id: r1.list_id.clone(),
                    list_position: r1.list_position,
                    index: r1.index,
                    index_allocator: opts.index_allocator.clone(),
                }],
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let reclaimed = mgr
            .recover("tenant-a", &opts, StatusPurpose::Revocation)
            .await
            .unwrap();
        assert_eq!(reclaimed, 1);

        let block = store
            .read_block(&r1.list_id, 0)
            .await
            .unwrap()
            .unwrap()
            .value;
        assert!(block.pending.is_empty());
        // r1's bit survived the sweep, r2's was reclaimed.
        assert!(block.bitmap.get(r1.index as u32));
        assert!(!block.bitmap.get(r2.index as u32));
        assert!(block.count_consistent());

        // The reclaimed position is allocated again.
        let r3 = mgr
            .allocate("tenant-a", &opts, StatusPurpose::Revocation, "n2")
            .await
            .unwrap();
        assert_eq!(r3.index, r2.index);
    }

    #[tokio::test]
    async fn exhausted_list_with_expired_pendings_recovers_instead_of_rolling_over() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(&store, Duration::ZERO);
        let opts = options(4, 1, 1);

        // Fill the single list with unfinished reservations.
        let mut first = Vec::new();
        for i in 0..4 {
            first.push(
                mgr.allocate("tenant-a", &opts, StatusPurpose::Revocation, &format!("n{}", i))
                    .await
                    .unwrap(),
            );
        }
        // The next allocation finds every block full, reclaims the expired
        // pendings, and succeeds within the single-list quota.
        let r = mgr
            .allocate("tenant-a", &opts, StatusPurpose::Revocation, "n4")
            .await
            .unwrap();
        assert_eq!(r.list_id, first[0].list_id);
    }

    #[tokio::test]
    async fn concurrent_burst_is_collision_free() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(&store, Duration::from_secs(300));
        let opts = options(16, 4, 2);

        let mut handles = Vec::new();
        for i in 0..100 {
            let mgr = mgr.clone();
            let opts = opts.clone();
            handles.push(tokio::spawn(async move {
                mgr.allocate("tenant-a", &opts, StatusPurpose::Revocation, &format!("n{}", i))
                    .await
                    .unwrap()
            }));
        }
        let mut seen = HashSet::new();
        for handle in handles {
            let r = handle.await.unwrap();
            assert!(
                seen.insert((r.list_id.clone(), r.index)),
                "duplicate position ({}, {})",
                r.list_id,
                r.index
            );
        }
        assert_eq!(seen.len(), 100);
    }
}
