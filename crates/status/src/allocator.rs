// Path: crates/status/src/allocator.rs
//! Reserve/finalize/abandon on one block with CAS retry and backoff.
//!
//! The bit position handed out by [`BlockAllocator::reserve`] is a
//! deterministic function of the block's bitmap (the lowest zero bit), so
//! two allocators racing on the same block can never both commit the same
//! index: whichever write lands first wins and the loser re-reads, sees the
//! bit taken, and picks the next lowest zero.

use attestor_api::store::StatusListStore;
use attestor_types::error::{AllocationError, StorageError};
use attestor_types::status::{BlockRecord, PendingReservation};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Retry and timeout policy for the allocation core.
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// CAS attempts per operation before giving up with `Contention`.
    pub max_attempts: u32,
    /// First backoff delay; doubles per attempt.
    pub backoff_base: Duration,
    /// Ceiling for a single backoff delay.
    pub backoff_cap: Duration,
    /// Age past which a pending reservation becomes eligible for recovery.
    /// Must exceed the maximum signer call time plus a margin.
    pub reservation_timeout: Duration,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            backoff_base: Duration::from_millis(10),
            backoff_cap: Duration::from_millis(250),
            reservation_timeout: Duration::from_secs(300),
        }
    }
}

impl AllocatorConfig {
    async fn backoff(&self, attempt: u32) {
        let delay = self
            .backoff_base
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.backoff_cap);
        tokio::time::sleep(delay).await;
    }
}

/// Reserves and releases individual positions inside one block.
#[derive(Clone)]
pub struct BlockAllocator {
    store: Arc<dyn StatusListStore>,
    config: AllocatorConfig,
}

impl BlockAllocator {
    /// Builds an allocator over the given store.
    pub fn new(store: Arc<dyn StatusListStore>, config: AllocatorConfig) -> Self {
        Self { store, config }
    }

    /// The configured retry/timeout policy.
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Reserves the lowest free position in a block.
    ///
    /// Returns the reservation id and the in-block index. Fails with
    /// [`AllocationError::BlockFull`] when no position is free, and with
    /// [`AllocationError::Contention`] when CAS conflicts persist past the
    /// retry budget.
    pub async fn reserve(
        &self,
        list_id: &str,
        block_id: u32,
        block_size: u32,
        now: DateTime<Utc>,
    ) -> Result<(Uuid, u32), AllocationError> {
        for attempt in 0..self.config.max_attempts {
            let (expect, mut block) = match self.store.read_block(list_id, block_id).await? {
                Some(v) => (Some(v.sequence), v.value),
                None => (None, BlockRecord::new(list_id.to_string(), block_id, block_size)),
            };

            if block.is_full() {
                return Err(AllocationError::BlockFull {
                    list_id: list_id.to_string(),
                    block_id,
                });
            }
            let Some(index) = block.bitmap.first_zero() else {
                return Err(AllocationError::BlockFull {
                    list_id: list_id.to_string(),
                    block_id,
                });
            };

            let reservation_id = Uuid::new_v4();
            block.bitmap.set(index);
            block.allocated_count += 1;
            block.pending.push(PendingReservation {
                reservation_id,
                index_in_block: index,
                created_at: now,
            });

            match self.store.write_block(expect, &block).await {
                Ok(_) => return Ok((reservation_id, index)),
                Err(StorageError::Conflict { .. }) => {
                    tracing::debug!(
                        target: "status-alloc",
                        list_id,
                        block_id,
                        attempt,
                        "reserve lost CAS race, retrying"
                    );
                    self.config.backoff(attempt).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AllocationError::Contention {
            attempts: self.config.max_attempts,
        })
    }

    /// Finalizes a reservation: drops the pending entry, keeping the bit.
    ///
    /// Idempotent. When the write fills the block's last position tracking,
    /// the list's block masks are updated so future probes skip it.
    pub async fn finalize(
        &self,
        list_id: &str,
        block_id: u32,
        reservation_id: &Uuid,
    ) -> Result<(), AllocationError> {
        for attempt in 0..self.config.max_attempts {
            let Some(versioned) = self.store.read_block(list_id, block_id).await? else {
                return Ok(());
            };
            let mut block = versioned.value;
            let Some(pos) = block.pending_index(reservation_id) else {
                // Already finalized (or abandoned); nothing to do.
                return Ok(());
            };
            block.pending.remove(pos);
            let became_full = block.is_full();

            match self.store.write_block(Some(versioned.sequence), &block).await {
                Ok(_) => {
                    if became_full {
                        self.mark_list_block_full(list_id, block_id).await?;
                    }
                    return Ok(());
                }
                Err(StorageError::Conflict { .. }) => self.config.backoff(attempt).await,
                Err(e) => return Err(e.into()),
            }
        }
        Err(AllocationError::Contention {
            attempts: self.config.max_attempts,
        })
    }

    /// Abandons a reservation: clears the bit and drops the pending entry.
    ///
    /// Idempotent. Only recovery or a writer that saw a definite failure
    /// before any observable side effect of issuance may call this.
    pub async fn abandon(
        &self,
        list_id: &str,
        block_id: u32,
        reservation_id: &Uuid,
    ) -> Result<(), AllocationError> {
        for attempt in 0..self.config.max_attempts {
            let Some(versioned) = self.store.read_block(list_id, block_id).await? else {
                return Ok(());
            };
            let mut block = versioned.value;
            let Some(pos) = block.pending_index(reservation_id) else {
                return Ok(());
            };
            let pending = block.pending.remove(pos);
            block.bitmap.clear(pending.index_in_block);
            block.allocated_count = block.allocated_count.saturating_sub(1);

            match self.store.write_block(Some(versioned.sequence), &block).await {
                Ok(_) => {
                    self.mark_list_block_available(list_id, block_id).await?;
                    return Ok(());
                }
                Err(StorageError::Conflict { .. }) => self.config.backoff(attempt).await,
                Err(e) => return Err(e.into()),
            }
        }
        Err(AllocationError::Contention {
            attempts: self.config.max_attempts,
        })
    }

    /// Flips a block into the list's `full_blocks` mask.
    pub(crate) async fn mark_list_block_full(
        &self,
        list_id: &str,
        block_id: u32,
    ) -> Result<(), AllocationError> {
        for attempt in 0..self.config.max_attempts {
            let versioned = self.store.read_list(list_id).await?;
            let mut list = versioned.value;
            if list.full_blocks.get(block_id) {
                return Ok(());
            }
            list.mark_block_full(block_id);
            match self.store.write_list(versioned.sequence, &list).await {
                Ok(_) => return Ok(()),
                Err(StorageError::Conflict { .. }) => self.config.backoff(attempt).await,
                Err(e) => return Err(e.into()),
            }
        }
        Err(AllocationError::Contention {
            attempts: self.config.max_attempts,
        })
    }

    /// Returns a block to the list's `active_blocks` mask after an abandon.
    pub(crate) async fn mark_list_block_available(
        &self,
        list_id: &str,
        block_id: u32,
    ) -> Result<(), AllocationError> {
        for attempt in 0..self.config.max_attempts {
            let versioned = self.store.read_list(list_id).await?;
            let mut list = versioned.value;
            if list.active_blocks.get(block_id) {
                return Ok(());
            }
            list.mark_block_available(block_id);
            match self.store.write_list(versioned.sequence, &list).await {
                Ok(_) => return Ok(()),
                Err(StorageError::Conflict { .. }) => self.config.backoff(attempt).await,
                Err(e) => return Err(e.into()),
            }
        }
        Err(AllocationError::Contention {
            attempts: self.config.max_attempts,
        })
    }
}
