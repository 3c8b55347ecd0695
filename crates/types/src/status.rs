// Path: crates/types/src/status.rs
//! Status-list allocation records.
//!
//! The persistence model is a tree: a [`ListSetRecord`] owns an ordered
//! sequence of lists, a [`ListRecord`] owns its blocks, and a
//! [`BlockRecord`] carries the assignment bitmap plus in-flight
//! reservations. Every record is written with optimistic sequence CAS; the
//! storage layer supplies the sequence, these structs carry only the data.

use crate::bitmap::Bitmap;
use crate::config::{StatusListType, StatusPurpose};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The stable identifier of one status list.
pub type ListId = String;

/// The key of a list set: one set exists per tenant, purpose, and family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SetKey {
    /// The owning tenant.
    pub tenant_id: String,
    /// The purpose tracked by this set.
    pub purpose: StatusPurpose,
    /// The list family.
    pub list_type: StatusListType,
}

impl SetKey {
    /// The storage key encoding: `tenant \0 purpose \0 entry-type`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.tenant_id.len() + 32);
        out.extend_from_slice(self.tenant_id.as_bytes());
        out.push(0);
        out.extend_from_slice(self.purpose.as_str().as_bytes());
        out.push(0);
        out.extend_from_slice(self.list_type.entry_type().as_bytes());
        out
    }
}

/// Per-set metadata: the ordered lists and the active-list pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSetRecord {
    /// The set identity.
    pub key: SetKey,
    /// List ids in creation order; a list's position in this vector is its
    /// stable index within the set.
    pub lists: Vec<ListId>,
    /// The list currently accepting allocations, if any.
    pub active: Option<ListId>,
}

impl ListSetRecord {
    /// A fresh, empty set.
    pub fn new(key: SetKey) -> Self {
        Self {
            key,
            lists: Vec::new(),
            active: None,
        }
    }

    /// The position of `list_id` within the set.
    pub fn position_of(&self, list_id: &str) -> Option<u32> {
        self.lists.iter().position(|l| l == list_id).map(|p| p as u32)
    }
}

/// The lifecycle of one list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListStatus {
    /// Created but not yet activated.
    Building,
    /// Accepting allocations.
    Active,
    /// Every block is full; the list will never allocate again.
    Full,
}

/// Per-list allocation metadata.
///
/// `active_blocks` and `full_blocks` are disjoint bitmaps over
/// `[0, block_count)`; a block absent from both has not been materialized
/// yet (all of its bits are implicitly free).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRecord {
    /// The stable list id.
    pub list_id: ListId,
    /// The list's position within its set.
    pub position: u32,
    /// Blocks known to have free capacity.
    pub active_blocks: Bitmap,
    /// Blocks with every position assigned.
    pub full_blocks: Bitmap,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Lifecycle state.
    pub status: ListStatus,
}

impl ListRecord {
    /// A fresh list with every block available.
    pub fn new(list_id: ListId, position: u32, block_count: u32, now: DateTime<Utc>) -> Self {
        Self {
            list_id,
            position,
            active_blocks: Bitmap::filled(block_count),
            full_blocks: Bitmap::new(block_count),
            created_at: now,
            status: ListStatus::Active,
        }
    }

    /// Whether the invariant `active ∩ full = ∅` holds.
    pub fn blocks_disjoint(&self) -> bool {
        self.active_blocks.is_disjoint(&self.full_blocks)
    }

    /// Marks one block as exhausted.
    pub fn mark_block_full(&mut self, block_id: u32) {
        self.active_blocks.clear(block_id);
        self.full_blocks.set(block_id);
        if self.full_blocks.is_full() {
            self.status = ListStatus::Full;
        }
    }

    /// Marks one block as having free capacity again (after an abandon).
    pub fn mark_block_available(&mut self, block_id: u32) {
        self.full_blocks.clear(block_id);
        self.active_blocks.set(block_id);
        if self.status == ListStatus::Full {
            self.status = ListStatus::Active;
        }
    }
}

/// One in-flight reservation recorded inside its block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReservation {
    /// The reservation id, also held by the writer that created it.
    pub reservation_id: Uuid,
    /// The reserved bit within the block.
    pub index_in_block: u32,
    /// When the reservation was taken; recovery compares this against the
    /// configured timeout.
    pub created_at: DateTime<Utc>,
}

/// Per-block assignment state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// The owning list.
    pub list_id: ListId,
    /// The block's index within the list.
    pub block_id: u32,
    /// Number of assigned positions. Invariant: equals
    /// `bitmap.count_ones()`.
    pub allocated_count: u32,
    /// Assigned positions, one bit per index in the block.
    pub bitmap: Bitmap,
    /// Reservations taken but not yet finalized or abandoned.
    pub pending: Vec<PendingReservation>,
}

impl BlockRecord {
    /// A fresh, empty block.
    pub fn new(list_id: ListId, block_id: u32, block_size: u32) -> Self {
        Self {
            list_id,
            block_id,
            allocated_count: 0,
            bitmap: Bitmap::new(block_size),
            pending: Vec::new(),
        }
    }

    /// Whether the count/popcount invariant holds.
    pub fn count_consistent(&self) -> bool {
        self.allocated_count == self.bitmap.count_ones()
    }

    /// Whether every position is assigned.
    pub fn is_full(&self) -> bool {
        self.allocated_count >= self.bitmap.len()
    }

    /// Finds a pending reservation by id.
    pub fn pending_index(&self, reservation_id: &Uuid) -> Option<usize> {
        self.pending
            .iter()
            .position(|p| p.reservation_id == *reservation_id)
    }
}

/// A transient claim on one `(list, index)` position.
///
/// Held by a status writer between its write phase and finish/cancel. Never
/// persisted on its own; the durable trace is the pending entry inside the
/// block record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// The reservation id matching the block's pending entry.
    pub reservation_id: Uuid,
    /// The owning tenant.
    pub tenant_id: String,
    /// The purpose this position was allocated for.
    pub purpose: StatusPurpose,
    /// The list family.
    pub list_type: StatusListType,
    /// The list holding the position.
    pub list_id: ListId,
    /// The list's position within its set (terse index arithmetic needs it).
    pub list_position: u32,
    /// The block within the list.
    pub block_id: u32,
    /// The absolute index within the list:
    /// `block_id * block_size + index_in_block`.
    pub index: u64,
    /// The allocator namespace the position was assigned under.
    pub index_allocator: String,
    /// When the reservation was taken.
    pub created_at: DateTime<Utc>,
}

/// The status-bit state of one list, flipped by status updates and read by
/// SLC regeneration. CAS-versioned independently of the allocation records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListBitmap {
    /// The owning list.
    pub list_id: ListId,
    /// One status bit per position.
    pub bits: Bitmap,
}

impl ListBitmap {
    /// An all-zero status bitmap of `list_length` bits.
    pub fn new(list_id: ListId, list_length: u32) -> Self {
        Self {
            list_id,
            bits: Bitmap::new(list_length),
        }
    }
}

/// A published status list credential with the bitmap sequence it was built
/// from; a stored SLC is stale once the bitmap sequence moves past
/// `built_sequence`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSlc {
    /// The signed SLC document.
    pub document: serde_json::Value,
    /// The bitmap sequence the document encodes.
    pub built_sequence: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StatusListType, StatusPurpose};

    fn set_key() -> SetKey {
        SetKey {
            tenant_id: "tenant-a".into(),
            purpose: StatusPurpose::Revocation,
            list_type: StatusListType::BitstringStatusList,
        }
    }

    #[test]
    fn set_key_encoding_separates_fields() {
        let a = set_key();
        let mut b = set_key();
        b.purpose = StatusPurpose::Suspension;
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn fresh_list_invariants() {
        let list = ListRecord::new("list-1".into(), 0, 16, Utc::now());
        assert!(list.blocks_disjoint());
        assert_eq!(list.active_blocks.count_ones(), 16);
        assert_eq!(list.status, ListStatus::Active);
    }

    #[test]
    fn marking_every_block_full_closes_the_list() {
        let mut list = ListRecord::new("list-1".into(), 0, 3, Utc::now());
        list.mark_block_full(0);
        list.mark_block_full(1);
        assert_eq!(list.status, ListStatus::Active);
        list.mark_block_full(2);
        assert_eq!(list.status, ListStatus::Full);
        assert!(list.blocks_disjoint());
        list.mark_block_available(1);
        assert_eq!(list.status, ListStatus::Active);
        assert!(list.blocks_disjoint());
    }

    #[test]
    fn block_count_invariant() {
        let mut block = BlockRecord::new("list-1".into(), 0, 8);
        assert!(block.count_consistent());
        block.bitmap.set(0);
        block.allocated_count += 1;
        assert!(block.count_consistent());
        assert!(!block.is_full());
    }
}
