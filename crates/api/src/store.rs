// Path: crates/api/src/store.rs
//! Persistence contracts.
//!
//! The allocation core coordinates exclusively through these interfaces;
//! there is no in-process coordinator. The substrate must provide:
//!
//! - per-record optimistic CAS by integer sequence,
//! - unique indices on `(tenant, credential_id)` and `(tenant, alias_id)`,
//! - point-in-time consistency for lookups by primary key.
//!
//! `attestor-storage` implements them on redb; `attestor-test-utils`
//! provides an in-memory implementation for unit tests.

use async_trait::async_trait;
use attestor_types::config::IssuerInstance;
use attestor_types::credential::CredentialRecord;
use attestor_types::error::StorageError;
use attestor_types::status::{
    BlockRecord, ListBitmap, ListRecord, ListSetRecord, SetKey, StoredSlc,
};
use serde_json::Value;

/// A record snapshot paired with the sequence it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    /// The sequence of the stored record. A subsequent write must present
    /// this value to succeed.
    pub sequence: u64,
    /// The record itself.
    pub value: T,
}

impl<T> Versioned<T> {
    /// Pairs a record with its sequence.
    pub fn new(sequence: u64, value: T) -> Self {
        Self { sequence, value }
    }
}

/// Versioned persistence for list sets, lists, blocks, status bitmaps, and
/// published SLCs.
///
/// Write methods take the expected sequence; `None` means "create, fail if
/// present". A sequence mismatch fails with [`StorageError::Conflict`] and
/// the caller re-reads and retries. No method blocks on a lock.
#[async_trait]
pub trait StatusListStore: Send + Sync {
    /// Loads a list set's metadata, if the set was ever created.
    async fn load_set(&self, key: &SetKey)
        -> Result<Option<Versioned<ListSetRecord>>, StorageError>;

    /// Writes a list set. `expect = None` creates the set.
    async fn write_set(
        &self,
        expect: Option<u64>,
        set: &ListSetRecord,
    ) -> Result<u64, StorageError>;

    /// Reads a list record.
    async fn read_list(&self, list_id: &str) -> Result<Versioned<ListRecord>, StorageError>;

    /// CAS-writes a list record.
    async fn write_list(&self, expect: u64, list: &ListRecord) -> Result<u64, StorageError>;

    /// Reads a block record. `None` means the block was never materialized
    /// (every position in it is free).
    async fn read_block(
        &self,
        list_id: &str,
        block_id: u32,
    ) -> Result<Option<Versioned<BlockRecord>>, StorageError>;

    /// Writes a block record. `expect = None` materializes the block.
    async fn write_block(
        &self,
        expect: Option<u64>,
        block: &BlockRecord,
    ) -> Result<u64, StorageError>;

    /// Returns every materialized block of a list. Recovery scans these for
    /// expired pending reservations.
    async fn list_blocks(
        &self,
        list_id: &str,
    ) -> Result<Vec<Versioned<BlockRecord>>, StorageError>;

    /// Atomically appends `new_list` (with its zeroed status bitmap) to the
    /// set and, during rollover, marks the previous list full in the same
    /// transaction. The set write is CAS'd on `expect_set`; `full_list`
    /// carries its own expected sequence.
    ///
    /// This is the one multi-record transaction in the system: a list must
    /// never exist outside its set, and rollover must not leave a window
    /// with two allocatable lists.
    async fn append_list(
        &self,
        expect_set: Option<u64>,
        set: &ListSetRecord,
        full_list: Option<(u64, &ListRecord)>,
        new_list: &ListRecord,
        new_bitmap: &ListBitmap,
    ) -> Result<(), StorageError>;

    /// Reads a list's status bitmap.
    async fn read_bitmap(&self, list_id: &str) -> Result<Versioned<ListBitmap>, StorageError>;

    /// CAS-writes a list's status bitmap. The bumped sequence is what marks
    /// any stored SLC stale.
    async fn write_bitmap(&self, expect: u64, bitmap: &ListBitmap) -> Result<u64, StorageError>;

    /// Reads the stored SLC for a list, if one was published.
    async fn read_slc(&self, list_id: &str) -> Result<Option<Versioned<StoredSlc>>, StorageError>;

    /// Writes the stored SLC. `expect = None` publishes the first version.
    async fn write_slc(
        &self,
        list_id: &str,
        expect: Option<u64>,
        slc: &StoredSlc,
    ) -> Result<u64, StorageError>;
}

/// Duplicate-rejecting persistence for issued credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Inserts a credential record. Fails with [`StorageError::Duplicate`]
    /// when either the credential id or the alias id already exists for the
    /// tenant; uniqueness is enforced in a single transaction. The insert
    /// also records position occupancy for every status entry.
    async fn insert(&self, record: &CredentialRecord) -> Result<(), StorageError>;

    /// Looks up a credential by its primary id.
    async fn get(
        &self,
        tenant_id: &str,
        credential_id: &str,
    ) -> Result<Option<CredentialRecord>, StorageError>;

    /// Looks up a credential by primary id or alias id.
    async fn find(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<CredentialRecord>, StorageError>;

    /// Returns the id of the credential occupying `(list, index)`, if any.
    /// Recovery treats this as the authoritative check for whether a
    /// pending reservation's issuance completed.
    async fn occupant(&self, list_id: &str, index: u64) -> Result<Option<String>, StorageError>;
}

/// Persistence for issuer instances and tenant-registered JSON-LD contexts.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Creates or replaces an issuer instance.
    async fn put_instance(&self, instance: &IssuerInstance) -> Result<(), StorageError>;

    /// Loads an issuer instance by id.
    async fn get_instance(&self, id: &str) -> Result<Option<IssuerInstance>, StorageError>;

    /// Registers a context document for a tenant.
    async fn put_context(
        &self,
        tenant_id: &str,
        url: &str,
        document: &Value,
    ) -> Result<(), StorageError>;

    /// Lists a tenant's registered context documents.
    async fn contexts(&self, tenant_id: &str) -> Result<Vec<(String, Value)>, StorageError>;
}
