// Path: crates/test_utils/src/store.rs
//! The in-memory persistence implementation.

use async_trait::async_trait;
use attestor_api::store::{CredentialStore, InstanceStore, StatusListStore, Versioned};
use attestor_types::config::IssuerInstance;
use attestor_types::credential::CredentialRecord;
use attestor_types::error::StorageError;
use attestor_types::status::{
    BlockRecord, ListBitmap, ListRecord, ListSetRecord, SetKey, StoredSlc,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct Tables {
    sets: HashMap<Vec<u8>, (u64, ListSetRecord)>,
    lists: HashMap<String, (u64, ListRecord)>,
    blocks: HashMap<(String, u32), (u64, BlockRecord)>,
    bitmaps: HashMap<String, (u64, ListBitmap)>,
    slcs: HashMap<String, (u64, StoredSlc)>,
    credentials: HashMap<(String, String), CredentialRecord>,
    aliases: HashMap<(String, String), String>,
    positions: HashMap<(String, u64), String>,
    instances: HashMap<String, IssuerInstance>,
    contexts: HashMap<(String, String), Value>,
}

/// An in-memory store with the same CAS semantics as the redb store.
///
/// `inject_block_conflicts` makes the next N block writes fail with a
/// sequence conflict regardless of the supplied sequence, which drives the
/// allocator's retry/backoff path deterministically.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    forced_block_conflicts: AtomicU32,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the next `n` block writes to fail with a conflict.
    pub fn inject_block_conflicts(&self, n: u32) {
        self.forced_block_conflicts.store(n, Ordering::SeqCst);
    }

    /// Counts pending reservations across every block of a list.
    pub fn pending_count(&self, list_id: &str) -> usize {
        let tables = self.tables.lock().unwrap();
        tables
            .blocks
            .iter()
            .filter(|((l, _), _)| l == list_id)
            .map(|(_, (_, b))| b.pending.len())
            .sum()
    }

    /// Returns every block of a list, for invariant assertions.
    pub fn blocks_of(&self, list_id: &str) -> Vec<BlockRecord> {
        let tables = self.tables.lock().unwrap();
        tables
            .blocks
            .iter()
            .filter(|((l, _), _)| l == list_id)
            .map(|(_, (_, b))| b.clone())
            .collect()
    }

    fn check(expect: Option<u64>, current: Option<u64>) -> Result<u64, StorageError> {
        match (expect, current) {
            (None, None) => Ok(1),
            (None, Some(found)) => Err(StorageError::Conflict { expected: 0, found }),
            (Some(expected), None) => Err(StorageError::Conflict { expected, found: 0 }),
            (Some(expected), Some(found)) if expected == found => Ok(found + 1),
            (Some(expected), Some(found)) => Err(StorageError::Conflict { expected, found }),
        }
    }
}

#[async_trait]
impl StatusListStore for MemoryStore {
    async fn load_set(
        &self,
        key: &SetKey,
    ) -> Result<Option<Versioned<ListSetRecord>>, StorageError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .sets
            .get(&key.encode())
            .map(|(seq, set)| Versioned::new(*seq, set.clone())))
    }

    async fn write_set(
        &self,
        expect: Option<u64>,
        set: &ListSetRecord,
    ) -> Result<u64, StorageError> {
        let mut tables = self.tables.lock().unwrap();
        let key = set.key.encode();
        let next = Self::check(expect, tables.sets.get(&key).map(|(s, _)| *s))?;
        tables.sets.insert(key, (next, set.clone()));
        Ok(next)
    }

    async fn read_list(&self, list_id: &str) -> Result<Versioned<ListRecord>, StorageError> {
        let tables = self.tables.lock().unwrap();
        tables
            .lists
            .get(list_id)
            .map(|(seq, list)| Versioned::new(*seq, list.clone()))
            .ok_or(StorageError::NotFound)
    }

    async fn write_list(&self, expect: u64, list: &ListRecord) -> Result<u64, StorageError> {
        let mut tables = self.tables.lock().unwrap();
        let current = tables.lists.get(&list.list_id).map(|(s, _)| *s);
        let next = Self::check(Some(expect), current)?;
        tables
            .lists
            .insert(list.list_id.clone(), (next, list.clone()));
        Ok(next)
    }

    async fn read_block(
        &self,
        list_id: &str,
        block_id: u32,
    ) -> Result<Option<Versioned<BlockRecord>>, StorageError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .blocks
            .get(&(list_id.to_string(), block_id))
            .map(|(seq, block)| Versioned::new(*seq, block.clone())))
    }

    async fn write_block(
        &self,
        expect: Option<u64>,
        block: &BlockRecord,
    ) -> Result<u64, StorageError> {
        if self.forced_block_conflicts.load(Ordering::SeqCst) > 0 {
            self.forced_block_conflicts.fetch_sub(1, Ordering::SeqCst);
            return Err(StorageError::Conflict {
                expected: expect.unwrap_or(0),
                found: expect.unwrap_or(0) + 1,
            });
        }
        let mut tables = self.tables.lock().unwrap();
        let key = (block.list_id.clone(), block.block_id);
        let next = Self::check(expect, tables.blocks.get(&key).map(|(s, _)| *s))?;
        tables.blocks.insert(key, (next, block.clone()));
        Ok(next)
    }

    async fn list_blocks(
        &self,
        list_id: &str,
    ) -> Result<Vec<Versioned<BlockRecord>>, StorageError> {
        let tables = self.tables.lock().unwrap();
        let mut out: Vec<_> = tables
            .blocks
            .iter()
            .filter(|((l, _), _)| l == list_id)
            .map(|((_, _), (seq, block))| Versioned::new(*seq, block.clone()))
            .collect();
        out.sort_by_key(|v| v.value.block_id);
        Ok(out)
    }

    async fn append_list(
        &self,
        expect_set: Option<u64>,
        set: &ListSetRecord,
        full_list: Option<(u64, &ListRecord)>,
        new_list: &ListRecord,
        new_bitmap: &ListBitmap,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.lock().unwrap();
        let set_key = set.key.encode();
        let set_next = Self::check(expect_set, tables.sets.get(&set_key).map(|(s, _)| *s))?;
        if let Some((expect_full, record)) = full_list {
            let current = tables.lists.get(&record.list_id).map(|(s, _)| *s);
            let next = Self::check(Some(expect_full), current)?;
            tables
                .lists
                .insert(record.list_id.clone(), (next, record.clone()));
        }
        if tables.lists.contains_key(&new_list.list_id) {
            return Err(StorageError::Duplicate(new_list.list_id.clone()));
        }
        tables.sets.insert(set_key, (set_next, set.clone()));
        tables
            .lists
            .insert(new_list.list_id.clone(), (1, new_list.clone()));
        tables
            .bitmaps
            .insert(new_list.list_id.clone(), (1, new_bitmap.clone()));
        Ok(())
    }

    async fn read_bitmap(&self, list_id: &str) -> Result<Versioned<ListBitmap>, StorageError> {
        let tables = self.tables.lock().unwrap();
        tables
            .bitmaps
            .get(list_id)
            .map(|(seq, bm)| Versioned::new(*seq, bm.clone()))
            .ok_or(StorageError::NotFound)
    }

    async fn write_bitmap(&self, expect: u64, bitmap: &ListBitmap) -> Result<u64, StorageError> {
        let mut tables = self.tables.lock().unwrap();
        let current = tables.bitmaps.get(&bitmap.list_id).map(|(s, _)| *s);
        let next = Self::check(Some(expect), current)?;
        tables
            .bitmaps
            .insert(bitmap.list_id.clone(), (next, bitmap.clone()));
        Ok(next)
    }

    async fn read_slc(&self, list_id: &str) -> Result<Option<Versioned<StoredSlc>>, StorageError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .slcs
            .get(list_id)
            .map(|(seq, slc)| Versioned::new(*seq, slc.clone())))
    }

    async fn write_slc(
        &self,
        list_id: &str,
        expect: Option<u64>,
        slc: &StoredSlc,
    ) -> Result<u64, StorageError> {
        let mut tables = self.tables.lock().unwrap();
        let next = Self::check(expect, tables.slcs.get(list_id).map(|(s, _)| *s))?;
        tables.slcs.insert(list_id.to_string(), (next, slc.clone()));
        Ok(next)
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert(&self, record: &CredentialRecord) -> Result<(), StorageError> {
        let mut tables = self.tables.lock().unwrap();
        let primary = (record.tenant_id.clone(), record.credential_id.clone());
        if tables.credentials.contains_key(&primary) {
            return Err(StorageError::Duplicate(record.credential_id.clone()));
        }
        if let Some(alias) = &record.alias_id {
            let alias_key = (record.tenant_id.clone(), alias.clone());
            if tables.aliases.contains_key(&alias_key) || tables.credentials.contains_key(&alias_key)
            {
                return Err(StorageError::Duplicate(alias.clone()));
            }
            tables
                .aliases
                .insert(alias_key, record.credential_id.clone());
        }
        for entry in &record.status_entries {
            tables.positions.insert(
                (entry.list_id.clone(), entry.index),
                record.credential_id.clone(),
            );
        }
        tables.credentials.insert(primary, record.clone());
        Ok(())
    }

    async fn get(
        &self,
        tenant_id: &str,
        credential_id: &str,
    ) -> Result<Option<CredentialRecord>, StorageError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .credentials
            .get(&(tenant_id.to_string(), credential_id.to_string()))
            .cloned())
    }

    async fn find(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<CredentialRecord>, StorageError> {
        let tables = self.tables.lock().unwrap();
        let key = (tenant_id.to_string(), id.to_string());
        if let Some(record) = tables.credentials.get(&key) {
            return Ok(Some(record.clone()));
        }
        match tables.aliases.get(&key) {
            Some(primary) => Ok(tables
                .credentials
                .get(&(tenant_id.to_string(), primary.clone()))
                .cloned()),
            None => Ok(None),
        }
    }

    async fn occupant(&self, list_id: &str, index: u64) -> Result<Option<String>, StorageError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .positions
            .get(&(list_id.to_string(), index))
            .cloned())
    }
}

#[async_trait]
impl InstanceStore for MemoryStore {
    async fn put_instance(&self, instance: &IssuerInstance) -> Result<(), StorageError> {
        let mut tables = self.tables.lock().unwrap();
        tables
            .instances
            .insert(instance.id.clone(), instance.clone());
        Ok(())
    }

    async fn get_instance(&self, id: &str) -> Result<Option<IssuerInstance>, StorageError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.instances.get(id).cloned())
    }

    async fn put_context(
        &self,
        tenant_id: &str,
        url: &str,
        document: &Value,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.lock().unwrap();
        tables
            .contexts
            .insert((tenant_id.to_string(), url.to_string()), document.clone());
        Ok(())
    }

    async fn contexts(&self, tenant_id: &str) -> Result<Vec<(String, Value)>, StorageError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .contexts
            .iter()
            .filter(|((t, _), _)| t == tenant_id)
            .map(|((_, url), doc)| (url.clone(), doc.clone()))
            .collect())
    }
}
