// Path: crates/storage/src/redb_store.rs
use async_trait::async_trait;
use attestor_api::store::{CredentialStore, InstanceStore, StatusListStore, Versioned};
use attestor_types::codec;
use attestor_types::config::IssuerInstance;
use attestor_types::credential::CredentialRecord;
use attestor_types::error::StorageError;
use attestor_types::keys;
use attestor_types::status::{
    BlockRecord, ListBitmap, ListRecord, ListSetRecord, SetKey, StoredSlc,
};
use redb::{Database, ReadTransaction, ReadableTable, TableDefinition, WriteTransaction};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// ---- Table definitions (single DB, composite keys) ----
/// Versioned records, value = [seq_be(8)][payload]
const SETS: TableDefinition<&[u8], &[u8]> = TableDefinition::new(keys::TABLE_SETS);
const LISTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new(keys::TABLE_LISTS);
const BLOCKS: TableDefinition<&[u8], &[u8]> = TableDefinition::new(keys::TABLE_BLOCKS);
const BITMAPS: TableDefinition<&[u8], &[u8]> = TableDefinition::new(keys::TABLE_BITMAPS);
const SLCS: TableDefinition<&[u8], &[u8]> = TableDefinition::new(keys::TABLE_SLCS);

/// Unversioned records (immutable or last-write-wins)
const CREDENTIALS: TableDefinition<&[u8], &[u8]> = TableDefinition::new(keys::TABLE_CREDENTIALS);
const ALIASES: TableDefinition<&[u8], &[u8]> = TableDefinition::new(keys::TABLE_ALIASES);
const POSITIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new(keys::TABLE_POSITIONS);
const INSTANCES: TableDefinition<&[u8], &[u8]> = TableDefinition::new(keys::TABLE_INSTANCES);
const CONTEXTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new(keys::TABLE_CONTEXTS);

fn backend<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Backend(e.to_string())
}

fn frame(sequence: u64, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(&sequence.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn unframe(bytes: &[u8]) -> Result<(u64, &[u8]), StorageError> {
    if bytes.len() < 8 {
        return Err(StorageError::Decode("versioned record too short".into()));
    }
    let (seq_bytes, payload) = bytes.split_at(8);
    let mut a = [0u8; 8];
    a.copy_from_slice(seq_bytes);
    Ok((u64::from_be_bytes(a), payload))
}

/// A single-file redb store implementing the issuer's persistence
/// contracts.
///
/// Versioned tables use the `[seq_be(8)][payload]` frame; the sequence
/// starts at 1 on creation and increments on every successful CAS write.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Opens (creating if needed) the database at `path` and ensures all
    /// tables exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(backend)?;
        {
            let w = db.begin_write().map_err(backend)?;
            {
                w.open_table(SETS).map_err(backend)?;
                w.open_table(LISTS).map_err(backend)?;
                w.open_table(BLOCKS).map_err(backend)?;
                w.open_table(BITMAPS).map_err(backend)?;
                w.open_table(SLCS).map_err(backend)?;
                w.open_table(CREDENTIALS).map_err(backend)?;
                w.open_table(ALIASES).map_err(backend)?;
                w.open_table(POSITIONS).map_err(backend)?;
                w.open_table(INSTANCES).map_err(backend)?;
                w.open_table(CONTEXTS).map_err(backend)?;
            }
            w.commit().map_err(backend)?;
        }
        tracing::info!(target: "storage", path = %path.as_ref().display(), "store opened");
        Ok(Self { db: Arc::new(db) })
    }

    fn read_txn(&self) -> Result<ReadTransaction<'_>, StorageError> {
        self.db.begin_read().map_err(backend)
    }

    fn write_txn(&self) -> Result<WriteTransaction<'_>, StorageError> {
        self.db.begin_write().map_err(backend)
    }

    fn read_versioned(
        &self,
        def: TableDefinition<&[u8], &[u8]>,
        key: &[u8],
    ) -> Result<Option<(u64, Vec<u8>)>, StorageError> {
        let r = self.read_txn()?;
        let t = r.open_table(def).map_err(backend)?;
        let out = match t.get(key).map_err(backend)? {
            Some(guard) => {
                let (seq, payload) = unframe(guard.value())?;
                Some((seq, payload.to_vec()))
            }
            None => None,
        };
        Ok(out)
    }

    /// CAS write inside a fresh transaction. `expect = None` creates.
    fn write_versioned(
        &self,
        def: TableDefinition<&[u8], &[u8]>,
        key: &[u8],
        expect: Option<u64>,
        payload: &[u8],
    ) -> Result<u64, StorageError> {
        let w = self.write_txn()?;
        let next;
        {
            let mut t = w.open_table(def).map_err(backend)?;
            let current = match t.get(key).map_err(backend)? {
                Some(guard) => Some(unframe(guard.value())?.0),
                None => None,
            };
            next = Self::check_sequence(expect, current)?;
            t.insert(key, frame(next, payload).as_slice())
                .map_err(backend)?;
        }
        w.commit().map_err(backend)?;
        Ok(next)
    }

    fn check_sequence(expect: Option<u64>, current: Option<u64>) -> Result<u64, StorageError> {
        match (expect, current) {
            (None, None) => Ok(1),
            (None, Some(found)) => Err(StorageError::Conflict { expected: 0, found }),
            (Some(expected), None) => Err(StorageError::Conflict { expected, found: 0 }),
            (Some(expected), Some(found)) if expected == found => Ok(found + 1),
            (Some(expected), Some(found)) => Err(StorageError::Conflict { expected, found }),
        }
    }

    fn read_plain(
        &self,
        def: TableDefinition<&[u8], &[u8]>,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let r = self.read_txn()?;
        let t = r.open_table(def).map_err(backend)?;
        let value = t.get(key).map_err(backend)?.map(|g| g.value().to_vec());
        Ok(value)
    }

    fn decode<T: serde::de::DeserializeOwned>(payload: &[u8]) -> Result<T, StorageError> {
        codec::from_bytes(payload).map_err(StorageError::Decode)
    }

    fn encode<T: serde::Serialize>(record: &T) -> Result<Vec<u8>, StorageError> {
        codec::to_bytes(record).map_err(StorageError::Encode)
    }
}

#[async_trait]
impl StatusListStore for RedbStore {
    async fn load_set(
        &self,
        key: &SetKey,
    ) -> Result<Option<Versioned<ListSetRecord>>, StorageError> {
        match self.read_versioned(SETS, &key.encode())? {
            Some((seq, payload)) => Ok(Some(Versioned::new(seq, Self::decode(&payload)?))),
            None => Ok(None),
        }
    }

    async fn write_set(
        &self,
        expect: Option<u64>,
        set: &ListSetRecord,
    ) -> Result<u64, StorageError> {
        self.write_versioned(SETS, &set.key.encode(), expect, &Self::encode(set)?)
    }

    async fn read_list(&self, list_id: &str) -> Result<Versioned<ListRecord>, StorageError> {
        match self.read_versioned(LISTS, list_id.as_bytes())? {
            Some((seq, payload)) => Ok(Versioned::new(seq, Self::decode(&payload)?)),
            None => Err(StorageError::NotFound),
        }
    }

    async fn write_list(&self, expect: u64, list: &ListRecord) -> Result<u64, StorageError> {
        self.write_versioned(
            LISTS,
            list.list_id.as_bytes(),
            Some(expect),
            &Self::encode(list)?,
        )
    }

    async fn read_block(
        &self,
        list_id: &str,
        block_id: u32,
    ) -> Result<Option<Versioned<BlockRecord>>, StorageError> {
        match self.read_versioned(BLOCKS, &keys::block_key(list_id, block_id))? {
            Some((seq, payload)) => Ok(Some(Versioned::new(seq, Self::decode(&payload)?))),
            None => Ok(None),
        }
    }

    async fn write_block(
        &self,
        expect: Option<u64>,
        block: &BlockRecord,
    ) -> Result<u64, StorageError> {
        self.write_versioned(
            BLOCKS,
            &keys::block_key(&block.list_id, block.block_id),
            expect,
            &Self::encode(block)?,
        )
    }

    async fn list_blocks(
        &self,
        list_id: &str,
    ) -> Result<Vec<Versioned<BlockRecord>>, StorageError> {
        let mut prefix = list_id.as_bytes().to_vec();
        prefix.push(0);

        let r = self.read_txn()?;
        let t = r.open_table(BLOCKS).map_err(backend)?;
        let mut out = Vec::new();
        for entry in t.range(prefix.as_slice()..).map_err(backend)? {
            let (key, value) = entry.map_err(backend)?;
            if !key.value().starts_with(prefix.as_slice()) {
                break;
            }
            let (seq, payload) = unframe(value.value())?;
            out.push(Versioned::new(seq, Self::decode(payload)?));
        }
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
        let set_payload = Self::encode(set)?;
        let new_list_payload = Self::encode(new_list)?;
        let bitmap_payload = Self::encode(new_bitmap)?;
        let full_payload = match full_list {
            Some((_, record)) => Some(Self::encode(record)?),
            None => None,
        };

        let w = self.write_txn()?;
        {
            let mut sets = w.open_table(SETS).map_err(backend)?;
            let set_key = set.key.encode();
            let current = match sets.get(set_key.as_slice()).map_err(backend)? {
                Some(guard) => Some(unframe(guard.value())?.0),
                None => None,
            };
            let next = Self::check_sequence(expect_set, current)?;
            sets.insert(set_key.as_slice(), frame(next, &set_payload).as_slice())
                .map_err(backend)?;

            let mut lists = w.open_table(LISTS).map_err(backend)?;
            if let (Some((expect_full, record)), Some(payload)) = (full_list, &full_payload) {
                let key = record.list_id.as_bytes();
                let current = match lists.get(key).map_err(backend)? {
                    Some(guard) => Some(unframe(guard.value())?.0),
                    None => None,
                };
                let next = Self::check_sequence(Some(expect_full), current)?;
                lists
                    .insert(key, frame(next, payload).as_slice())
                    .map_err(backend)?;
            }

            let new_key = new_list.list_id.as_bytes();
            if lists.get(new_key).map_err(backend)?.is_some() {
                return Err(StorageError::Duplicate(new_list.list_id.clone()));
            }
            lists
                .insert(new_key, frame(1, &new_list_payload).as_slice())
                .map_err(backend)?;

            let mut bitmaps = w.open_table(BITMAPS).map_err(backend)?;
            bitmaps
                .insert(new_key, frame(1, &bitmap_payload).as_slice())
                .map_err(backend)?;
        }
        w.commit().map_err(backend)?;
        Ok(())
    }

    async fn read_bitmap(&self, list_id: &str) -> Result<Versioned<ListBitmap>, StorageError> {
        match self.read_versioned(BITMAPS, list_id.as_bytes())? {
            Some((seq, payload)) => Ok(Versioned::new(seq, Self::decode(&payload)?)),
            None => Err(StorageError::NotFound),
        }
    }

    async fn write_bitmap(&self, expect: u64, bitmap: &ListBitmap) -> Result<u64, StorageError> {
        self.write_versioned(
            BITMAPS,
            bitmap.list_id.as_bytes(),
            Some(expect),
            &Self::encode(bitmap)?,
        )
    }

    async fn read_slc(&self, list_id: &str) -> Result<Option<Versioned<StoredSlc>>, StorageError> {
        match self.read_versioned(SLCS, list_id.as_bytes())? {
            Some((seq, payload)) => {
                let slc = codec::from_json_bytes(&payload).map_err(StorageError::Decode)?;
                Ok(Some(Versioned::new(seq, slc)))
            }
            None => Ok(None),
        }
    }

    async fn write_slc(
        &self,
        list_id: &str,
        expect: Option<u64>,
        slc: &StoredSlc,
    ) -> Result<u64, StorageError> {
        let payload = codec::to_json_bytes(slc).map_err(StorageError::Encode)?;
        self.write_versioned(SLCS, list_id.as_bytes(), expect, &payload)
    }
}

#[async_trait]
impl CredentialStore for RedbStore {
    async fn insert(&self, record: &CredentialRecord) -> Result<(), StorageError> {
        let payload = codec::to_json_bytes(record).map_err(StorageError::Encode)?;
        let primary_key = keys::credential_key(&record.tenant_id, &record.credential_id);

        let w = self.write_txn()?;
        {
            let mut credentials = w.open_table(CREDENTIALS).map_err(backend)?;
            if credentials
                .get(primary_key.as_slice())
                .map_err(backend)?
                .is_some()
            {
                return Err(StorageError::Duplicate(record.credential_id.clone()));
            }

            let mut aliases = w.open_table(ALIASES).map_err(backend)?;
            if let Some(alias) = &record.alias_id {
                let alias_key = keys::credential_key(&record.tenant_id, alias);
                // The alias namespace is shared with primary ids: an alias
                // colliding with an existing credential id is a duplicate.
                if aliases.get(alias_key.as_slice()).map_err(backend)?.is_some()
                    || credentials
                        .get(alias_key.as_slice())
                        .map_err(backend)?
                        .is_some()
                {
                    return Err(StorageError::Duplicate(alias.clone()));
                }
                aliases
                    .insert(alias_key.as_slice(), record.credential_id.as_bytes())
                    .map_err(backend)?;
            }

            credentials
                .insert(primary_key.as_slice(), payload.as_slice())
                .map_err(backend)?;

            let mut positions = w.open_table(POSITIONS).map_err(backend)?;
            for entry in &record.status_entries {
                positions
                    .insert(
                        keys::position_key(&entry.list_id, entry.index).as_slice(),
                        record.credential_id.as_bytes(),
                    )
                    .map_err(backend)?;
            }
        }
        w.commit().map_err(backend)?;
        Ok(())
    }

    async fn get(
        &self,
        tenant_id: &str,
        credential_id: &str,
    ) -> Result<Option<CredentialRecord>, StorageError> {
        match self.read_plain(CREDENTIALS, &keys::credential_key(tenant_id, credential_id))? {
            Some(payload) => Ok(Some(
                codec::from_json_bytes(&payload).map_err(StorageError::Decode)?,
            )),
            None => Ok(None),
        }
    }

    async fn find(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<CredentialRecord>, StorageError> {
        if let Some(record) = self.get(tenant_id, id).await? {
            return Ok(Some(record));
        }
        let alias_key = keys::credential_key(tenant_id, id);
        match self.read_plain(ALIASES, &alias_key)? {
            Some(primary) => {
                let primary = String::from_utf8(primary)
                    .map_err(|e| StorageError::Decode(e.to_string()))?;
                self.get(tenant_id, &primary).await
            }
            None => Ok(None),
        }
    }

    async fn occupant(&self, list_id: &str, index: u64) -> Result<Option<String>, StorageError> {
        match self.read_plain(POSITIONS, &keys::position_key(list_id, index))? {
            Some(bytes) => Ok(Some(
                String::from_utf8(bytes).map_err(|e| StorageError::Decode(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl InstanceStore for RedbStore {
    async fn put_instance(&self, instance: &IssuerInstance) -> Result<(), StorageError> {
        let payload = codec::to_json_bytes(instance).map_err(StorageError::Encode)?;
        let w = self.write_txn()?;
        {
            let mut t = w.open_table(INSTANCES).map_err(backend)?;
            t.insert(instance.id.as_bytes(), payload.as_slice())
                .map_err(backend)?;
        }
        w.commit().map_err(backend)
    }

    async fn get_instance(&self, id: &str) -> Result<Option<IssuerInstance>, StorageError> {
        match self.read_plain(INSTANCES, id.as_bytes())? {
            Some(payload) => Ok(Some(
                codec::from_json_bytes(&payload).map_err(StorageError::Decode)?,
            )),
            None => Ok(None),
        }
    }

    async fn put_context(
        &self,
        tenant_id: &str,
        url: &str,
        document: &Value,
    ) -> Result<(), StorageError> {
        let payload = codec::to_json_bytes(document).map_err(StorageError::Encode)?;
        let w = self.write_txn()?;
        {
            let mut t = w.open_table(CONTEXTS).map_err(backend)?;
            t.insert(
                keys::context_key(tenant_id, url).as_slice(),
                payload.as_slice(),
            )
            .map_err(backend)?;
        }
        w.commit().map_err(backend)
    }

    async fn contexts(&self, tenant_id: &str) -> Result<Vec<(String, Value)>, StorageError> {
        let mut prefix = tenant_id.as_bytes().to_vec();
        prefix.push(0);

        let r = self.read_txn()?;
        let t = r.open_table(CONTEXTS).map_err(backend)?;
        let mut out = Vec::new();
        for entry in t.range(prefix.as_slice()..).map_err(backend)? {
            let (key, value) = entry.map_err(backend)?;
            if !key.value().starts_with(prefix.as_slice()) {
                break;
            }
            let url = String::from_utf8(key.value()[prefix.len()..].to_vec())
                .map_err(|e| StorageError::Decode(e.to_string()))?;
            let doc = codec::from_json_bytes(value.value()).map_err(StorageError::Decode)?;
            out.push((url, doc));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attestor_types::config::{StatusListType, StatusPurpose};
    use chrono::Utc;

    fn temp_store() -> RedbStore {
        let path = std::env::temp_dir().join(format!("attestor-{}.redb", uuid::Uuid::new_v4()));
        RedbStore::open(path).unwrap()
    }

    fn set_key() -> SetKey {
        SetKey {
            tenant_id: "tenant-a".into(),
            purpose: StatusPurpose::Revocation,
            list_type: StatusListType::BitstringStatusList,
        }
    }

    fn sample_record(id: &str, alias: Option<&str>) -> CredentialRecord {
        CredentialRecord {
            tenant_id: "tenant-a".into(),
            credential_id: id.into(),
            alias_id: alias.map(String::from),
            body: serde_json::json!({"id": id}),
            status_entries: vec![],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn cas_write_detects_conflicts() {
        let store = temp_store();
        let set = ListSetRecord::new(set_key());
        let seq = store.write_set(None, &set).await.unwrap();
        assert_eq!(seq, 1);

        // Re-creating fails, writing with the right sequence succeeds,
        // writing with a stale sequence conflicts.
        assert!(matches!(
            store.write_set(None, &set).await,
            Err(StorageError::Conflict { .. })
        ));
        let seq = store.write_set(Some(1), &set).await.unwrap();
        assert_eq!(seq, 2);
        assert!(matches!(
            store.write_set(Some(1), &set).await,
            Err(StorageError::Conflict {
                expected: 1,
                found: 2
            })
        ));
    }

    #[tokio::test]
    async fn append_list_is_atomic_and_checks_set_sequence() {
        let store = temp_store();
        let mut set = ListSetRecord::new(set_key());
        set.lists.push("list-1".into());
        set.active = Some("list-1".into());
        let list = ListRecord::new("list-1".into(), 0, 4, Utc::now());
        let bitmap = ListBitmap::new("list-1".into(), 32);

        store
            .append_list(None, &set, None, &list, &bitmap)
            .await
            .unwrap();

        let loaded = store.load_set(&set_key()).await.unwrap().unwrap();
        assert_eq!(loaded.sequence, 1);
        assert_eq!(loaded.value.lists, vec!["list-1".to_string()]);
        assert_eq!(store.read_list("list-1").await.unwrap().sequence, 1);
        assert_eq!(store.read_bitmap("list-1").await.unwrap().sequence, 1);

        // A stale set sequence aborts the whole transaction.
        let list2 = ListRecord::new("list-2".into(), 1, 4, Utc::now());
        let bitmap2 = ListBitmap::new("list-2".into(), 32);
        let err = store
            .append_list(Some(7), &set, None, &list2, &bitmap2)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
        assert!(matches!(
            store.read_list("list-2").await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn credential_uniqueness_covers_id_and_alias() {
        let store = temp_store();
        let record = sample_record("urn:id1", Some("ref-1"));
        store.insert(&record).await.unwrap();

        // Same primary id.
        assert!(matches!(
            store.insert(&sample_record("urn:id1", None)).await,
            Err(StorageError::Duplicate(_))
        ));
        // Same alias under a different primary id.
        assert!(matches!(
            store.insert(&sample_record("urn:id2", Some("ref-1"))).await,
            Err(StorageError::Duplicate(_))
        ));
        // Alias resolves through find().
        let found = store.find("tenant-a", "ref-1").await.unwrap().unwrap();
        assert_eq!(found.credential_id, "urn:id1");
        // Unknown tenant sees nothing.
        assert!(store.find("tenant-b", "urn:id1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn positions_written_with_credential() {
        let store = temp_store();
        let mut record = sample_record("urn:id3", None);
        record.status_entries.push(attestor_types::credential::StatusEntryRef {
            purpose: StatusPurpose::Revocation,
            list_type: StatusListType::BitstringStatusList,
            list_id: "list-9".into(),
            list_position: 0,
            index: 17,
            index_allocator: "urn:uuid:alloc".into(),
        });
        store.insert(&record).await.unwrap();
        assert_eq!(
            store.occupant("list-9", 17).await.unwrap().as_deref(),
            Some("urn:id3")
        );
        assert!(store.occupant("list-9", 18).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn contexts_scan_is_tenant_scoped() {
        let store = temp_store();
        let doc = serde_json::json!({"@context": {"term": "https://example.com/term"}});
        store
            .put_context("tenant-a", "https://example.com/ctx", &doc)
            .await
            .unwrap();
        store
            .put_context("tenant-b", "https://example.com/other", &doc)
            .await
            .unwrap();

        let listed = store.contexts("tenant-a").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, "https://example.com/ctx");
    }
}
