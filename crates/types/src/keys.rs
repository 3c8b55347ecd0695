// Path: crates/types/src/keys.rs
//! Constants for well-known storage table names and key prefixes.
//!
//! Key layout mirrors the record ownership tree: blocks are keyed under
//! their list, positions under their list, credentials and aliases under
//! their tenant. Composite keys join components with a `0x00` separator so
//! no component can collide across the boundary.

/// Table of list-set records, keyed by [`crate::status::SetKey::encode`].
pub const TABLE_SETS: &str = "status_sets";
/// Table of list records, keyed by list id.
pub const TABLE_LISTS: &str = "status_lists";
/// Table of block records, keyed by `list_id \0 block_be32`.
pub const TABLE_BLOCKS: &str = "status_blocks";
/// Table of status bitmaps, keyed by list id.
pub const TABLE_BITMAPS: &str = "status_bitmaps";
/// Table of published status list credentials, keyed by list id.
pub const TABLE_SLCS: &str = "status_slcs";
/// Table of credential records, keyed by `tenant \0 credential_id`.
pub const TABLE_CREDENTIALS: &str = "credentials";
/// Unique alias index, keyed by `tenant \0 alias_id`, value = credential id.
pub const TABLE_ALIASES: &str = "credential_aliases";
/// Position occupancy index, keyed by `list_id \0 index_be64`, value =
/// credential id. Written atomically with the credential record; recovery
/// treats it as the authoritative occupancy check.
pub const TABLE_POSITIONS: &str = "status_positions";
/// Table of issuer instances, keyed by instance id.
pub const TABLE_INSTANCES: &str = "issuer_instances";
/// Table of tenant-registered JSON-LD contexts, keyed by `tenant \0 url`.
pub const TABLE_CONTEXTS: &str = "ld_contexts";

/// Joins key components with the `0x00` separator.
pub fn composite_key(parts: &[&[u8]]) -> Vec<u8> {
    let len = parts.iter().map(|p| p.len()).sum::<usize>() + parts.len().saturating_sub(1);
    let mut out = Vec::with_capacity(len);
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push(0);
        }
        out.extend_from_slice(part);
    }
    out
}

/// The key of a block record.
pub fn block_key(list_id: &str, block_id: u32) -> Vec<u8> {
    composite_key(&[list_id.as_bytes(), &block_id.to_be_bytes()])
}

/// The key of a position-occupancy entry.
pub fn position_key(list_id: &str, index: u64) -> Vec<u8> {
    composite_key(&[list_id.as_bytes(), &index.to_be_bytes()])
}

/// The key of a credential record.
pub fn credential_key(tenant_id: &str, credential_id: &str) -> Vec<u8> {
    composite_key(&[tenant_id.as_bytes(), credential_id.as_bytes()])
}

/// The key of a tenant-registered context document.
pub fn context_key(tenant_id: &str, url: &str) -> Vec<u8> {
    composite_key(&[tenant_id.as_bytes(), url.as_bytes()])
}
