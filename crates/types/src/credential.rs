// Path: crates/types/src/credential.rs
//! Issued-credential records and per-request issuance options.

use crate::config::{StatusListType, StatusPurpose};
use crate::status::ListId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The value-only back-reference from an issued credential to the status
/// position(s) it occupies. Immutable once the credential is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntryRef {
    /// The purpose of the entry.
    pub purpose: StatusPurpose,
    /// The list family of the entry.
    pub list_type: StatusListType,
    /// The list holding the position.
    pub list_id: ListId,
    /// The list's position within its set; terse indices flatten it
    /// together with `index`.
    pub list_position: u32,
    /// The absolute index within the list.
    pub index: u64,
    /// The allocator namespace that assigned the position.
    pub index_allocator: String,
}

/// One issued credential as persisted.
///
/// `body` is the signed representation exactly as returned to the caller;
/// it is stored and served verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// The owning tenant.
    pub tenant_id: String,
    /// The primary credential id, unique per tenant.
    pub credential_id: String,
    /// An optional secondary unique id (the caller-supplied reference id
    /// when it differs from the credential body's own id).
    pub alias_id: Option<String>,
    /// The signed credential document.
    pub body: serde_json::Value,
    /// The status positions bound to this credential, in entry order.
    pub status_entries: Vec<StatusEntryRef>,
    /// Issuance time.
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied options on one issue request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    /// Overrides / supplements the credential body's `id` as the duplicate
    /// detection key.
    #[serde(default)]
    pub credential_id: Option<String>,
    /// Opaque caller data; accepted and ignored by the core.
    #[serde(default)]
    pub extra_information: Option<String>,
}
