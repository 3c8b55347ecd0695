// Path: crates/types/src/codec.rs
//! Defines the binary codec for records persisted by the storage layer.
//!
//! This module provides simple wrappers around `bincode` for compact
//! allocation-state records, and around `serde_json` for documents whose
//! byte representation must survive a round trip untouched (issued
//! credentials and status list credentials). Centralizing the codec in the
//! base `types` crate ensures every component reads and writes the exact
//! same representation.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a record into its compact binary representation.
pub fn to_bytes<T: Serialize>(v: &T) -> Result<Vec<u8>, String> {
    bincode::serialize(v).map_err(|e| format!("record encode failed: {}", e))
}

/// Decodes a record from its compact binary representation.
///
/// Fails fast on any decoding error with a descriptive message; malformed
/// stored state must never be silently repaired.
pub fn from_bytes<T: DeserializeOwned>(b: &[u8]) -> Result<T, String> {
    bincode::deserialize(b).map_err(|e| format!("record decode failed: {}", e))
}

/// Encodes a JSON document preserving its serde_json representation.
pub fn to_json_bytes<T: Serialize>(v: &T) -> Result<Vec<u8>, String> {
    serde_json::to_vec(v).map_err(|e| format!("document encode failed: {}", e))
}

/// Decodes a JSON document.
pub fn from_json_bytes<T: DeserializeOwned>(b: &[u8]) -> Result<T, String> {
    serde_json::from_slice(b).map_err(|e| format!("document decode failed: {}", e))
}
