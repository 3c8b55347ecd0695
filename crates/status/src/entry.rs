// Path: crates/status/src/entry.rs
//! Status entry construction and embedding into credential bodies.

use attestor_types::config::{StatusListOptions, StatusListType};
use attestor_types::status::Reservation;
use serde_json::{json, Value};

/// The public URL of a list's status list credential.
pub fn slc_url(base_url: &str, list_id: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), list_id)
}

/// Builds the `credentialStatus` entry for a reservation.
///
/// `base_url` is the instance's status-list base
/// (`{public_base}/{configId}/status-lists`). Terse entries omit the SLC
/// URL and carry one flat index over the whole set instead; consumers
/// reconstruct the list URL by dividing by the list length.
pub fn build(options: &StatusListOptions, base_url: &str, reservation: &Reservation) -> Value {
    let url = slc_url(base_url, &reservation.list_id);
    match options.list_type {
        StatusListType::BitstringStatusList => json!({
            "id": format!("{}#{}", url, reservation.index),
            "type": "BitstringStatusListEntry",
            "statusPurpose": reservation.purpose.as_str(),
            "statusListIndex": reservation.index.to_string(),
            "statusListCredential": url,
        }),
        StatusListType::TerseBitstringStatusList => {
            let terse_index =
                reservation.list_position as u64 * options.list_length() + reservation.index;
            json!({
                "type": "TerseBitstringStatusListEntry",
                "terseStatusListBaseUrl": base_url.trim_end_matches('/'),
                "terseStatusListIndex": terse_index,
            })
        }
        StatusListType::StatusList2021 => json!({
            "id": format!("{}#{}", url, reservation.index),
            "type": "StatusList2021Entry",
            "statusPurpose": reservation.purpose.as_str(),
            "statusListIndex": reservation.index.to_string(),
            "statusListCredential": url,
        }),
        StatusListType::RevocationList2020 => json!({
            "id": format!("{}#{}", url, reservation.index),
            "type": "RevocationList2020Status",
            "revocationListIndex": reservation.index.to_string(),
            "revocationListCredential": url,
        }),
    }
}

/// Embeds an entry into a credential body, preserving declaration order.
///
/// An existing `credentialStatus` object is extended to an array; an
/// existing array is appended to. Legacy list families also need their
/// defining context added to `@context` when absent.
pub fn attach(body: &mut Value, entry: Value, list_type: StatusListType) {
    if let Some(context_url) = list_type.context_url() {
        if let Some(contexts) = body.get_mut("@context").and_then(Value::as_array_mut) {
            if !contexts.iter().any(|c| c == context_url) {
                contexts.push(Value::String(context_url.to_string()));
            }
        }
    }

    let Some(obj) = body.as_object_mut() else { return };
    match obj.get_mut("credentialStatus") {
        None => {
            obj.insert("credentialStatus".into(), entry);
        }
        Some(Value::Array(entries)) => entries.push(entry),
        Some(existing) => {
            let previous = existing.take();
            *existing = Value::Array(vec![previous, entry]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attestor_types::config::StatusPurpose;
    use chrono::Utc;
    use uuid::Uuid;

    fn options(list_type: StatusListType) -> StatusListOptions {
        StatusListOptions {
            list_type,
            purposes: vec![StatusPurpose::Revocation],
            block_size: 8,
            block_count: 4,
            list_count: 2,
            index_allocator: "urn:uuid:alloc".into(),
        }
    }

    fn reservation(list_position: u32, index: u64) -> Reservation {
        Reservation {
            reservation_id: Uuid::new_v4(),
            tenant_id: "tenant-a".into(),
            purpose: StatusPurpose::Revocation,
            list_type: StatusListType::BitstringStatusList,
            list_id: "list-1".into(),
            list_position,
            block_id: 0,
            index,
            index_allocator: "urn:uuid:alloc".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn bitstring_entry_shape() {
        let entry = build(
            &options(StatusListType::BitstringStatusList),
            "https://issuer.example/tenant-a/status-lists",
            &reservation(0, 42),
        );
        assert_eq!(entry["type"], "BitstringStatusListEntry");
        assert_eq!(entry["statusPurpose"], "revocation");
        assert_eq!(entry["statusListIndex"], "42");
        assert_eq!(
            entry["statusListCredential"],
            "https://issuer.example/tenant-a/status-lists/list-1"
        );
    }

    #[test]
    fn terse_entry_flattens_the_index() {
        // list 1 of length 32, index 5 → terse index 37.
        let entry = build(
            &options(StatusListType::TerseBitstringStatusList),
            "https://issuer.example/tenant-a/status-lists",
            &reservation(1, 5),
        );
        assert_eq!(entry["type"], "TerseBitstringStatusListEntry");
        assert_eq!(entry["terseStatusListIndex"], 37);
        assert!(entry.get("statusListCredential").is_none());
    }

    #[test]
    fn attach_extends_existing_entry_to_array() {
        let mut body = serde_json::json!({
            "@context": ["https://www.w3.org/ns/credentials/v2"],
        });
        attach(
            &mut body,
            serde_json::json!({"statusPurpose": "revocation"}),
            StatusListType::BitstringStatusList,
        );
        assert!(body["credentialStatus"].is_object());
        attach(
            &mut body,
            serde_json::json!({"statusPurpose": "suspension"}),
            StatusListType::BitstringStatusList,
        );
        let entries = body["credentialStatus"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["statusPurpose"], "revocation");
        assert_eq!(entries[1]["statusPurpose"], "suspension");
    }

    #[test]
    fn legacy_type_adds_its_context_once() {
        let mut body = serde_json::json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
        });
        attach(
            &mut body,
            serde_json::json!({"x": 1}),
            StatusListType::StatusList2021,
        );
        attach(
            &mut body,
            serde_json::json!({"x": 2}),
            StatusListType::StatusList2021,
        );
        let contexts = body["@context"].as_array().unwrap();
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[1], "https://w3id.org/vc/status-list/2021/v1");
    }
}
