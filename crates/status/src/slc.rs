// Path: crates/status/src/slc.rs
//! Status list credential document construction.
//!
//! Builds the unsigned SLC body for each list family; the updater hands the
//! body to the signer and stores the result. Legacy families keep the VC
//! 1.1 context and `issuanceDate`; bitstring lists use VC 2.0.

use attestor_types::config::{StatusListType, StatusPurpose};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

const VC_V1_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
const VC_V2_CONTEXT: &str = "https://www.w3.org/ns/credentials/v2";

/// Builds the unsigned status list credential for one list.
pub fn build_document(
    issuer: &str,
    list_type: StatusListType,
    purpose: StatusPurpose,
    slc_url: &str,
    encoded_list: &str,
    now: DateTime<Utc>,
) -> Value {
    let timestamp = now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let mut subject = json!({
        "id": format!("{}#list", slc_url),
        "type": list_type.subject_type(),
        "encodedList": encoded_list,
    });
    // RevocationList2020 has a fixed purpose and omits the field.
    if list_type != StatusListType::RevocationList2020 {
        subject["statusPurpose"] = Value::String(purpose.as_str().to_string());
    }

    let mut document = json!({
        "id": slc_url,
        "type": ["VerifiableCredential", list_type.credential_type()],
        "issuer": issuer,
        "credentialSubject": subject,
    });
    match list_type {
        StatusListType::BitstringStatusList | StatusListType::TerseBitstringStatusList => {
            document["@context"] = json!([VC_V2_CONTEXT]);
            document["validFrom"] = Value::String(timestamp);
        }
        StatusListType::StatusList2021 => {
            document["@context"] = json!([VC_V1_CONTEXT, "https://w3id.org/vc/status-list/2021/v1"]);
            document["issuanceDate"] = Value::String(timestamp);
        }
        StatusListType::RevocationList2020 => {
            document["@context"] =
                json!([VC_V1_CONTEXT, "https://w3id.org/vc-revocation-list-2020/v1"]);
            document["issuanceDate"] = Value::String(timestamp);
        }
    }
    document
}
