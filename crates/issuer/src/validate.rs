// Path: crates/issuer/src/validate.rs
//! Structural and term validation of submitted credentials.
//!
//! Structural failures (wrong shape, missing members) are `ValidationError`;
//! structurally sound input that references unknown contexts or undefined
//! terms is `DataError`. Full JSON-LD processing is out of scope: the
//! service keeps a registry of known contexts and the terms they define,
//! extended by each tenant's registered context documents, and checks
//! top-level credential properties against it.

use attestor_types::error::IssuerError;
use attestor_types::MAX_CREDENTIAL_BYTES;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// The VC 1.1 core context; credentials starting with it are 1.1 shaped.
pub const VC_V1_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
/// The VC 2.0 core context.
pub const VC_V2_CONTEXT: &str = "https://www.w3.org/ns/credentials/v2";

/// What a known context contributes to term resolution.
enum TermSet {
    /// The context defines an open-ended vocabulary (e.g. the examples
    /// contexts); unknown-term rejection is disabled when one is present.
    Open,
    /// The context defines exactly these top-level terms.
    Defined(HashSet<&'static str>),
}

fn builtin_contexts() -> HashMap<&'static str, TermSet> {
    let v1_terms: HashSet<&'static str> = [
        "id",
        "type",
        "issuer",
        "issuanceDate",
        "expirationDate",
        "credentialSubject",
        "credentialStatus",
        "credentialSchema",
        "proof",
        "refreshService",
        "termsOfUse",
        "evidence",
        "holder",
    ]
    .into();
    let v2_terms: HashSet<&'static str> = [
        "id",
        "type",
        "issuer",
        "validFrom",
        "validUntil",
        "name",
        "description",
        "credentialSubject",
        "credentialStatus",
        "credentialSchema",
        "proof",
        "refreshService",
        "termsOfUse",
        "evidence",
        "holder",
        "relatedResource",
        "confidenceMethod",
        "renderMethod",
    ]
    .into();

    let mut map = HashMap::new();
    map.insert(VC_V1_CONTEXT, TermSet::Defined(v1_terms));
    map.insert(VC_V2_CONTEXT, TermSet::Defined(v2_terms));
    map.insert(
        "https://www.w3.org/2018/credentials/examples/v1",
        TermSet::Open,
    );
    map.insert(
        "https://www.w3.org/ns/credentials/examples/v2",
        TermSet::Open,
    );
    map.insert("https://www.w3.org/ns/odrl.jsonld", TermSet::Open);
    map.insert(
        "https://w3id.org/vc/status-list/2021/v1",
        TermSet::Defined(HashSet::new()),
    );
    map.insert(
        "https://w3id.org/vc-revocation-list-2020/v1",
        TermSet::Defined(HashSet::new()),
    );
    map.insert(
        "https://w3id.org/security/suites/ed25519-2020/v1",
        TermSet::Defined(HashSet::new()),
    );
    map.insert(
        "https://w3id.org/security/data-integrity/v2",
        TermSet::Defined(HashSet::new()),
    );
    map
}

/// Terms defined by a tenant-registered or inline context object.
fn terms_of_context_object(ctx: &Value) -> HashSet<String> {
    match ctx {
        Value::Object(map) => map
            .keys()
            .filter(|k| !k.starts_with('@'))
            .cloned()
            .collect(),
        _ => HashSet::new(),
    }
}

/// Validates a submitted credential body against the tenant's vocabulary.
pub fn validate_credential(
    body: &Value,
    tenant_contexts: &[(String, Value)],
) -> Result<(), IssuerError> {
    let Some(obj) = body.as_object() else {
        return Err(IssuerError::validation(
            "credential must be a JSON object",
            vec!["credential".into()],
        ));
    };
    if obj.is_empty() {
        return Err(IssuerError::validation(
            "credential must not be empty",
            vec!["credential".into()],
        ));
    }
    if serde_json::to_vec(body).map(|b| b.len()).unwrap_or(0) > MAX_CREDENTIAL_BYTES {
        return Err(IssuerError::validation(
            "credential exceeds the size limit",
            vec!["credential".into()],
        ));
    }

    // --- @context shape ---
    let Some(contexts) = obj.get("@context").and_then(Value::as_array) else {
        return Err(IssuerError::validation(
            "credential @context must be an array",
            vec!["@context".into()],
        ));
    };
    let first = contexts.first().and_then(Value::as_str);
    let is_v1 = match first {
        Some(VC_V1_CONTEXT) => true,
        Some(VC_V2_CONTEXT) => false,
        _ => {
            return Err(IssuerError::Data(format!(
                "credential @context must start with '{}' or '{}'",
                VC_V1_CONTEXT, VC_V2_CONTEXT
            )))
        }
    };

    // --- resolve every context entry ---
    let builtins = builtin_contexts();
    let tenant: HashMap<&str, &Value> = tenant_contexts
        .iter()
        .map(|(url, doc)| (url.as_str(), doc))
        .collect();
    let mut open_vocabulary = false;
    let mut defined: HashSet<String> = HashSet::new();
    for ctx in contexts {
        match ctx {
            Value::String(url) => match builtins.get(url.as_str()) {
                Some(TermSet::Open) => open_vocabulary = true,
                Some(TermSet::Defined(terms)) => {
                    defined.extend(terms.iter().map(|t| t.to_string()));
                }
                None => match tenant.get(url.as_str()) {
                    Some(doc) => {
                        if let Some(inner) = doc.get("@context") {
                            defined.extend(terms_of_context_object(inner));
                        }
                    }
                    None => {
                        return Err(IssuerError::Data(format!("unknown context '{}'", url)));
                    }
                },
            },
            Value::Object(_) => defined.extend(terms_of_context_object(ctx)),
            _ => {
                return Err(IssuerError::Data(
                    "context entries must be URLs or objects".into(),
                ))
            }
        }
    }

    // --- required members ---
    let mut missing = Vec::new();
    let has_vc_type = match obj.get("type") {
        Some(Value::String(s)) => s == "VerifiableCredential",
        Some(Value::Array(types)) => types.iter().any(|t| t == "VerifiableCredential"),
        _ => false,
    };
    if !has_vc_type {
        missing.push("type".to_string());
    }
    if obj.get("issuer").is_none() {
        missing.push("issuer".to_string());
    }
    if !matches!(
        obj.get("credentialSubject"),
        Some(Value::Object(_)) | Some(Value::Array(_))
    ) {
        missing.push("credentialSubject".to_string());
    }
    if is_v1 && obj.get("issuanceDate").and_then(Value::as_str).is_none() {
        missing.push("issuanceDate".to_string());
    }
    if let Some(id) = obj.get("id") {
        if !matches!(id, Value::String(s) if !s.is_empty()) {
            missing.push("id".to_string());
        }
    }
    if !missing.is_empty() {
        return Err(IssuerError::validation(
            "credential is missing required members",
            missing,
        ));
    }

    // --- undefined terms ---
    if !open_vocabulary {
        for key in obj.keys() {
            if key.starts_with('@') {
                continue;
            }
            if !defined.contains(key.as_str()) {
                return Err(IssuerError::Data(format!(
                    "credential property '{}' is not defined by any supplied context",
                    key
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use attestor_test_utils::sample_credential;
    use attestor_types::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn well_formed_v1_credential_passes() {
        validate_credential(&sample_credential("urn:uuid:a"), &[]).unwrap();
    }

    #[test]
    fn empty_credential_is_rejected() {
        let err = validate_credential(&json!({}), &[]).unwrap_err();
        assert_eq!(err.code(), "ValidationError");
    }

    #[test]
    fn wrong_leading_context_is_a_data_error() {
        let mut body = sample_credential("urn:uuid:a");
        body["@context"][0] = json!("https://example.com/not-a-vc-context");
        let err = validate_credential(&body, &[]).unwrap_err();
        assert_eq!(err.code(), "DataError");
    }

    #[test]
    fn v1_requires_issuance_date() {
        let mut body = sample_credential("urn:uuid:a");
        body.as_object_mut().unwrap().remove("issuanceDate");
        let err = validate_credential(&body, &[]).unwrap_err();
        match err {
            IssuerError::Validation { details, .. } => {
                assert!(details.contains(&"issuanceDate".to_string()))
            }
            other => panic!("unexpected error {:?}", other.code()),
        }
    }

    #[test]
    fn undefined_term_is_a_data_error() {
        let body = json!({
            "@context": ["https://www.w3.org/ns/credentials/v2"],
            "type": ["VerifiableCredential"],
            "issuer": "did:example:1",
            "credentialSubject": {"id": "did:example:2"},
            "favouriteColor": "green",
        });
        let err = validate_credential(&body, &[]).unwrap_err();
        assert_eq!(err.code(), "DataError");
        assert!(err.to_string().contains("favouriteColor"));
    }

    #[test]
    fn examples_context_opens_the_vocabulary() {
        let body = json!({
            "@context": [
                "https://www.w3.org/2018/credentials/v1",
                "https://www.w3.org/2018/credentials/examples/v1"
            ],
            "type": ["VerifiableCredential"],
            "issuer": "did:example:1",
            "issuanceDate": "2024-01-01T00:00:00Z",
            "credentialSubject": {"id": "did:example:2"},
            "degree": {"type": "BachelorDegree"},
        });
        validate_credential(&body, &[]).unwrap();
    }

    #[test]
    fn tenant_context_defines_terms() {
        let body = json!({
            "@context": [
                "https://www.w3.org/ns/credentials/v2",
                "https://example.com/badge/v1"
            ],
            "type": ["VerifiableCredential"],
            "issuer": "did:example:1",
            "credentialSubject": {"id": "did:example:2"},
            "badgeLevel": 3,
        });
        // Unregistered: unknown context.
        let err = validate_credential(&body, &[]).unwrap_err();
        assert_eq!(err.code(), "DataError");

        let registered = vec![(
            "https://example.com/badge/v1".to_string(),
            json!({"@context": {"badgeLevel": "https://example.com/badge/#level"}}),
        )];
        validate_credential(&body, &registered).unwrap();
    }
}
