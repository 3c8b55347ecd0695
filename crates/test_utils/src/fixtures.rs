// Path: crates/test_utils/src/fixtures.rs
//! Instance and credential fixtures.

use attestor_types::config::{
    Cryptosuite, CryptosuiteOptions, IssueOptions, IssuerInstance, StatusListOptions,
    StatusListType, StatusPurpose,
};
use serde_json::{json, Value};

/// A deterministic Ed25519 seed for test instances.
pub const TEST_SEED_HEX: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";

/// An instance with no status lists configured.
pub fn minimal_instance(id: &str) -> IssuerInstance {
    IssuerInstance {
        id: id.into(),
        controller: "did:example:issuer".into(),
        verification_method: "did:example:issuer#key-1".into(),
        signing_key_seed: TEST_SEED_HEX.into(),
        status_lists: vec![],
        issue_options: IssueOptions {
            cryptosuites: vec![CryptosuiteOptions {
                name: Cryptosuite::Ed25519Signature2020,
                mandatory_pointers: vec![],
            }],
            envelope: None,
        },
        allow_unidentified: false,
    }
}

/// An instance with one status-list family.
pub fn instance_with_status_list(
    id: &str,
    list_type: StatusListType,
    purposes: &[StatusPurpose],
    block_size: u32,
    block_count: u32,
    list_count: u32,
) -> IssuerInstance {
    let mut instance = minimal_instance(id);
    instance.status_lists.push(StatusListOptions {
        list_type,
        purposes: purposes.to_vec(),
        block_size,
        block_count,
        list_count,
        index_allocator: format!("urn:uuid:allocator-{}", id),
    });
    instance
}

/// A well-formed VC 1.1 credential body.
pub fn sample_credential(id: &str) -> Value {
    json!({
        "@context": [
            "https://www.w3.org/2018/credentials/v1",
            "https://www.w3.org/2018/credentials/examples/v1"
        ],
        "type": ["VerifiableCredential"],
        "issuer": "did:example:1",
        "issuanceDate": "2024-01-01T00:00:00Z",
        "credentialSubject": {"id": "did:example:2"},
        "id": id,
    })
}
