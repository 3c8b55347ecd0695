// Path: crates/issuer/tests/redb_roundtrip.rs
//! The full pipeline against the real redb store: durability, uniqueness,
//! and recovery behave the same as over the in-memory mock.

use attestor_issuer::{Issuer, LocalSignerProvider};
use attestor_status::allocator::AllocatorConfig;
use attestor_storage::RedbStore;
use attestor_test_utils::{instance_with_status_list, sample_credential, FixedRandom};
use attestor_types::config::{StatusListType, StatusPurpose};
use attestor_types::credential::RequestOptions;
use attestor_types::error::{ErrorCode, IssuerError};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn issuer_over(store: Arc<RedbStore>) -> Issuer {
    Issuer::new(
        store.clone(),
        store.clone(),
        store,
        Arc::new(LocalSignerProvider::new()),
        "https://issuer.example",
    )
    .with_random(Arc::new(FixedRandom(0)))
    .with_allocator_config(AllocatorConfig {
        backoff_base: Duration::from_millis(1),
        ..AllocatorConfig::default()
    })
}

fn temp_store() -> Arc<RedbStore> {
    let path = std::env::temp_dir().join(format!(
        "attestor-issuer-{}.redb",
        uuid::Uuid::new_v4()
    ));
    Arc::new(RedbStore::open(path).unwrap())
}

#[tokio::test]
async fn issue_fetch_and_duplicate_on_disk() {
    let store = temp_store();
    let issuer = issuer_over(store.clone());
    issuer
        .instances()
        .register(&instance_with_status_list(
            "tenant-a",
            StatusListType::BitstringStatusList,
            &[StatusPurpose::Revocation],
            8,
            2,
            1,
        ))
        .await
        .unwrap();

    let signed = issuer
        .issue(
            "tenant-a",
            sample_credential("urn:uuid:disk-1"),
            RequestOptions::default(),
        )
        .await
        .unwrap();
    assert!(signed.get("proof").is_some());

    // A second issuer over the same file sees the stored credential and
    // rejects the duplicate: durability is in the store, not the process.
    let reopened = issuer_over(store);
    let fetched = reopened
        .get_credential("tenant-a", "urn:uuid:disk-1")
        .await
        .unwrap();
    assert_eq!(fetched, signed);

    let err = reopened
        .issue(
            "tenant-a",
            sample_credential("urn:uuid:disk-1"),
            RequestOptions::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "DuplicateError");
}

#[tokio::test]
async fn positions_stay_unique_across_issuer_restarts() {
    let store = temp_store();
    let instance = instance_with_status_list(
        "tenant-a",
        StatusListType::BitstringStatusList,
        &[StatusPurpose::Revocation],
        4,
        2,
        1,
    );

    let mut seen = HashSet::new();
    for i in 0..8 {
        // A fresh pipeline per issuance: all coordination is in the store.
        let issuer = issuer_over(store.clone());
        if i == 0 {
            issuer.instances().register(&instance).await.unwrap();
        }
        let signed = issuer
            .issue(
                "tenant-a",
                sample_credential(&format!("urn:uuid:restart-{}", i)),
                RequestOptions::default(),
            )
            .await
            .unwrap();
        let index = signed["credentialStatus"]["statusListIndex"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(seen.insert(index), "duplicate index after restart");
    }

    // Capacity of 8 exhausted, single list: the ninth fails the quota.
    let issuer = issuer_over(store);
    let err = issuer
        .issue(
            "tenant-a",
            sample_credential("urn:uuid:restart-8"),
            RequestOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, IssuerError::QuotaExceeded(_)));
}
