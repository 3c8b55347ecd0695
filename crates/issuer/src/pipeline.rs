// Path: crates/issuer/src/pipeline.rs
//! The issuance and status-update pipeline.

use crate::instances::InstanceRegistry;
use crate::signer::SignerProvider;
use crate::validate;
use attestor_api::random::{RandomSource, ThreadRandom};
use attestor_api::status_client::StatusClient;
use attestor_api::store::{CredentialStore, InstanceStore, StatusListStore};
use attestor_api::writer::{IdentityDecorator, StatusWriter, WriterDecorator};
use attestor_status::allocator::AllocatorConfig;
use attestor_status::manager::ListManager;
use attestor_status::updater::{LocalStatusClient, StatusUpdater};
use attestor_status::writer::CredentialStatusWriter;
use attestor_types::config::IssuerInstance;
use attestor_types::credential::{CredentialRecord, RequestOptions, StatusEntryRef};
use attestor_types::error::{IssuerError, StorageError};
use attestor_types::status::{Reservation, SetKey};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// The end-to-end issuer: one instance of this drives every tenant.
#[derive(Clone)]
pub struct Issuer {
    instances: InstanceRegistry,
    credentials: Arc<dyn CredentialStore>,
    status_store: Arc<dyn StatusListStore>,
    signers: Arc<dyn SignerProvider>,
    status_client: Arc<dyn StatusClient>,
    decorator: Arc<dyn WriterDecorator>,
    random: Arc<dyn RandomSource>,
    allocator_config: AllocatorConfig,
    manager: Arc<ListManager>,
    /// The externally visible base URL status-list URLs are minted under.
    public_base: String,
}

impl Issuer {
    /// Builds an issuer with production defaults (thread randomness,
    /// identity writer decoration, self-hosted status publication).
    pub fn new(
        status_store: Arc<dyn StatusListStore>,
        credentials: Arc<dyn CredentialStore>,
        instance_store: Arc<dyn InstanceStore>,
        signers: Arc<dyn SignerProvider>,
        public_base: impl Into<String>,
    ) -> Self {
        let random: Arc<dyn RandomSource> = Arc::new(ThreadRandom);
        let allocator_config = AllocatorConfig::default();
        let manager = Arc::new(ListManager::new(
            status_store.clone(),
            credentials.clone(),
            random.clone(),
            allocator_config.clone(),
        ));
        Self {
            instances: InstanceRegistry::new(instance_store),
            credentials,
            status_store,
            signers,
            status_client: Arc::new(LocalStatusClient),
            decorator: Arc::new(IdentityDecorator),
            random,
            allocator_config,
            manager,
            public_base: public_base.into(),
        }
    }

    /// Replaces the randomness source (tests pin it).
    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self.rebuild_manager();
        self
    }

    /// Replaces the allocator retry/timeout policy.
    pub fn with_allocator_config(mut self, config: AllocatorConfig) -> Self {
        self.allocator_config = config;
        self.rebuild_manager();
        self
    }

    /// Replaces the writer decoration (tests simulate crash windows).
    pub fn with_writer_decorator(mut self, decorator: Arc<dyn WriterDecorator>) -> Self {
        self.decorator = decorator;
        self
    }

    /// Replaces the SLC publication client.
    pub fn with_status_client(mut self, client: Arc<dyn StatusClient>) -> Self {
        self.status_client = client;
        self
    }

    fn rebuild_manager(&mut self) {
        self.manager = Arc::new(ListManager::new(
            self.status_store.clone(),
            self.credentials.clone(),
            self.random.clone(),
            self.allocator_config.clone(),
        ));
    }

    /// Instance registration and context management.
    pub fn instances(&self) -> &InstanceRegistry {
        &self.instances
    }

    /// The status-list base URL for one instance.
    fn status_base(&self, config_id: &str) -> String {
        format!(
            "{}/{}/status-lists",
            self.public_base.trim_end_matches('/'),
            config_id
        )
    }

    fn updater_for(&self, instance: &IssuerInstance) -> Result<StatusUpdater, IssuerError> {
        let signer = self.signers.signer_for(instance)?;
        Ok(StatusUpdater::new(
            self.status_store.clone(),
            signer,
            self.status_client.clone(),
        ))
    }

    /// Issues one credential: validate, assemble status entries, sign,
    /// persist, finalize.
    pub async fn issue(
        &self,
        config_id: &str,
        credential: Value,
        options: RequestOptions,
    ) -> Result<Value, IssuerError> {
        let instance = self.instances.get(config_id).await?;
        let tenant_contexts = self.instances.contexts(config_id).await?;
        validate::validate_credential(&credential, &tenant_contexts)?;

        if let Some(extra) = &options.extra_information {
            tracing::debug!(target: "issuer", instance = config_id, extra, "extraInformation supplied");
        }

        let (credential_id, alias_id) = self.resolve_ids(&instance, &credential, &options)?;

        // Advisory fast-fail; the insert below is authoritative.
        if self.credentials.find(config_id, &credential_id).await?.is_some() {
            return Err(IssuerError::Duplicate(credential_id));
        }
        if let Some(alias) = &alias_id {
            if self.credentials.find(config_id, alias).await?.is_some() {
                return Err(IssuerError::Duplicate(alias.clone()));
            }
        }

        // Write phase: one writer per configured purpose, declaration order.
        let writers = self.writers_for(&instance, config_id);
        let mut body = credential;
        let mut held: Vec<(Arc<dyn StatusWriter>, Reservation)> = Vec::new();
        for writer in &writers {
            match writer.write(&mut body).await {
                Ok(reservation) => held.push((writer.clone(), reservation)),
                Err(e) => {
                    self.cancel_all(&held).await;
                    return Err(e.into());
                }
            }
        }

        // Sign. A signer failure leaves no observable side effect, so the
        // reservations are abandoned.
        let signer = match self.signers.signer_for(&instance) {
            Ok(s) => s,
            Err(e) => {
                self.cancel_all(&held).await;
                return Err(e.into());
            }
        };
        let signed = match signer.sign_credential(&body, &instance.issue_options).await {
            Ok(v) => v,
            Err(e) => {
                self.cancel_all(&held).await;
                return Err(e.into());
            }
        };

        let record = CredentialRecord {
            tenant_id: config_id.to_string(),
            credential_id: credential_id.clone(),
            alias_id,
            body: signed.clone(),
            status_entries: held
                .iter()
                .map(|(_, r)| StatusEntryRef {
                    purpose: r.purpose,
                    list_type: r.list_type,
                    list_id: r.list_id.clone(),
                    list_position: r.list_position,
                    index: r.index,
                    index_allocator: r.index_allocator.clone(),
                })
                .collect(),
            created_at: Utc::now(),
        };

        match self.credentials.insert(&record).await {
            Ok(()) => {}
            Err(StorageError::Duplicate(key)) => {
                self.cancel_all(&held).await;
                return Err(IssuerError::Duplicate(key));
            }
            Err(e) => {
                // The credential never became durable; the reservations can
                // be released safely.
                self.cancel_all(&held).await;
                return Err(e.into());
            }
        }

        // Finish phase: the credential is durable. Finalization failures
        // are left pending for the recovery pass, never abandoned.
        let finishes = held
            .iter()
            .map(|(writer, reservation)| writer.finish(reservation));
        for (result, (_, reservation)) in
            futures::future::join_all(finishes).await.into_iter().zip(&held)
        {
            if let Err(e) = result {
                tracing::warn!(
                    target: "issuer",
                    instance = config_id,
                    list_id = %reservation.list_id,
                    index = reservation.index,
                    error = %e,
                    "reservation finalization failed; left for recovery"
                );
            }
        }

        tracing::info!(
            target: "issuer",
            instance = config_id,
            credential_id = %credential_id,
            status_entries = record.status_entries.len(),
            "credential issued"
        );
        Ok(signed)
    }

    /// Fetches an issued credential by id or alias.
    pub async fn get_credential(
        &self,
        config_id: &str,
        credential_id: &str,
    ) -> Result<Value, IssuerError> {
        self.instances.get(config_id).await?;
        match self.credentials.find(config_id, credential_id).await? {
            Some(record) => Ok(record.body),
            None => Err(IssuerError::NotFound(format!(
                "unknown credential '{}'",
                credential_id
            ))),
        }
    }

    /// Applies a status change to an issued credential's bit.
    pub async fn update_status(
        &self,
        config_id: &str,
        credential_id: &str,
        index_allocator: &str,
        credential_status: &Value,
        value: bool,
    ) -> Result<(), IssuerError> {
        let instance = self.instances.get(config_id).await?;
        let record = self
            .credentials
            .find(config_id, credential_id)
            .await?
            .ok_or_else(|| {
                IssuerError::NotFound(format!("unknown credential '{}'", credential_id))
            })?;

        let entry = resolve_entry(&instance, &record, credential_status)?;
        if entry.index_allocator != index_allocator {
            return Err(IssuerError::validation(
                "indexAllocator does not match the allocator that issued this status entry",
                vec!["indexAllocator".into()],
            ));
        }

        let updater = self.updater_for(&instance)?;
        updater.set_status(&entry.list_id, entry.index, value).await
    }

    /// Serves (and lazily refreshes) a status list credential.
    pub async fn status_list_credential(
        &self,
        config_id: &str,
        list_id: &str,
        refresh: bool,
    ) -> Result<Value, IssuerError> {
        let instance = self.instances.get(config_id).await?;
        for opts in &instance.status_lists {
            for purpose in &opts.purposes {
                let key = SetKey {
                    tenant_id: config_id.to_string(),
                    purpose: *purpose,
                    list_type: opts.list_type,
                };
                let Some(set) = self.status_store.load_set(&key).await? else {
                    continue;
                };
                if !set.value.lists.iter().any(|l| l == list_id) {
                    continue;
                }
                let updater = self.updater_for(&instance)?;
                return updater
                    .status_list_credential(
                        &instance.controller,
                        opts.list_type,
                        *purpose,
                        &self.status_base(config_id),
                        list_id,
                        refresh,
                    )
                    .await;
            }
        }
        Err(IssuerError::NotFound(format!(
            "unknown status list '{}'",
            list_id
        )))
    }

    /// Runs the reservation recovery pass over every status family of an
    /// instance. Returns the number of reclaimed positions.
    pub async fn recover(&self, config_id: &str) -> Result<usize, IssuerError> {
        let instance = self.instances.get(config_id).await?;
        let mut reclaimed = 0;
        for opts in &instance.status_lists {
            for purpose in &opts.purposes {
                reclaimed += self.manager.recover(config_id, opts, *purpose).await?;
            }
        }
        Ok(reclaimed)
    }

    fn writers_for(&self, instance: &IssuerInstance, config_id: &str) -> Vec<Arc<dyn StatusWriter>> {
        let base = self.status_base(config_id);
        let mut writers: Vec<Arc<dyn StatusWriter>> = Vec::new();
        for opts in &instance.status_lists {
            for purpose in &opts.purposes {
                let writer: Arc<dyn StatusWriter> = Arc::new(CredentialStatusWriter::new(
                    self.manager.clone(),
                    &instance.id,
                    opts.clone(),
                    *purpose,
                    base.clone(),
                ));
                writers.push(self.decorator.decorate(writer));
            }
        }
        writers
    }

    fn resolve_ids(
        &self,
        instance: &IssuerInstance,
        credential: &Value,
        options: &RequestOptions,
    ) -> Result<(String, Option<String>), IssuerError> {
        let body_id = credential
            .get("id")
            .and_then(Value::as_str)
            .map(String::from);
        match (options.credential_id.clone(), body_id) {
            (Some(explicit), Some(body)) if explicit == body => Ok((explicit, None)),
            (Some(explicit), Some(body)) => Ok((explicit, Some(body))),
            (Some(explicit), None) => Ok((explicit, None)),
            (None, Some(body)) => Ok((body, None)),
            (None, None) => {
                if !instance.allow_unidentified {
                    return Err(IssuerError::validation(
                        "credential has no id and no credentialId option was supplied",
                        vec!["credential.id".into()],
                    ));
                }
                Ok((format!("urn:uuid:{}", Uuid::new_v4()), None))
            }
        }
    }

    async fn cancel_all(&self, held: &[(Arc<dyn StatusWriter>, Reservation)]) {
        for (writer, reservation) in held {
            if let Err(e) = writer.cancel(reservation).await {
                tracing::warn!(
                    target: "issuer",
                    list_id = %reservation.list_id,
                    index = reservation.index,
                    error = %e,
                    "reservation cancel failed; left for recovery"
                );
            }
        }
    }
}

/// Matches a status-update request's `credentialStatus` against the
/// credential's stored entries.
fn resolve_entry<'a>(
    instance: &IssuerInstance,
    record: &'a CredentialRecord,
    status: &Value,
) -> Result<&'a StatusEntryRef, IssuerError> {
    let Some(entry_type) = status.get("type").and_then(Value::as_str) else {
        return Err(IssuerError::validation(
            "credentialStatus.type is required",
            vec!["credentialStatus.type".into()],
        ));
    };
    let requested_purpose = status.get("statusPurpose").and_then(Value::as_str);

    for entry in &record.status_entries {
        if entry.list_type.entry_type() != entry_type {
            continue;
        }
        if let Some(purpose) = requested_purpose {
            if entry.purpose.as_str() != purpose {
                continue;
            }
        }
        if let Some(index) = status.get("statusListIndex").and_then(Value::as_str) {
            if index.parse::<u64>().ok() != Some(entry.index) {
                continue;
            }
        }
        if let Some(url) = status.get("statusListCredential").and_then(Value::as_str) {
            if !url.ends_with(&entry.list_id) {
                continue;
            }
        }
        if let Some(terse) = status.get("terseStatusListIndex").and_then(Value::as_u64) {
            let list_length = instance
                .status_lists
                .iter()
                .find(|o| o.list_type == entry.list_type && o.purposes.contains(&entry.purpose))
                .map(|o| o.list_length());
            let Some(list_length) = list_length else { continue };
            if entry.list_position as u64 * list_length + entry.index != terse {
                continue;
            }
        }
        return Ok(entry);
    }

    Err(IssuerError::NotFound(
        "credential has no status entry matching the supplied credentialStatus".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::LocalSignerProvider;
    use async_trait::async_trait;
    use attestor_api::signer::Signer;
    use attestor_status::bitstring;
    use attestor_test_utils::{
        instance_with_status_list, minimal_instance, sample_credential, FixedRandom, MemoryStore,
        NoFinishDecorator,
    };
    use attestor_types::config::{IssueOptions, StatusListType, StatusPurpose};
    use attestor_types::error::{ErrorCode, SignerError};
    use std::time::Duration;

    fn issuer(store: &Arc<MemoryStore>) -> Issuer {
        Issuer::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(LocalSignerProvider::new()),
            "https://issuer.example",
        )
        .with_random(Arc::new(FixedRandom(0)))
        .with_allocator_config(AllocatorConfig {
            backoff_base: Duration::from_millis(1),
            ..AllocatorConfig::default()
        })
    }

    #[tokio::test]
    async fn simple_issuance_without_status() {
        let store = Arc::new(MemoryStore::new());
        let issuer = issuer(&store);
        issuer
            .instances()
            .register(&minimal_instance("tenant-a"))
            .await
            .unwrap();

        let signed = issuer
            .issue(
                "tenant-a",
                sample_credential("urn:uuid:a"),
                RequestOptions::default(),
            )
            .await
            .unwrap();
        assert!(signed.get("proof").is_some());
        assert!(signed.get("credentialStatus").is_none());

        // Round-trip: the fetched credential is the issued one.
        let fetched = issuer
            .get_credential("tenant-a", "urn:uuid:a")
            .await
            .unwrap();
        assert_eq!(fetched, signed);
    }

    #[tokio::test]
    async fn duplicate_id_and_alias_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        let issuer = issuer(&store);
        issuer
            .instances()
            .register(&minimal_instance("tenant-a"))
            .await
            .unwrap();

        issuer
            .issue(
                "tenant-a",
                sample_credential("urn:id1"),
                RequestOptions::default(),
            )
            .await
            .unwrap();

        let err = issuer
            .issue(
                "tenant-a",
                sample_credential("urn:id1"),
                RequestOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DuplicateError");

        // The same explicit credentialId option also collides.
        let err = issuer
            .issue(
                "tenant-a",
                sample_credential("urn:id2"),
                RequestOptions {
                    credential_id: Some("urn:id1".into()),
                    extra_information: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DuplicateError");
    }

    #[tokio::test]
    async fn status_entries_follow_declaration_order() {
        let store = Arc::new(MemoryStore::new());
        let issuer = issuer(&store);
        let instance = instance_with_status_list(
            "tenant-a",
            StatusListType::BitstringStatusList,
            &[StatusPurpose::Revocation, StatusPurpose::Suspension],
            8,
            2,
            1,
        );
        issuer.instances().register(&instance).await.unwrap();

        let signed = issuer
            .issue(
                "tenant-a",
                sample_credential("urn:uuid:a"),
                RequestOptions::default(),
            )
            .await
            .unwrap();
        let entries = signed["credentialStatus"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["statusPurpose"], "revocation");
        assert_eq!(entries[1]["statusPurpose"], "suspension");
    }

    struct FailingSigner;

    #[async_trait]
    impl Signer for FailingSigner {
        async fn sign_credential(
            &self,
            _body: &Value,
            _options: &IssueOptions,
        ) -> Result<Value, SignerError> {
            Err(SignerError::Signing("kms unreachable".into()))
        }
        async fn sign_status_list(&self, _body: &Value) -> Result<Value, SignerError> {
            Err(SignerError::Signing("kms unreachable".into()))
        }
    }

    struct FailingSignerProvider;

    impl SignerProvider for FailingSignerProvider {
        fn signer_for(
            &self,
            _instance: &IssuerInstance,
        ) -> Result<Arc<dyn Signer>, SignerError> {
            Ok(Arc::new(FailingSigner))
        }
    }

    #[tokio::test]
    async fn signer_failure_abandons_reservations() {
        let store = Arc::new(MemoryStore::new());
        let issuer = Issuer::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(FailingSignerProvider),
            "https://issuer.example",
        )
        .with_random(Arc::new(FixedRandom(0)));
        issuer
            .instances()
            .register(&instance_with_status_list(
                "tenant-a",
                StatusListType::BitstringStatusList,
                &[StatusPurpose::Revocation],
                8,
                1,
                1,
            ))
            .await
            .unwrap();

        let err = issuer
            .issue(
                "tenant-a",
                sample_credential("urn:uuid:a"),
                RequestOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InternalServerError");

        // The reserved position was released.
        let set = store
            .load_set(&SetKey {
                tenant_id: "tenant-a".into(),
                purpose: StatusPurpose::Revocation,
                list_type: StatusListType::BitstringStatusList,
            })
            .await
            .unwrap()
            .unwrap();
        let list_id = set.value.lists[0].clone();
        for block in store.blocks_of(&list_id) {
            assert_eq!(block.allocated_count, 0);
            assert!(block.pending.is_empty());
        }
    }

    #[tokio::test]
    async fn stubbed_finalize_leaves_pendings_then_recovery_promotes_them() {
        let store = Arc::new(MemoryStore::new());
        let instance = instance_with_status_list(
            "tenant-a",
            StatusListType::BitstringStatusList,
            &[StatusPurpose::Revocation],
            8,
            1,
            1,
        );

        // Finalize stubbed out: reservations stay pending.
        let crashing = issuer(&store).with_writer_decorator(Arc::new(NoFinishDecorator));
        crashing.instances().register(&instance).await.unwrap();

        let first = crashing
            .issue(
                "tenant-a",
                sample_credential("urn:id1"),
                RequestOptions::default(),
            )
            .await
            .unwrap();
        let second = crashing
            .issue(
                "tenant-a",
                sample_credential("urn:id2"),
                RequestOptions::default(),
            )
            .await
            .unwrap();

        let idx1 = first["credentialStatus"]["statusListIndex"].as_str().unwrap();
        let idx2 = second["credentialStatus"]["statusListIndex"].as_str().unwrap();
        assert_ne!(idx1, idx2);

        let set = store
            .load_set(&SetKey {
                tenant_id: "tenant-a".into(),
                purpose: StatusPurpose::Revocation,
                list_type: StatusListType::BitstringStatusList,
            })
            .await
            .unwrap()
            .unwrap();
        let list_id = set.value.lists[0].clone();
        assert_eq!(store.pending_count(&list_id), 2);

        // Un-stubbed issuer with an expired timeout: the third issuance
        // works normally and the recovery pass reconciles the pendings.
        let recovered = issuer(&store).with_allocator_config(AllocatorConfig {
            backoff_base: Duration::from_millis(1),
            reservation_timeout: Duration::ZERO,
            ..AllocatorConfig::default()
        });
        let third = recovered
            .issue(
                "tenant-a",
                sample_credential("urn:id3"),
                RequestOptions::default(),
            )
            .await
            .unwrap();
        let idx3 = third["credentialStatus"]["statusListIndex"].as_str().unwrap();
        assert_ne!(idx3, idx1);
        assert_ne!(idx3, idx2);

        let reclaimed = recovered.recover("tenant-a").await.unwrap();
        assert_eq!(reclaimed, 0, "persisted credentials are promoted, not reclaimed");
        assert_eq!(store.pending_count(&list_id), 0);

        // Block invariants hold: three positions assigned, counts match.
        let blocks = store.blocks_of(&list_id);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].allocated_count, 3);
        assert!(blocks[0].count_consistent());
    }

    #[tokio::test]
    async fn unidentified_issuance_requires_opt_in() {
        let store = Arc::new(MemoryStore::new());
        let issuer = issuer(&store);
        let mut body = sample_credential("urn:uuid:a");
        body.as_object_mut().unwrap().remove("id");

        let mut instance = minimal_instance("tenant-a");
        issuer.instances().register(&instance).await.unwrap();
        let err = issuer
            .issue("tenant-a", body.clone(), RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ValidationError");

        instance.allow_unidentified = true;
        issuer.instances().register(&instance).await.unwrap();
        let signed = issuer
            .issue("tenant-a", body, RequestOptions::default())
            .await
            .unwrap();
        assert!(signed.get("proof").is_some());
    }

    #[tokio::test]
    async fn terse_entries_flatten_and_resolve_on_update() {
        let store = Arc::new(MemoryStore::new());
        let issuer = issuer(&store);
        let instance = instance_with_status_list(
            "tenant-a",
            StatusListType::TerseBitstringStatusList,
            &[StatusPurpose::Revocation],
            8,
            2,
            2,
        );
        let allocator = instance.status_lists[0].index_allocator.clone();
        issuer.instances().register(&instance).await.unwrap();

        let signed = issuer
            .issue(
                "tenant-a",
                sample_credential("urn:uuid:a"),
                RequestOptions::default(),
            )
            .await
            .unwrap();
        let entry = signed["credentialStatus"].clone();
        assert_eq!(entry["type"], "TerseBitstringStatusListEntry");
        assert_eq!(
            entry["terseStatusListBaseUrl"],
            "https://issuer.example/tenant-a/status-lists"
        );
        let terse = entry["terseStatusListIndex"].as_u64().unwrap();
        assert!(terse < instance.status_lists[0].max_capacity());

        // The terse index resolves back to the issuing position.
        issuer
            .update_status("tenant-a", "urn:uuid:a", &allocator, &entry, true)
            .await
            .unwrap();

        let record = store.find("tenant-a", "urn:uuid:a").await.unwrap().unwrap();
        let status_entry = &record.status_entries[0];
        let bitmap = store.read_bitmap(&status_entry.list_id).await.unwrap().value;
        assert!(bitmap.bits.get(status_entry.index as u32));
    }

    #[tokio::test]
    async fn enveloped_issuance_round_trips() {
        let store = Arc::new(MemoryStore::new());
        let issuer = issuer(&store);
        let mut instance = minimal_instance("tenant-a");
        instance.issue_options.cryptosuites.clear();
        instance.issue_options.envelope = Some(attestor_types::config::EnvelopeOptions {
            format: attestor_types::config::EnvelopeFormat::VcJwt,
            algorithm: "EdDSA".into(),
        });
        issuer.instances().register(&instance).await.unwrap();

        let signed = issuer
            .issue(
                "tenant-a",
                sample_credential("urn:uuid:a"),
                RequestOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(signed["type"], "EnvelopedVerifiableCredential");
        assert!(signed["id"]
            .as_str()
            .unwrap()
            .starts_with("data:application/jwt,"));

        // The enveloped form is what gets stored and served, and duplicate
        // detection still keys on the submitted credential's id.
        let fetched = issuer
            .get_credential("tenant-a", "urn:uuid:a")
            .await
            .unwrap();
        assert_eq!(fetched, signed);
        let err = issuer
            .issue(
                "tenant-a",
                sample_credential("urn:uuid:a"),
                RequestOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DuplicateError");
    }

    #[tokio::test]
    async fn update_status_flips_the_bit_and_slc_reflects_it() {
        let store = Arc::new(MemoryStore::new());
        let issuer = issuer(&store);
        let instance = instance_with_status_list(
            "tenant-a",
            StatusListType::BitstringStatusList,
            &[StatusPurpose::Revocation],
            8,
            2,
            1,
        );
        issuer.instances().register(&instance).await.unwrap();

        let signed = issuer
            .issue(
                "tenant-a",
                sample_credential("urn:uuid:a"),
                RequestOptions::default(),
            )
            .await
            .unwrap();
        let status = signed["credentialStatus"].clone();
        let slc_url = status["statusListCredential"].as_str().unwrap();
        let list_id = slc_url.rsplit('/').next().unwrap().to_string();
        let index: u64 = status["statusListIndex"].as_str().unwrap().parse().unwrap();

        // Wrong allocator id is rejected before any bit is touched.
        let err = issuer
            .update_status("tenant-a", "urn:uuid:a", "urn:uuid:wrong", &status, true)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ValidationError");

        let allocator = &instance.status_lists[0].index_allocator;
        issuer
            .update_status("tenant-a", "urn:uuid:a", allocator, &status, true)
            .await
            .unwrap();

        let slc = issuer
            .status_list_credential("tenant-a", &list_id, true)
            .await
            .unwrap();
        let encoded = slc["credentialSubject"]["encodedList"].as_str().unwrap();
        let bits = bitstring::decode(encoded, 16).unwrap();
        assert!(bits.get(index as u32));
    }
}
