// Path: crates/status/src/writer.rs
//! The per-purpose status writer driven by the issuance pipeline.

use crate::entry;
use crate::manager::ListManager;
use async_trait::async_trait;
use attestor_api::writer::StatusWriter;
use attestor_types::config::{StatusListOptions, StatusPurpose};
use attestor_types::error::AllocationError;
use attestor_types::status::Reservation;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Binds one status purpose of one issuance to an allocated position.
///
/// `write` allocates and embeds the entry; `finish` runs after the
/// credential is durable; `cancel` runs on definite pre-persistence
/// failure. Instances are cheap and constructed per request.
pub struct CredentialStatusWriter {
    manager: Arc<ListManager>,
    tenant_id: String,
    options: StatusListOptions,
    purpose: StatusPurpose,
    /// The instance's status-list base URL
    /// (`{public_base}/{configId}/status-lists`).
    base_url: String,
    /// Varies per request to spread concurrent writers across blocks.
    nonce: String,
}

impl CredentialStatusWriter {
    /// Builds a writer for one purpose of one issuance.
    pub fn new(
        manager: Arc<ListManager>,
        tenant_id: impl Into<String>,
        options: StatusListOptions,
        purpose: StatusPurpose,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            manager,
            tenant_id: tenant_id.into(),
            options,
            purpose,
            base_url: base_url.into(),
            nonce: Uuid::new_v4().to_string(),
        }
    }

    /// The purpose this writer allocates for.
    pub fn purpose(&self) -> StatusPurpose {
        self.purpose
    }
}

#[async_trait]
impl StatusWriter for CredentialStatusWriter {
    async fn write(&self, body: &mut Value) -> Result<Reservation, AllocationError> {
        let reservation = self
            .manager
            .allocate(&self.tenant_id, &self.options, self.purpose, &self.nonce)
            .await?;
        let entry = entry::build(&self.options, &self.base_url, &reservation);
        entry::attach(body, entry, self.options.list_type);
        Ok(reservation)
    }

    async fn finish(&self, reservation: &Reservation) -> Result<(), AllocationError> {
        self.manager.finalize(reservation).await
    }

    async fn cancel(&self, reservation: &Reservation) -> Result<(), AllocationError> {
        self.manager.abandon(reservation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::AllocatorConfig;
    use attestor_api::random::RandomSource;
    use attestor_test_utils::{FixedRandom, MemoryStore};
    use attestor_types::config::StatusListType;
    use std::time::Duration;

    fn writer(store: &Arc<MemoryStore>) -> CredentialStatusWriter {
        let manager = Arc::new(ListManager::new(
            store.clone(),
            store.clone(),
            Arc::new(FixedRandom(0)) as Arc<dyn RandomSource>,
            AllocatorConfig {
                backoff_base: Duration::from_millis(1),
                ..AllocatorConfig::default()
            },
        ));
        CredentialStatusWriter::new(
            manager,
            "tenant-a",
            StatusListOptions {
                list_type: StatusListType::BitstringStatusList,
                purposes: vec![StatusPurpose::Revocation],
                block_size: 8,
                block_count: 2,
                list_count: 1,
                index_allocator: "urn:uuid:alloc".into(),
            },
            StatusPurpose::Revocation,
            "https://issuer.example/tenant-a/status-lists",
        )
    }

    #[tokio::test]
    async fn write_embeds_entry_and_finish_clears_pending() {
        let store = Arc::new(MemoryStore::new());
        let w = writer(&store);
        let mut body = serde_json::json!({
            "@context": ["https://www.w3.org/ns/credentials/v2"],
            "type": ["VerifiableCredential"],
        });
        let reservation = w.write(&mut body).await.unwrap();

        let status = &body["credentialStatus"];
        assert_eq!(status["type"], "BitstringStatusListEntry");
        assert_eq!(
            status["statusListIndex"],
            reservation.index.to_string().as_str()
        );
        assert_eq!(store.pending_count(&reservation.list_id), 1);

        w.finish(&reservation).await.unwrap();
        w.finish(&reservation).await.unwrap();
        assert_eq!(store.pending_count(&reservation.list_id), 0);
    }

    #[tokio::test]
    async fn cancel_releases_the_position() {
        let store = Arc::new(MemoryStore::new());
        let w = writer(&store);
        let mut body = serde_json::json!({
            "@context": ["https://www.w3.org/ns/credentials/v2"],
        });
        let reservation = w.write(&mut body).await.unwrap();
        w.cancel(&reservation).await.unwrap();

        let blocks = store.blocks_of(&reservation.list_id);
        assert!(blocks.iter().all(|b| b.allocated_count == 0 && b.pending.is_empty()));
    }
}
