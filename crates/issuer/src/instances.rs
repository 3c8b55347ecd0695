// Path: crates/issuer/src/instances.rs
//! Issuer instance registration and lookup.

use attestor_api::store::InstanceStore;
use attestor_types::config::IssuerInstance;
use attestor_types::error::IssuerError;
use attestor_types::MAX_CONTEXT_BYTES;
use serde_json::Value;
use std::sync::Arc;

/// Loads and registers issuer instances and their context documents.
#[derive(Clone)]
pub struct InstanceRegistry {
    store: Arc<dyn InstanceStore>,
}

impl InstanceRegistry {
    /// Builds a registry over the given store.
    pub fn new(store: Arc<dyn InstanceStore>) -> Self {
        Self { store }
    }

    /// Registers (or replaces) an instance after structural validation.
    pub async fn register(&self, instance: &IssuerInstance) -> Result<(), IssuerError> {
        instance
            .validate()
            .map_err(|e| IssuerError::validation(e, vec![]))?;
        self.store.put_instance(instance).await?;
        tracing::info!(target: "issuer", instance = %instance.id, "issuer instance registered");
        Ok(())
    }

    /// Resolves a request's instance; unknown ids are `NotFoundError`.
    pub async fn get(&self, config_id: &str) -> Result<IssuerInstance, IssuerError> {
        self.store
            .get_instance(config_id)
            .await?
            .ok_or_else(|| IssuerError::NotFound(format!("unknown issuer instance '{}'", config_id)))
    }

    /// Registers a JSON-LD context document for a tenant. The document must
    /// carry an `@context` member; its term names feed credential
    /// validation.
    pub async fn add_context(
        &self,
        config_id: &str,
        id: &str,
        document: &Value,
    ) -> Result<(), IssuerError> {
        self.get(config_id).await?;
        if id.is_empty() {
            return Err(IssuerError::validation(
                "context id must be non-empty",
                vec!["id".into()],
            ));
        }
        if document.get("@context").is_none() {
            return Err(IssuerError::Data(
                "context document has no @context member".into(),
            ));
        }
        let size = serde_json::to_vec(document).map(|b| b.len()).unwrap_or(0);
        if size > MAX_CONTEXT_BYTES {
            return Err(IssuerError::validation(
                "context document exceeds the size limit",
                vec!["context".into()],
            ));
        }
        self.store.put_context(config_id, id, document).await?;
        Ok(())
    }

    /// The tenant's registered context documents.
    pub async fn contexts(&self, config_id: &str) -> Result<Vec<(String, Value)>, IssuerError> {
        Ok(self.store.contexts(config_id).await?)
    }
}
