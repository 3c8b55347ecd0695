// Path: crates/api/src/status_client.rs
//! The status publication client interface.
//!
//! The updater regenerates status list credentials and hands them to a
//! `StatusClient` for publication. Deployments backed by an external status
//! service implement this against that service's API; the default
//! implementation stores the document locally so the gateway can serve it.

use async_trait::async_trait;
use attestor_types::error::StatusClientError;
use serde_json::Value;

/// Publishes refreshed status list credentials.
#[async_trait]
pub trait StatusClient: Send + Sync {
    /// Publishes a freshly signed SLC for the given list.
    async fn publish(&self, list_id: &str, document: &Value) -> Result<(), StatusClientError>;
}
