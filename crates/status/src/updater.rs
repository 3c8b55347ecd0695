// Path: crates/status/src/updater.rs
//! Bit flips and lazy SLC regeneration.

use crate::bitstring;
use crate::entry::slc_url;
use crate::slc;
use async_trait::async_trait;
use attestor_api::signer::Signer;
use attestor_api::status_client::StatusClient;
use attestor_api::store::StatusListStore;
use attestor_types::config::{StatusListType, StatusPurpose};
use attestor_types::error::{IssuerError, StatusClientError, StorageError};
use attestor_types::status::StoredSlc;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

const MAX_CAS_ATTEMPTS: u32 = 8;

/// Applies status changes to list bitmaps and republishes status list
/// credentials lazily.
///
/// An SLC is stale once its `built_sequence` falls behind the bitmap's
/// sequence; regeneration is triggered by a reader (or an explicit
/// `refresh=true`) rather than by the update itself. Concurrent
/// regenerators converge: whoever wins the CAS write publishes, the loser
/// re-reads and serves the winner's document.
#[derive(Clone)]
pub struct StatusUpdater {
    store: Arc<dyn StatusListStore>,
    signer: Arc<dyn Signer>,
    client: Arc<dyn StatusClient>,
}

impl StatusUpdater {
    /// Builds an updater over the given store and collaborators.
    pub fn new(
        store: Arc<dyn StatusListStore>,
        signer: Arc<dyn Signer>,
        client: Arc<dyn StatusClient>,
    ) -> Self {
        Self {
            store,
            signer,
            client,
        }
    }

    /// Writes one status bit. Writing the already-stored value is a no-op
    /// and does not invalidate the published SLC.
    pub async fn set_status(
        &self,
        list_id: &str,
        index: u64,
        value: bool,
    ) -> Result<(), IssuerError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let versioned = self.store.read_bitmap(list_id).await?;
            let mut bitmap = versioned.value;
            if index >= bitmap.bits.len() as u64 {
                return Err(IssuerError::NotFound(format!(
                    "status position {} out of range for list {}",
                    index, list_id
                )));
            }
            if bitmap.bits.get(index as u32) == value {
                return Ok(());
            }
            bitmap.bits.assign(index as u32, value);
            match self.store.write_bitmap(versioned.sequence, &bitmap).await {
                Ok(_) => {
                    tracing::info!(
                        target: "status-updater",
                        list_id,
                        index,
                        value,
                        "status bit updated"
                    );
                    return Ok(());
                }
                Err(StorageError::Conflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(IssuerError::Internal(
            "status update lost every CAS attempt".into(),
        ))
    }

    /// Reads one status bit.
    pub async fn get_status(&self, list_id: &str, index: u64) -> Result<bool, IssuerError> {
        let bitmap = self.store.read_bitmap(list_id).await?.value;
        if index >= bitmap.bits.len() as u64 {
            return Err(IssuerError::NotFound(format!(
                "status position {} out of range for list {}",
                index, list_id
            )));
        }
        Ok(bitmap.bits.get(index as u32))
    }

    /// Returns the signed SLC for a list, regenerating it when stale or
    /// when the caller explicitly asks for a refresh.
    pub async fn status_list_credential(
        &self,
        issuer: &str,
        list_type: StatusListType,
        purpose: StatusPurpose,
        base_url: &str,
        list_id: &str,
        refresh: bool,
    ) -> Result<Value, IssuerError> {
        let bitmap = self.store.read_bitmap(list_id).await?;
        let stored = self.store.read_slc(list_id).await?;

        if !refresh {
            if let Some(slc) = &stored {
                if slc.value.built_sequence >= bitmap.sequence {
                    return Ok(slc.value.document.clone());
                }
            }
        }

        let encoded = bitstring::encode(&bitmap.value.bits).map_err(IssuerError::Internal)?;
        let url = slc_url(base_url, list_id);
        let body = slc::build_document(issuer, list_type, purpose, &url, &encoded, Utc::now());
        let signed = self.signer.sign_status_list(&body).await?;

        let record = StoredSlc {
            document: signed.clone(),
            built_sequence: bitmap.sequence,
        };
        let expect = stored.as_ref().map(|v| v.sequence);
        match self.store.write_slc(list_id, expect, &record).await {
            Ok(_) => {
                if let Err(e) = self.client.publish(list_id, &signed).await {
                    // The document is durable locally; publication retries
                    // on the next refresh.
                    tracing::warn!(
                        target: "status-updater",
                        list_id,
                        error = %e,
                        "SLC publication failed"
                    );
                }
                Ok(signed)
            }
            Err(StorageError::Conflict { .. }) => {
                // A concurrent regenerator won; serve its document.
                match self.store.read_slc(list_id).await? {
                    Some(winner) => Ok(winner.value.document.clone()),
                    None => Ok(signed),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// The self-hosted publication client: the gateway serves SLCs straight
/// from the store, so publication needs no extra work.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStatusClient;

#[async_trait]
impl StatusClient for LocalStatusClient {
    async fn publish(&self, _list_id: &str, _document: &Value) -> Result<(), StatusClientError> {
        Ok(())
    }
}
