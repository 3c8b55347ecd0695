// Path: crates/api/src/signer.rs
//! The signer capability the pipeline requests signed artifacts from.
//!
//! The issuance core never interprets proof internals. A signer receives the
//! fully assembled credential body and returns the signed representation,
//! which the pipeline persists and serves byte-for-byte: an embedded
//! data-integrity proof, a proof set, or an enveloped form
//! (`EnvelopedVerifiableCredential` wrapping a JWT).

use async_trait::async_trait;
use attestor_types::config::IssueOptions;
use attestor_types::error::SignerError;
use serde_json::Value;

/// A capability that produces signed credentials and status list
/// credentials on behalf of one issuer instance.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Signs an assembled credential body according to the instance's issue
    /// options. The returned document is the caller-visible signed
    /// representation.
    async fn sign_credential(
        &self,
        body: &Value,
        options: &IssueOptions,
    ) -> Result<Value, SignerError>;

    /// Signs a status list credential. SLCs always carry an embedded proof
    /// so verifiers can fetch and check them without envelope handling.
    async fn sign_status_list(&self, body: &Value) -> Result<Value, SignerError>;
}
