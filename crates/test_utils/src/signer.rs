// Path: crates/test_utils/src/signer.rs
//! A signer that attaches a static marker proof (no cryptography).

use async_trait::async_trait;
use attestor_api::signer::Signer;
use attestor_types::config::IssueOptions;
use attestor_types::error::SignerError;
use serde_json::{json, Value};

/// Attaches a recognizable fake proof so pipeline tests can assert the
/// signed representation is preserved without pulling in key material.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticSigner;

#[async_trait]
impl Signer for StaticSigner {
    async fn sign_credential(
        &self,
        body: &Value,
        _options: &IssueOptions,
    ) -> Result<Value, SignerError> {
        let mut signed = body.clone();
        let obj = signed
            .as_object_mut()
            .ok_or_else(|| SignerError::Signing("credential body is not an object".into()))?;
        obj.insert(
            "proof".into(),
            json!({
                "type": "DataIntegrityProof",
                "cryptosuite": "test-static-2024",
                "proofPurpose": "assertionMethod",
                "proofValue": "ztest",
            }),
        );
        Ok(signed)
    }

    async fn sign_status_list(&self, body: &Value) -> Result<Value, SignerError> {
        self.sign_credential(body, &IssueOptions {
            cryptosuites: vec![],
            envelope: None,
        })
        .await
    }
}
