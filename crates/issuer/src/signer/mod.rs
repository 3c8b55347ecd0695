// Path: crates/issuer/src/signer/mod.rs
//! Signing suites and the VC-JWT envelope.
//!
//! [`LocalSigner`] is the in-process signer: Ed25519 over a JCS
//! canonicalization of the document, covering the EdDSA data-integrity
//! suites and the VC-JWT envelope. Deployments that delegate signing to an
//! external KMS implement [`attestor_api::signer::Signer`] against it and
//! plug in through [`SignerProvider`].

mod envelope;
mod proof;

use async_trait::async_trait;
use attestor_api::signer::Signer;
use attestor_types::config::{Cryptosuite, CryptosuiteOptions, IssueOptions, IssuerInstance};
use attestor_types::error::SignerError;
use chrono::Utc;
use dashmap::DashMap;
use ed25519_dalek::{Signer as _, SigningKey};
use serde_json::Value;
use std::sync::Arc;

/// An Ed25519 signer bound to one issuer instance's key.
pub struct LocalSigner {
    signing_key: SigningKey,
    verification_method: String,
}

impl LocalSigner {
    /// Builds a signer from an instance's hex-encoded Ed25519 seed.
    pub fn from_instance(instance: &IssuerInstance) -> Result<Self, SignerError> {
        let seed = hex::decode(&instance.signing_key_seed)
            .map_err(|e| SignerError::InvalidKey(format!("seed is not hex: {}", e)))?;
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| SignerError::InvalidKey("seed must be 32 bytes".into()))?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
            verification_method: instance.verification_method.clone(),
        })
    }

    /// The verification method referenced by generated proofs.
    pub fn verification_method(&self) -> &str {
        &self.verification_method
    }

    /// The public key, for verification in tests.
    pub fn verifying_key(&self) -> ed25519_dalek::VerifyingKey {
        self.signing_key.verifying_key()
    }

    fn sign_bytes(&self, payload: &[u8]) -> Vec<u8> {
        self.signing_key.sign(payload).to_bytes().to_vec()
    }
}

#[async_trait]
impl Signer for LocalSigner {
    async fn sign_credential(
        &self,
        body: &Value,
        options: &IssueOptions,
    ) -> Result<Value, SignerError> {
        if let Some(envelope) = &options.envelope {
            return envelope::vc_jwt(self, body, envelope);
        }
        proof::attach_proofs(self, body, &options.cryptosuites, Utc::now())
    }

    async fn sign_status_list(&self, body: &Value) -> Result<Value, SignerError> {
        let suite = CryptosuiteOptions {
            name: Cryptosuite::EddsaJcs2022,
            mandatory_pointers: vec![],
        };
        proof::attach_proofs(self, body, std::slice::from_ref(&suite), Utc::now())
    }
}

/// Resolves the signer for an instance.
pub trait SignerProvider: Send + Sync {
    /// Returns the signer bound to this instance's key material.
    fn signer_for(&self, instance: &IssuerInstance) -> Result<Arc<dyn Signer>, SignerError>;
}

/// Caches one [`LocalSigner`] per instance.
#[derive(Default)]
pub struct LocalSignerProvider {
    cache: DashMap<String, Arc<LocalSigner>>,
}

impl LocalSignerProvider {
    /// An empty provider.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignerProvider for LocalSignerProvider {
    fn signer_for(&self, instance: &IssuerInstance) -> Result<Arc<dyn Signer>, SignerError> {
        if let Some(signer) = self.cache.get(&instance.id) {
            return Ok(signer.clone() as Arc<dyn Signer>);
        }
        let signer = Arc::new(LocalSigner::from_instance(instance)?);
        self.cache.insert(instance.id.clone(), signer.clone());
        Ok(signer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attestor_test_utils::{minimal_instance, sample_credential};
    use attestor_types::config::{EnvelopeFormat, EnvelopeOptions};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    use ed25519_dalek::Verifier as _;

    fn signer() -> LocalSigner {
        LocalSigner::from_instance(&minimal_instance("tenant-a")).unwrap()
    }

    #[tokio::test]
    async fn single_suite_attaches_a_proof_object() {
        let s = signer();
        let options = minimal_instance("tenant-a").issue_options;
        let signed = s
            .sign_credential(&sample_credential("urn:uuid:a"), &options)
            .await
            .unwrap();
        let proof = &signed["proof"];
        assert_eq!(proof["type"], "Ed25519Signature2020");
        assert_eq!(proof["proofPurpose"], "assertionMethod");
        assert!(proof["proofValue"].as_str().unwrap().starts_with('z'));
        // Everything but the proof is untouched.
        let mut stripped = signed.clone();
        stripped.as_object_mut().unwrap().remove("proof");
        assert_eq!(stripped, sample_credential("urn:uuid:a"));
    }

    #[tokio::test]
    async fn proof_signature_verifies() {
        let s = signer();
        let body = sample_credential("urn:uuid:a");
        let suite = CryptosuiteOptions {
            name: Cryptosuite::EddsaJcs2022,
            mandatory_pointers: vec![],
        };
        let signed = proof::attach_proofs(&s, &body, &[suite], Utc::now()).unwrap();

        let proof = signed["proof"].clone();
        let proof_value = proof["proofValue"].as_str().unwrap();
        let signature = bs58::decode(&proof_value[1..]).into_vec().unwrap();
        let signature = ed25519_dalek::Signature::from_slice(&signature).unwrap();

        let mut options = proof.clone();
        options.as_object_mut().unwrap().remove("proofValue");
        let payload = proof::signing_input(&body, &options).unwrap();
        s.verifying_key().verify(&payload, &signature).unwrap();
    }

    #[tokio::test]
    async fn two_suites_attach_a_proof_set() {
        let s = signer();
        let mut options = minimal_instance("tenant-a").issue_options;
        options.cryptosuites.push(CryptosuiteOptions {
            name: Cryptosuite::EddsaRdfc2022,
            mandatory_pointers: vec![],
        });
        let signed = s
            .sign_credential(&sample_credential("urn:uuid:a"), &options)
            .await
            .unwrap();
        let proofs = signed["proof"].as_array().unwrap();
        assert_eq!(proofs.len(), 2);
        assert_eq!(proofs[1]["type"], "DataIntegrityProof");
        assert_eq!(proofs[1]["cryptosuite"], "eddsa-rdfc-2022");
    }

    #[tokio::test]
    async fn unsupported_suite_is_rejected() {
        let s = signer();
        let mut options = minimal_instance("tenant-a").issue_options;
        options.cryptosuites[0].name = Cryptosuite::Bbs2023;
        let err = s
            .sign_credential(&sample_credential("urn:uuid:a"), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, SignerError::UnsupportedSuite(_)));
    }

    #[tokio::test]
    async fn envelope_wraps_the_credential_in_a_jwt() {
        let s = signer();
        let options = IssueOptions {
            cryptosuites: vec![],
            envelope: Some(EnvelopeOptions {
                format: EnvelopeFormat::VcJwt,
                algorithm: "EdDSA".into(),
            }),
        };
        let body = sample_credential("urn:uuid:a");
        let signed = s.sign_credential(&body, &options).await.unwrap();

        assert_eq!(signed["type"], "EnvelopedVerifiableCredential");
        let id = signed["id"].as_str().unwrap();
        let jwt = id.strip_prefix("data:application/jwt,").unwrap();
        let parts: Vec<&str> = jwt.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header: Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "EdDSA");
        let payload: Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(payload, body);
    }
}
