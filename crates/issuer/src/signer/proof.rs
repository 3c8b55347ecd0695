// Path: crates/issuer/src/signer/proof.rs
//! Data-integrity proof construction.
//!
//! The signing input is `sha256(jcs(proof options)) || sha256(jcs(document
//! without proof))`, signed with the instance's Ed25519 key and encoded as
//! a multibase (base58btc) proof value. RDF canonicalization is not
//! implemented; the rdfc-named suites sign the same JCS input, which is
//! sufficient for the issuance side of the service.

use super::LocalSigner;
use attestor_types::config::{Cryptosuite, CryptosuiteOptions};
use attestor_types::error::SignerError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Builds and attaches proofs for the requested suites, in order. One suite
/// yields a proof object; several yield a proof set (array).
pub fn attach_proofs(
    signer: &LocalSigner,
    body: &Value,
    suites: &[CryptosuiteOptions],
    now: DateTime<Utc>,
) -> Result<Value, SignerError> {
    if suites.is_empty() {
        return Err(SignerError::Signing(
            "no cryptosuites configured and no envelope requested".into(),
        ));
    }
    let mut proofs = Vec::with_capacity(suites.len());
    for suite in suites {
        proofs.push(build_proof(signer, body, suite, now)?);
    }

    let mut signed = body.clone();
    let obj = signed
        .as_object_mut()
        .ok_or_else(|| SignerError::Signing("credential body is not an object".into()))?;
    let proof_value = if proofs.len() == 1 {
        proofs.remove(0)
    } else {
        Value::Array(proofs)
    };
    obj.insert("proof".into(), proof_value);
    Ok(signed)
}

fn build_proof(
    signer: &LocalSigner,
    body: &Value,
    suite: &CryptosuiteOptions,
    now: DateTime<Utc>,
) -> Result<Value, SignerError> {
    let created = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut options = match suite.name {
        Cryptosuite::Ed25519Signature2020 => json!({
            "type": "Ed25519Signature2020",
            "created": created,
            "verificationMethod": signer.verification_method(),
            "proofPurpose": "assertionMethod",
        }),
        Cryptosuite::EddsaRdfc2022 | Cryptosuite::EddsaJcs2022 => json!({
            "type": "DataIntegrityProof",
            "cryptosuite": suite.name.as_str(),
            "created": created,
            "verificationMethod": signer.verification_method(),
            "proofPurpose": "assertionMethod",
        }),
        other => return Err(SignerError::UnsupportedSuite(other.as_str().into())),
    };

    let payload = signing_input(body, &options)?;
    let signature = signer.sign_bytes(&payload);
    options["proofValue"] = Value::String(format!("z{}", bs58::encode(signature).into_string()));
    Ok(options)
}

/// The canonical signing input for a document and proof options.
pub fn signing_input(body: &Value, proof_options: &Value) -> Result<Vec<u8>, SignerError> {
    let mut document = body.clone();
    if let Some(obj) = document.as_object_mut() {
        obj.remove("proof");
    }
    let canonical_options = serde_jcs::to_vec(proof_options)
        .map_err(|e| SignerError::Signing(format!("proof canonicalization failed: {}", e)))?;
    let canonical_document = serde_jcs::to_vec(&document)
        .map_err(|e| SignerError::Signing(format!("document canonicalization failed: {}", e)))?;

    let mut payload = Vec::with_capacity(64);
    payload.extend_from_slice(&Sha256::digest(&canonical_options));
    payload.extend_from_slice(&Sha256::digest(&canonical_document));
    Ok(payload)
}
