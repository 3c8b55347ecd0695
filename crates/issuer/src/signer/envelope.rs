// Path: crates/issuer/src/signer/envelope.rs
//! The VC-JWT envelope.
//!
//! The credential claims become the JWT payload, signed EdDSA, and the
//! result is wrapped as an `EnvelopedVerifiableCredential` whose id is a
//! `data:application/jwt,` URL.

use super::LocalSigner;
use attestor_types::config::EnvelopeOptions;
use attestor_types::error::SignerError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::{json, Value};

const VC_V2_CONTEXT: &str = "https://www.w3.org/ns/credentials/v2";

/// Envelopes a credential as a VC-JWT.
pub fn vc_jwt(
    signer: &LocalSigner,
    body: &Value,
    options: &EnvelopeOptions,
) -> Result<Value, SignerError> {
    if options.algorithm != "EdDSA" {
        return Err(SignerError::UnsupportedSuite(format!(
            "envelope algorithm '{}'",
            options.algorithm
        )));
    }

    let header = json!({
        "alg": "EdDSA",
        "typ": "vc+jwt",
        "kid": signer.verification_method(),
    });
    let header_b64 = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(&header)
            .map_err(|e| SignerError::Signing(format!("header encode failed: {}", e)))?,
    );
    let payload_b64 = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(body)
            .map_err(|e| SignerError::Signing(format!("payload encode failed: {}", e)))?,
    );

    let signing_input = format!("{}.{}", header_b64, payload_b64);
    let signature = signer.sign_bytes(signing_input.as_bytes());
    let jwt = format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature));

    Ok(json!({
        "@context": VC_V2_CONTEXT,
        "id": format!("data:application/jwt,{}", jwt),
        "type": "EnvelopedVerifiableCredential",
    }))
}
