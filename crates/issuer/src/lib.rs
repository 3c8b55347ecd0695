// Path: crates/issuer/src/lib.rs
#![forbid(unsafe_code)]

//! # Attestor Issuer
//!
//! The end-to-end issuance pipeline: input validation, duplicate detection,
//! status entry assembly through the status writers, proof/envelope
//! generation, atomic persistence, and status updates. The pipeline is the
//! only component that sees a request whole; everything it coordinates sits
//! behind the `attestor-api` interfaces.

/// Issuer instance registration and lookup.
pub mod instances;
/// The issuance and status-update pipeline.
pub mod pipeline;
/// Signing suites and the VC-JWT envelope.
pub mod signer;
/// Structural and term validation of submitted credentials.
pub mod validate;

pub use instances::InstanceRegistry;
pub use pipeline::Issuer;
pub use signer::{LocalSigner, LocalSignerProvider, SignerProvider};
