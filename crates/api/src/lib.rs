// Path: crates/api/src/lib.rs

//! # Attestor API Crate Lints
//!
//! This crate enforces a strict set of lints to ensure high-quality,
//! panic-free, and well-documented code. Panics are disallowed in non-test
//! code to promote robust error handling.
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::todo,
        clippy::unimplemented,
        clippy::indexing_slicing
    )
)]
//! # Attestor API
//!
//! Core traits and interfaces for the Attestor issuer service. This crate
//! defines the stable contract between the allocation core, the persistence
//! substrate, and the external collaborators (signer, status publication,
//! randomness). Every cross-process coordination point in the system goes
//! through one of these interfaces.

/// Re-exports all core error types from the central `attestor-types` crate.
pub mod error;
/// The injected randomness seam used by block selection.
pub mod random;
/// The signer capability the pipeline requests signed artifacts from.
pub mod signer;
/// The status publication client interface.
pub mod status_client;
/// Persistence contracts: versioned status-list storage and the credential
/// store.
pub mod store;
/// The status-writer seam between issuance and allocation.
pub mod writer;

/// A curated set of the most commonly used traits and types.
pub mod prelude {
    pub use crate::error::{
        AllocationError, ErrorCode, IssuerError, SignerError, StatusClientError, StorageError,
    };
    pub use crate::random::RandomSource;
    pub use crate::signer::Signer;
    pub use crate::status_client::StatusClient;
    pub use crate::store::{CredentialStore, InstanceStore, StatusListStore, Versioned};
    pub use crate::writer::StatusWriter;
}
