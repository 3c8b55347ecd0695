// Path: crates/api/src/error.rs
//! Re-exports all core error types from the central `attestor-types` crate.

pub use attestor_types::error::{
    AllocationError, ErrorCode, IssuerError, SignerError, StatusClientError, StorageError,
};
