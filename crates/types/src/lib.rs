// Path: crates/types/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Attestor Types
//!
//! This crate is the foundational library for the Attestor issuer service,
//! containing all core data structures, error types, and configuration
//! objects.
//!
//! ## Architectural Role
//!
//! As the base crate, `attestor-types` has minimal dependencies and is itself
//! a dependency for almost every other crate in the workspace. This structure
//! prevents circular dependencies and provides a stable, canonical definition
//! for shared types like `IssuerInstance`, `ListRecord`, `CredentialRecord`,
//! and the error enums surfaced through the HTTP API.

/// The maximum accepted size in bytes for a credential body submitted for
/// issuance.
pub const MAX_CREDENTIAL_BYTES: usize = 256 * 1024; // 256 KiB
/// The maximum accepted size in bytes for a tenant-registered JSON-LD
/// context document.
pub const MAX_CONTEXT_BYTES: usize = 512 * 1024; // 512 KiB

/// A top-level, crate-wide `Result` type alias with a default error type.
pub type Result<T, E = crate::error::IssuerError> = std::result::Result<T, E>;

/// A compact, MSB-first bitset used for block and status-list bitmaps.
pub mod bitmap;
/// The canonical binary codec for records persisted by the storage layer.
pub mod codec;
/// Tenant (issuer instance) configuration structures.
pub mod config;
/// Issued-credential records and per-request issuance options.
pub mod credential;
/// A unified set of all error types used across the workspace.
pub mod error;
/// Constants for well-known storage table names and key prefixes.
pub mod keys;
/// Status-list set, list, block, and reservation records.
pub mod status;
