// Path: crates/telemetry/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # Attestor Telemetry
//!
//! Observability infrastructure for the issuer service: structured logging
//! initialization and a lightweight operational HTTP server exposing
//! `/metrics`, `/healthz`, and `/readyz` separately from the public
//! gateway port.

/// A lightweight HTTP server for exposing `/metrics`, `/healthz`, and
/// `/readyz` endpoints.
pub mod http;
/// The initialization routine for global structured logging.
pub mod init;
