// Path: crates/api/src/writer.rs
//! The status-writer seam between issuance and allocation.
//!
//! One writer instance exists per configured status purpose per issuance.
//! The pipeline drives the three-phase protocol through this trait rather
//! than a concrete type so tests can substitute implementations — notably a
//! finish-is-a-no-op writer that simulates a crash between credential
//! persistence and reservation finalization.

use async_trait::async_trait;
use attestor_types::error::AllocationError;
use attestor_types::status::Reservation;
use serde_json::Value;
use std::sync::Arc;

/// The two-phase (plus cancel) status allocation protocol.
#[async_trait]
pub trait StatusWriter: Send + Sync {
    /// Allocates a status position and embeds the corresponding status
    /// entry into the credential body under construction. The returned
    /// reservation is held by the caller until `finish` or `cancel`.
    async fn write(&self, body: &mut Value) -> Result<Reservation, AllocationError>;

    /// Finalizes bookkeeping after the credential was durably persisted.
    /// Idempotent: finishing an already-finished reservation is a no-op.
    async fn finish(&self, reservation: &Reservation) -> Result<(), AllocationError>;

    /// Releases the reserved position after a definite failure that left no
    /// observable side effect of issuance. Idempotent.
    async fn cancel(&self, reservation: &Reservation) -> Result<(), AllocationError>;
}

/// Wraps the writers the pipeline constructs, so tests can intercept
/// individual protocol phases without touching the pipeline itself.
pub trait WriterDecorator: Send + Sync {
    /// Returns the writer to use in place of `writer`.
    fn decorate(&self, writer: Arc<dyn StatusWriter>) -> Arc<dyn StatusWriter>;
}

/// The production decorator: writers are used as constructed.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityDecorator;

impl WriterDecorator for IdentityDecorator {
    fn decorate(&self, writer: Arc<dyn StatusWriter>) -> Arc<dyn StatusWriter> {
        writer
    }
}
