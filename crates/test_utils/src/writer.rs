// Path: crates/test_utils/src/writer.rs
//! Writer decorators that simulate crash windows.

use async_trait::async_trait;
use attestor_api::writer::{StatusWriter, WriterDecorator};
use attestor_types::error::AllocationError;
use attestor_types::status::Reservation;
use serde_json::Value;
use std::sync::Arc;

/// Makes `finish` a no-op, simulating a crash after the credential became
/// durable but before reservation bookkeeping completed. Allocations and
/// cancellations pass through untouched.
pub struct NoFinishWriter(pub Arc<dyn StatusWriter>);

#[async_trait]
impl StatusWriter for NoFinishWriter {
    async fn write(&self, body: &mut Value) -> Result<Reservation, AllocationError> {
        self.0.write(body).await
    }

    async fn finish(&self, _reservation: &Reservation) -> Result<(), AllocationError> {
        Ok(())
    }

    async fn cancel(&self, reservation: &Reservation) -> Result<(), AllocationError> {
        self.0.cancel(reservation).await
    }
}

/// Decorates every writer with [`NoFinishWriter`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFinishDecorator;

impl WriterDecorator for NoFinishDecorator {
    fn decorate(&self, writer: Arc<dyn StatusWriter>) -> Arc<dyn StatusWriter> {
        Arc::new(NoFinishWriter(writer))
    }
}
