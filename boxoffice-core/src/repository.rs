use async_trait::async_trait;

use crate::error::StoreError;
use crate::inventory::{EventId, EventInventory};

/// Durable storage for event inventory records.
///
/// `compare_and_swap` is the only way a stored record changes. Implementations
/// must make it a single atomic write that succeeds only while the stored
/// version still equals `expected_version`.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn get(&self, event_id: EventId) -> Result<EventInventory, StoreError>;

    /// All records, oldest first
    async fn list(&self) -> Result<Vec<EventInventory>, StoreError>;

    async fn create(&self, record: &EventInventory) -> Result<(), StoreError>;

    async fn compare_and_swap(
        &self,
        expected_version: u64,
        record: &EventInventory,
    ) -> Result<(), StoreError>;

    /// Fails with `HasOutstandingReservations` while any ticket is sold
    async fn delete(&self, event_id: EventId) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
