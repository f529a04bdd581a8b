use std::sync::Arc;
use tracing::info;

use crate::engine::{ReservationEngine, RetryPolicy};
use crate::error::{InventoryError, InventoryResult};
use crate::inventory::{EventId, EventInventory};
use crate::repository::InventoryStore;

/// Operations offered to the admin, client and booking-assistant surfaces.
///
/// Counts flow only through the reservation engine; creation and removal go
/// straight to the store.
#[derive(Clone)]
pub struct InventoryService {
    engine: ReservationEngine,
}

impl InventoryService {
    pub fn new(store: Arc<dyn InventoryStore>, policy: RetryPolicy) -> Self {
        Self {
            engine: ReservationEngine::new(store, policy),
        }
    }

    pub fn engine(&self) -> &ReservationEngine {
        &self.engine
    }

    fn store(&self) -> &Arc<dyn InventoryStore> {
        self.engine.store()
    }

    pub async fn create_event(&self, event_id: EventId, total_capacity: u32) -> InventoryResult<EventInventory> {
        let record = EventInventory::new(event_id, total_capacity);
        self.store().create(&record).await?;
        info!(%event_id, total_capacity, "Event inventory created");
        Ok(record)
    }

    pub async fn remove_event(&self, event_id: EventId) -> InventoryResult<()> {
        self.store().delete(event_id).await?;
        info!(%event_id, "Event inventory removed");
        Ok(())
    }

    pub async fn get(&self, event_id: EventId) -> InventoryResult<EventInventory> {
        Ok(self.store().get(event_id).await?)
    }

    pub async fn list(&self) -> InventoryResult<Vec<EventInventory>> {
        Ok(self.store().list().await?)
    }

    pub async fn purchase(&self, event_id: EventId, quantity: u32) -> InventoryResult<EventInventory> {
        validate_quantity(quantity)?;
        let record = self.engine.purchase(event_id, quantity).await?;
        info!(%event_id, quantity, available = record.available, "Tickets purchased");
        Ok(record)
    }

    pub async fn refund(&self, event_id: EventId, quantity: u32) -> InventoryResult<EventInventory> {
        validate_quantity(quantity)?;
        let record = self.engine.refund(event_id, quantity).await?;
        info!(%event_id, quantity, available = record.available, "Tickets refunded");
        Ok(record)
    }

    /// Admin-only capacity change. Callers are responsible for authorization.
    pub async fn resize(&self, event_id: EventId, total_capacity: u32) -> InventoryResult<EventInventory> {
        let record = self.engine.resize(event_id, total_capacity).await?;
        info!(%event_id, total_capacity, available = record.available, "Event capacity resized");
        Ok(record)
    }
}

fn validate_quantity(quantity: u32) -> InventoryResult<()> {
    if quantity == 0 {
        return Err(InventoryError::InvalidQuantity);
    }
    Ok(())
}
