use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::inventory::{EventId, EventInventory};
use crate::repository::InventoryStore;

/// In-memory inventory store for tests and local runs without a database file
#[derive(Default)]
pub struct InMemoryInventoryStore {
    inventory: Mutex<HashMap<EventId, EventInventory>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<EventId, EventInventory>>, StoreError> {
        self.inventory
            .lock()
            .map_err(|_| StoreError::Backend("inventory map lock poisoned".into()))
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn get(&self, event_id: EventId) -> Result<EventInventory, StoreError> {
        self.lock()?
            .get(&event_id)
            .cloned()
            .ok_or(StoreError::NotFound(event_id))
    }

    async fn list(&self) -> Result<Vec<EventInventory>, StoreError> {
        let mut records: Vec<EventInventory> = self.lock()?.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.event_id.cmp(&b.event_id)));
        Ok(records)
    }

    async fn create(&self, record: &EventInventory) -> Result<(), StoreError> {
        let mut inventory = self.lock()?;
        if inventory.contains_key(&record.event_id) {
            return Err(StoreError::AlreadyExists(record.event_id));
        }
        inventory.insert(record.event_id, record.clone());
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        expected_version: u64,
        record: &EventInventory,
    ) -> Result<(), StoreError> {
        let mut inventory = self.lock()?;
        let stored = inventory
            .get_mut(&record.event_id)
            .ok_or(StoreError::NotFound(record.event_id))?;

        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                event_id: record.event_id,
                expected: expected_version,
            });
        }

        *stored = record.clone();
        Ok(())
    }

    async fn delete(&self, event_id: EventId) -> Result<(), StoreError> {
        let mut inventory = self.lock()?;
        let stored = inventory.get(&event_id).ok_or(StoreError::NotFound(event_id))?;

        if stored.sold() > 0 {
            return Err(StoreError::HasOutstandingReservations {
                event_id,
                sold: stored.sold(),
            });
        }

        inventory.remove(&event_id);
        Ok(())
    }
}
