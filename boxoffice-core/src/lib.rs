pub mod error;
pub mod inventory;
pub mod repository;
pub mod memory;
pub mod engine;
pub mod service;

pub use engine::{ReservationEngine, RetryPolicy};
pub use error::{InventoryError, InventoryResult, StoreError};
pub use inventory::{
    Adjustment, EventId, EventInventory, InventoryChanged, Reservation, ReservationKind, ReservationOutcome,
};
pub use memory::InMemoryInventoryStore;
pub use repository::InventoryStore;
pub use service::InventoryService;
