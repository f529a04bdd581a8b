use crate::inventory::EventId;

/// Failures reported by an `InventoryStore` implementation
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Event not found: {0}")]
    NotFound(EventId),

    #[error("Event already exists: {0}")]
    AlreadyExists(EventId),

    /// Another writer committed first; the expected version is stale
    #[error("Version conflict on event {event_id}: expected version {expected}")]
    VersionConflict { event_id: EventId, expected: u64 },

    #[error("Event {event_id} has {sold} tickets sold")]
    HasOutstandingReservations { event_id: EventId, sold: u32 },

    #[error("Storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }
}

/// Errors surfaced by the inventory operations
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    #[error("Insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory {
        event_id: EventId,
        requested: u32,
        available: u32,
    },

    #[error("Refund of {requested} exceeds capacity: available {available}, total capacity {total_capacity}")]
    RefundExceedsCapacity {
        event_id: EventId,
        requested: u32,
        available: u32,
        total_capacity: u32,
    },

    #[error("Capacity {requested} is below sold count {sold}")]
    CapacityBelowSold {
        event_id: EventId,
        requested: u32,
        sold: u32,
    },

    #[error("Event already exists: {0}")]
    AlreadyExists(EventId),

    #[error("Event {event_id} has {sold} tickets sold and cannot be removed")]
    HasOutstandingReservations { event_id: EventId, sold: u32 },

    /// Retries exhausted while other writers kept committing. Safe to retry later.
    #[error("Too much contention on event {event_id}, gave up after {attempts} attempts")]
    Contention { event_id: EventId, attempts: u32 },

    #[error("Quantity must be a positive integer")]
    InvalidQuantity,

    #[error("Storage error: {0}")]
    Storage(#[source] StoreError),
}

impl InventoryError {
    /// Current availability when the error carries it
    pub fn available(&self) -> Option<u32> {
        match self {
            InventoryError::InsufficientInventory { available, .. }
            | InventoryError::RefundExceedsCapacity { available, .. } => Some(*available),
            _ => None,
        }
    }

    /// Business rejections are final; retrying the same request cannot succeed
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            InventoryError::InsufficientInventory { .. }
                | InventoryError::RefundExceedsCapacity { .. }
                | InventoryError::CapacityBelowSold { .. }
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, InventoryError::Contention { .. })
    }
}

impl From<StoreError> for InventoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => InventoryError::EventNotFound(id),
            StoreError::AlreadyExists(id) => InventoryError::AlreadyExists(id),
            StoreError::HasOutstandingReservations { event_id, sold } => {
                InventoryError::HasOutstandingReservations { event_id, sold }
            }
            StoreError::VersionConflict { event_id, .. } => InventoryError::Contention { event_id, attempts: 1 },
            other @ StoreError::Backend(_) => InventoryError::Storage(other),
        }
    }
}

pub type InventoryResult<T> = Result<T, InventoryError>;
