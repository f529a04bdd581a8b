use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::InventoryError;

/// Identifier of a sellable event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for EventId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for EventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Ticket inventory for one event.
///
/// `available` never exceeds `total_capacity`; `version` grows by one on every
/// committed mutation and is what compare-and-swap writes are checked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInventory {
    pub event_id: EventId,
    pub total_capacity: u32,
    pub available: u32,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventInventory {
    /// A freshly published event has every ticket available
    pub fn new(event_id: EventId, total_capacity: u32) -> Self {
        let now = Utc::now();
        Self {
            event_id,
            total_capacity,
            available: total_capacity,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn sold(&self) -> u32 {
        self.total_capacity - self.available
    }

    pub fn is_sold_out(&self) -> bool {
        self.available == 0
    }

    /// Share of capacity already sold, 0.0 for a zero-capacity event
    pub fn utilization(&self) -> f64 {
        if self.total_capacity == 0 {
            0.0
        } else {
            self.sold() as f64 / self.total_capacity as f64
        }
    }

    /// Next version of this record with new counts
    fn successor(&self, total_capacity: u32, available: u32) -> Self {
        Self {
            total_capacity,
            available,
            version: self.version + 1,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Remove `quantity` tickets from sale
    pub fn purchased(&self, quantity: u32) -> Result<Self, InventoryError> {
        if self.available < quantity {
            return Err(InventoryError::InsufficientInventory {
                event_id: self.event_id,
                requested: quantity,
                available: self.available,
            });
        }
        Ok(self.successor(self.total_capacity, self.available - quantity))
    }

    /// Return `quantity` tickets to sale. Overshooting capacity is an error, not a clamp.
    pub fn refunded(&self, quantity: u32) -> Result<Self, InventoryError> {
        let restored = self.available.checked_add(quantity).filter(|n| *n <= self.total_capacity);
        match restored {
            Some(available) => Ok(self.successor(self.total_capacity, available)),
            None => Err(InventoryError::RefundExceedsCapacity {
                event_id: self.event_id,
                requested: quantity,
                available: self.available,
                total_capacity: self.total_capacity,
            }),
        }
    }

    /// Change capacity, shifting `available` by the same delta
    pub fn resized(&self, total_capacity: u32) -> Result<Self, InventoryError> {
        let sold = self.sold();
        if total_capacity < sold {
            return Err(InventoryError::CapacityBelowSold {
                event_id: self.event_id,
                requested: total_capacity,
                sold,
            });
        }
        Ok(self.successor(total_capacity, total_capacity - sold))
    }
}

/// A change applied to an event's inventory through the reservation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Purchase(u32),
    Refund(u32),
    Resize(u32),
}

impl Adjustment {
    pub fn apply(&self, current: &EventInventory) -> Result<EventInventory, InventoryError> {
        match *self {
            Adjustment::Purchase(quantity) => current.purchased(quantity),
            Adjustment::Refund(quantity) => current.refunded(quantity),
            Adjustment::Resize(total_capacity) => current.resized(total_capacity),
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Adjustment::Purchase(_) => "purchase",
            Adjustment::Refund(_) => "refund",
            Adjustment::Resize(_) => "resize",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationKind {
    Purchase,
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationOutcome {
    Committed,
    Rejected,
}

/// Result of a single purchase or refund as reported to the caller.
/// Never persisted; the committed delta lives in the inventory record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub event_id: EventId,
    pub kind: ReservationKind,
    pub quantity: u32,
    pub outcome: ReservationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<u32>,
}

impl Reservation {
    pub fn committed(kind: ReservationKind, quantity: u32, record: &EventInventory) -> Self {
        Self {
            event_id: record.event_id,
            kind,
            quantity,
            outcome: ReservationOutcome::Committed,
            reason: None,
            available: Some(record.available),
        }
    }

    pub fn rejected(kind: ReservationKind, event_id: EventId, quantity: u32, error: &InventoryError) -> Self {
        Self {
            event_id,
            kind,
            quantity,
            outcome: ReservationOutcome::Rejected,
            reason: Some(error.to_string()),
            available: error.available(),
        }
    }

    pub fn is_committed(&self) -> bool {
        self.outcome == ReservationOutcome::Committed
    }
}

/// Broadcast after every committed change so live views stay coherent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryChanged {
    pub event_id: EventId,
    pub operation: String,
    pub total_capacity: u32,
    pub available: u32,
    pub version: u64,
    pub timestamp: i64,
}

impl InventoryChanged {
    pub fn from_record(operation: &str, record: &EventInventory) -> Self {
        Self {
            event_id: record.event_id,
            operation: operation.to_string(),
            total_capacity: record.total_capacity,
            available: record.available,
            version: record.version,
            timestamp: record.updated_at.timestamp(),
        }
    }
}
