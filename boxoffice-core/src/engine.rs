use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{InventoryError, StoreError};
use crate::inventory::{Adjustment, EventId, EventInventory};
use crate::repository::InventoryStore;

/// Bounds for the optimistic retry loop
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(2),
            max_backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Full-jitter exponential backoff after the given failed attempt (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let cap = self
            .base_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff);
        let cap_micros = cap.as_micros() as u64;
        if cap_micros == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(rand::thread_rng().gen_range(0..=cap_micros))
    }
}

/// Serializes read-check-write sequences per event through compare-and-swap.
///
/// Each attempt reads the current record, applies the adjustment and tries to
/// commit it against the version it read. A version conflict means another
/// writer got there first, so the attempt is repeated on fresh state. Business
/// rejections end the loop immediately.
#[derive(Clone)]
pub struct ReservationEngine {
    store: Arc<dyn InventoryStore>,
    policy: RetryPolicy,
}

impl ReservationEngine {
    pub fn new(store: Arc<dyn InventoryStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<dyn InventoryStore> {
        &self.store
    }

    pub async fn apply(
        &self,
        event_id: EventId,
        adjustment: Adjustment,
    ) -> Result<EventInventory, InventoryError> {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let current = self.store.get(event_id).await?;
            let next = adjustment.apply(&current)?;

            match self.store.compare_and_swap(current.version, &next).await {
                Ok(()) => {
                    debug!(
                        %event_id,
                        operation = adjustment.operation(),
                        version = next.version,
                        available = next.available,
                        attempt,
                        "Inventory change committed"
                    );
                    return Ok(next);
                }
                Err(StoreError::VersionConflict { expected, .. }) => {
                    debug!(%event_id, expected, attempt, "Version conflict, retrying");
                    if attempt < max_attempts {
                        tokio::time::sleep(self.policy.backoff(attempt)).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(%event_id, operation = adjustment.operation(), attempts = max_attempts, "Retries exhausted");
        Err(InventoryError::Contention {
            event_id,
            attempts: max_attempts,
        })
    }

    pub async fn purchase(&self, event_id: EventId, quantity: u32) -> Result<EventInventory, InventoryError> {
        self.apply(event_id, Adjustment::Purchase(quantity)).await
    }

    pub async fn refund(&self, event_id: EventId, quantity: u32) -> Result<EventInventory, InventoryError> {
        self.apply(event_id, Adjustment::Refund(quantity)).await
    }

    pub async fn resize(&self, event_id: EventId, total_capacity: u32) -> Result<EventInventory, InventoryError> {
        self.apply(event_id, Adjustment::Resize(total_capacity)).await
    }
}
