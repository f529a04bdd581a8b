use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use boxoffice_core::{EventId, EventInventory, InventoryStore, StoreError};

/// SQLite-backed inventory. Every mutation is a single conditional statement.
pub struct SqliteInventoryStore {
    pool: SqlitePool,
}

impl SqliteInventoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn exists(&self, event_id: EventId) -> Result<bool, StoreError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM event_inventory WHERE event_id = ?")
            .bind(event_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(found.is_some())
    }
}

#[derive(sqlx::FromRow)]
struct InventoryRow {
    event_id: String,
    total_capacity: i64,
    available: i64,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InventoryRow> for EventInventory {
    type Error = StoreError;

    fn try_from(row: InventoryRow) -> Result<Self, Self::Error> {
        Ok(EventInventory {
            event_id: row.event_id.parse().map_err(StoreError::backend)?,
            total_capacity: u32::try_from(row.total_capacity).map_err(StoreError::backend)?,
            available: u32::try_from(row.available).map_err(StoreError::backend)?,
            version: u64::try_from(row.version).map_err(StoreError::backend)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Conditional deletes re-run when the row turned unsold between statements
const DELETE_ATTEMPTS: u32 = 3;

/// Error for a delete that matched no row, or `None` when the record is unsold and the delete should run again
fn blocked_delete(current: &EventInventory) -> Option<StoreError> {
    match current.sold() {
        0 => None,
        sold => Some(StoreError::HasOutstandingReservations {
            event_id: current.event_id,
            sold,
        }),
    }
}

fn to_db_version(version: u64) -> Result<i64, StoreError> {
    i64::try_from(version).map_err(StoreError::backend)
}

#[async_trait]
impl InventoryStore for SqliteInventoryStore {
    async fn get(&self, event_id: EventId) -> Result<EventInventory, StoreError> {
        let row = sqlx::query_as::<_, InventoryRow>(
            "SELECT event_id, total_capacity, available, version, created_at, updated_at FROM event_inventory WHERE event_id = ?",
        )
        .bind(event_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.ok_or(StoreError::NotFound(event_id))?.try_into()
    }

    async fn list(&self) -> Result<Vec<EventInventory>, StoreError> {
        let rows = sqlx::query_as::<_, InventoryRow>(
            "SELECT event_id, total_capacity, available, version, created_at, updated_at FROM event_inventory ORDER BY created_at, event_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter().map(EventInventory::try_from).collect()
    }

    async fn create(&self, record: &EventInventory) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO event_inventory (event_id, total_capacity, available, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.event_id.to_string())
        .bind(i64::from(record.total_capacity))
        .bind(i64::from(record.available))
        .bind(to_db_version(record.version)?)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::AlreadyExists(record.event_id))
            }
            Err(e) => Err(StoreError::backend(e)),
        }
    }

    async fn compare_and_swap(
        &self,
        expected_version: u64,
        record: &EventInventory,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE event_inventory
            SET total_capacity = ?, available = ?, version = ?, updated_at = ?
            WHERE event_id = ? AND version = ?
            "#,
        )
        .bind(i64::from(record.total_capacity))
        .bind(i64::from(record.available))
        .bind(to_db_version(record.version)?)
        .bind(record.updated_at)
        .bind(record.event_id.to_string())
        .bind(to_db_version(expected_version)?)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        if self.exists(record.event_id).await? {
            debug!(event_id = %record.event_id, expected_version, "Stale version on write");
            Err(StoreError::VersionConflict {
                event_id: record.event_id,
                expected: expected_version,
            })
        } else {
            Err(StoreError::NotFound(record.event_id))
        }
    }

    async fn delete(&self, event_id: EventId) -> Result<(), StoreError> {
        let mut last_version = 0;

        for attempt in 1..=DELETE_ATTEMPTS {
            let result = sqlx::query("DELETE FROM event_inventory WHERE event_id = ? AND available = total_capacity")
                .bind(event_id.to_string())
                .execute(&self.pool)
                .await
                .map_err(StoreError::backend)?;

            if result.rows_affected() == 1 {
                return Ok(());
            }

            // Either missing, still holding sold tickets, or refunded in between
            let current = self.get(event_id).await?;
            if let Some(err) = blocked_delete(&current) {
                return Err(err);
            }
            debug!(%event_id, attempt, "Event became unsold during delete, retrying");
            last_version = current.version;
        }

        Err(StoreError::VersionConflict {
            event_id,
            expected: last_version,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }
}
