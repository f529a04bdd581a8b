use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use boxoffice_core::{EventInventory, InventoryChanged, InventoryError, InventoryService};
use boxoffice_store::app_config::ApiConfig;

use crate::error::AppError;
use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub inventory: InventoryService,
    pub sse_tx: broadcast::Sender<InventoryChanged>,
    pub metrics: Arc<Metrics>,
    pub auth: AuthConfig,
    pub operation_timeout: Duration,
}

impl AppState {
    pub fn new(inventory: InventoryService, auth: AuthConfig, api: &ApiConfig) -> Result<Self, prometheus::Error> {
        let (sse_tx, _) = broadcast::channel(api.stream_buffer.max(1));
        Ok(Self {
            inventory,
            sse_tx,
            metrics: Arc::new(Metrics::new()?),
            auth,
            operation_timeout: Duration::from_millis(api.operation_timeout_ms),
        })
    }

    /// Run an inventory change under the operation timeout, then record and broadcast the result.
    ///
    /// The change runs on its own task so a write that commits after the caller
    /// has timed out still reaches metrics and stream subscribers. The caller is
    /// told to re-read the event instead of retrying blindly.
    pub async fn commit<F>(&self, operation: &'static str, change: F) -> Result<EventInventory, AppError>
    where
        F: Future<Output = Result<EventInventory, InventoryError>> + Send + 'static,
    {
        let metrics = self.metrics.clone();
        let sse_tx = self.sse_tx.clone();
        let task = tokio::spawn(async move {
            let outcome = change.await;
            match &outcome {
                Ok(record) => {
                    metrics.committed(operation, record);
                    // No subscribers is fine
                    let _ = sse_tx.send(InventoryChanged::from_record(operation, record));
                }
                Err(err) => metrics.rejected(operation, err),
            }
            outcome
        });

        match tokio::time::timeout(self.operation_timeout, task).await {
            Ok(Ok(outcome)) => outcome.map_err(AppError::from),
            Ok(Err(e)) => Err(AppError::InternalServerError(format!("{} task failed: {}", operation, e))),
            Err(_) => {
                tracing::warn!(operation, "Inventory operation timed out");
                self.metrics.timed_out(operation);
                Err(AppError::Timeout(format!(
                    "{} did not complete in time; re-read the event before retrying",
                    operation
                )))
            }
        }
    }
}
