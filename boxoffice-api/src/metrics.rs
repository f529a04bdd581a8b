use axum::{extract::State, http::header, response::IntoResponse};
use boxoffice_core::{EventId, EventInventory, InventoryError};
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::error::{error_code, AppError};
use crate::state::AppState;

pub struct Metrics {
    registry: Registry,
    operations: IntCounterVec,
    available: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let operations = IntCounterVec::new(
            Opts::new("boxoffice_inventory_operations_total", "Inventory operations by outcome"),
            &["operation", "outcome"],
        )?;
        let available = IntGaugeVec::new(
            Opts::new("boxoffice_event_available", "Tickets still available per event"),
            &["event_id"],
        )?;

        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(available.clone()))?;

        Ok(Self { registry, operations, available })
    }

    pub fn committed(&self, operation: &str, record: &EventInventory) {
        self.operations.with_label_values(&[operation, "committed"]).inc();
        let event_id = record.event_id.to_string();
        self.available
            .with_label_values(&[event_id.as_str()])
            .set(i64::from(record.available));
    }

    pub fn rejected(&self, operation: &str, err: &InventoryError) {
        self.operations.with_label_values(&[operation, error_code(err)]).inc();
    }

    /// The caller gave up waiting; the change may still commit afterwards
    pub fn timed_out(&self, operation: &str) {
        self.operations.with_label_values(&[operation, "OUTCOME_UNKNOWN"]).inc();
    }

    pub fn removed(&self, event_id: EventId) {
        let event_id = event_id.to_string();
        let _ = self.available.remove_label_values(&[event_id.as_str()]);
    }

    pub fn operation_count(&self, operation: &str, outcome: &str) -> u64 {
        self.operations.with_label_values(&[operation, outcome]).get()
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::InternalServerError(format!("Metrics encoding failed: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
