use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use boxoffice_core::{EventId, EventInventory};

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    /// Generated when absent
    pub event_id: Option<Uuid>,
    pub total_capacity: u32,
}

#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    pub total_capacity: u32,
}

/// Mounted under `/v1/admin` behind the admin auth middleware
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event))
        .route("/events/{event_id}", delete(remove_event))
        .route("/events/{event_id}/capacity", put(resize_event))
}

// ============================================================================
// Event Inventory Handlers
// ============================================================================

/// POST /v1/admin/events
async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventInventory>), AppError> {
    let event_id = req.event_id.map(EventId::from).unwrap_or_default();
    let record = state.inventory.create_event(event_id, req.total_capacity).await?;
    state.metrics.committed("create", &record);
    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /v1/admin/events/{event_id}/capacity
async fn resize_event(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
    Json(req): Json<ResizeRequest>,
) -> Result<Json<EventInventory>, AppError> {
    let inventory = state.inventory.clone();
    let record = state
        .commit("resize", async move { inventory.resize(event_id, req.total_capacity).await })
        .await?;
    Ok(Json(record))
}

/// DELETE /v1/admin/events/{event_id}
async fn remove_event(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
) -> Result<StatusCode, AppError> {
    state.inventory.remove_event(event_id).await?;
    state.metrics.removed(event_id);
    Ok(StatusCode::NO_CONTENT)
}
