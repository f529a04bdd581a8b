use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use boxoffice_core::{EventId, EventInventory, Reservation, ReservationKind};

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body for purchase and refund. The booking assistant sends the same shape.
#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: u32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/events", get(list_events))
        .route("/v1/events/{event_id}", get(get_event))
        .route("/v1/events/{event_id}/purchase", post(purchase))
        .route("/v1/events/{event_id}/refund", post(refund))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/events
async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<EventInventory>>, AppError> {
    Ok(Json(state.inventory.list().await?))
}

/// GET /v1/events/{event_id}
async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
) -> Result<Json<EventInventory>, AppError> {
    Ok(Json(state.inventory.get(event_id).await?))
}

/// POST /v1/events/{event_id}/purchase
async fn purchase(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<Reservation>, AppError> {
    let inventory = state.inventory.clone();
    let quantity = req.quantity;
    let record = state
        .commit("purchase", async move { inventory.purchase(event_id, quantity).await })
        .await
        .map_err(|err| into_rejection(err, ReservationKind::Purchase, event_id, req.quantity))?;

    Ok(Json(Reservation::committed(ReservationKind::Purchase, req.quantity, &record)))
}

/// POST /v1/events/{event_id}/refund
async fn refund(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<Reservation>, AppError> {
    let inventory = state.inventory.clone();
    let quantity = req.quantity;
    let record = state
        .commit("refund", async move { inventory.refund(event_id, quantity).await })
        .await
        .map_err(|err| into_rejection(err, ReservationKind::Refund, event_id, req.quantity))?;

    Ok(Json(Reservation::committed(ReservationKind::Refund, req.quantity, &record)))
}

/// Business rejections are reported as a rejected reservation; everything else passes through
fn into_rejection(err: AppError, kind: ReservationKind, event_id: EventId, quantity: u32) -> AppError {
    match err {
        AppError::Inventory(e) if e.is_business_rejection() => {
            AppError::Rejected(Reservation::rejected(kind, event_id, quantity, &e), e)
        }
        other => other,
    }
}
