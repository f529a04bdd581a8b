use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use boxoffice_core::{InventoryError, Reservation};
use serde_json::{json, Value};

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    /// Operation did not finish in time; its outcome is unknown to the caller
    Timeout(String),
    Inventory(InventoryError),
    /// Purchase or refund turned down for a business reason
    Rejected(Reservation, InventoryError),
    InternalServerError(String),
}

/// Stable machine-readable code for an inventory error
pub fn error_code(err: &InventoryError) -> &'static str {
    match err {
        InventoryError::EventNotFound(_) => "EVENT_NOT_FOUND",
        InventoryError::InsufficientInventory { .. } => "INSUFFICIENT_INVENTORY",
        InventoryError::RefundExceedsCapacity { .. } => "REFUND_EXCEEDS_CAPACITY",
        InventoryError::CapacityBelowSold { .. } => "CAPACITY_BELOW_SOLD",
        InventoryError::AlreadyExists(_) => "ALREADY_EXISTS",
        InventoryError::HasOutstandingReservations { .. } => "HAS_OUTSTANDING_RESERVATIONS",
        InventoryError::Contention { .. } => "CONTENTION",
        InventoryError::InvalidQuantity => "INVALID_QUANTITY",
        InventoryError::Storage(_) => "STORAGE_ERROR",
    }
}

fn status_for(err: &InventoryError) -> StatusCode {
    match err {
        InventoryError::EventNotFound(_) => StatusCode::NOT_FOUND,
        InventoryError::InvalidQuantity => StatusCode::BAD_REQUEST,
        InventoryError::Contention { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InventoryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        InventoryError::InsufficientInventory { .. }
        | InventoryError::RefundExceedsCapacity { .. }
        | InventoryError::CapacityBelowSold { .. }
        | InventoryError::AlreadyExists(_)
        | InventoryError::HasOutstandingReservations { .. } => StatusCode::CONFLICT,
    }
}

/// Extra fields so callers can act on a rejection without re-reading the event
fn details(err: &InventoryError) -> Value {
    match err {
        InventoryError::InsufficientInventory { requested, available, .. } => {
            json!({ "requested": requested, "available": available })
        }
        InventoryError::RefundExceedsCapacity { requested, available, total_capacity, .. } => {
            json!({ "requested": requested, "available": available, "total_capacity": total_capacity })
        }
        InventoryError::CapacityBelowSold { requested, sold, .. } => {
            json!({ "requested": requested, "sold": sold })
        }
        InventoryError::HasOutstandingReservations { sold, .. } => json!({ "sold": sold }),
        InventoryError::Contention { attempts, .. } => json!({ "attempts": attempts, "retryable": true }),
        _ => json!({}),
    }
}

fn inventory_body(err: &InventoryError) -> Value {
    let mut body = details(err);
    body["error"] = json!(err.to_string());
    body["code"] = json!(error_code(err));
    body
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, json!({ "error": msg, "code": "OUTCOME_UNKNOWN" })),
            AppError::Rejected(reservation, err) => {
                tracing::warn!(event_id = %reservation.event_id, code = error_code(&err), "Reservation rejected: {}", err);
                let mut body = inventory_body(&err);
                body["reservation"] = json!(reservation);
                (status_for(&err), body)
            }
            AppError::Inventory(InventoryError::Storage(err)) => {
                tracing::error!("Storage failure: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal Server Error" }))
            }
            AppError::Inventory(err) => {
                if err.is_retryable() {
                    tracing::warn!("Inventory contention: {}", err);
                    let response = (status_for(&err), [(header::RETRY_AFTER, "1")], Json(inventory_body(&err)));
                    return response.into_response();
                }
                (status_for(&err), inventory_body(&err))
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal Server Error" }))
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        Self::Inventory(err)
    }
}
