use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures_util::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use boxoffice_core::EventId;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/events/{event_id}/stream", get(stream_event))
}

/// GET /v1/events/{event_id}/stream
///
/// Server-sent `inventory_changed` events for one event. Lagging subscribers
/// skip missed notifications; the next one carries the full current counts.
async fn stream_event(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    // Unknown events get a 404 rather than an empty stream
    state.inventory.get(event_id).await?;

    let rx = state.sse_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(change) if change.event_id == event_id => {
                Some(Event::default().event("inventory_changed").json_data(&change))
            }
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(%event_id, "Inventory stream lagged: {}", e);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
