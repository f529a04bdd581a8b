use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use boxoffice_api::{app, middleware::AdminClaims, AppState, AuthConfig};
use boxoffice_core::{
    EventId, EventInventory, InMemoryInventoryStore, InventoryService, InventoryStore, RetryPolicy, StoreError,
};
use boxoffice_store::app_config::ApiConfig;
use futures_util::StreamExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &str = "test-secret";

fn state_with(store: Arc<dyn InventoryStore>, operation_timeout_ms: u64) -> AppState {
    let inventory = InventoryService::new(store, RetryPolicy::default());
    let api = ApiConfig {
        operation_timeout_ms,
        stream_buffer: 16,
    };
    AppState::new(inventory, AuthConfig { secret: SECRET.to_string() }, &api).unwrap()
}

fn test_state() -> AppState {
    state_with(Arc::new(InMemoryInventoryStore::new()), 2_000)
}

fn token(role: &str) -> String {
    let claims = AdminClaims {
        sub: "admin-1".to_string(),
        role: role.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::minutes(5)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn send(state: &AppState, method: Method, uri: &str, body: Option<Value>, bearer: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    let request = match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn create_event(state: &AppState, capacity: u32) -> String {
    let (status, body) = send(
        state,
        Method::POST,
        "/v1/admin/events",
        Some(json!({ "total_capacity": capacity })),
        Some(token("ADMIN").as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["event_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_admin_routes_require_admin_token() {
    let state = test_state();
    let body = Some(json!({ "total_capacity": 10 }));

    let (status, _) = send(&state, Method::POST, "/v1/admin/events", body.clone(), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&state, Method::POST, "/v1/admin/events", body.clone(), Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&state, Method::POST, "/v1/admin/events", body, Some(token("CUSTOMER").as_str())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_purchase_refund_resize_flow() {
    let state = test_state();
    let event_id = create_event(&state, 10).await;
    let admin = token("ADMIN");

    let (status, body) = send(&state, Method::POST, &format!("/v1/events/{event_id}/purchase"), Some(json!({ "quantity": 3 })), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "COMMITTED");
    assert_eq!(body["kind"], "PURCHASE");
    assert_eq!(body["available"], 7);

    let (status, body) = send(&state, Method::POST, &format!("/v1/events/{event_id}/purchase"), Some(json!({ "quantity": 8 })), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INSUFFICIENT_INVENTORY");
    assert_eq!(body["available"], 7);
    assert_eq!(body["reservation"]["outcome"], "REJECTED");

    let (status, body) = send(&state, Method::POST, &format!("/v1/events/{event_id}/refund"), Some(json!({ "quantity": 8 })), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "REFUND_EXCEEDS_CAPACITY");
    assert_eq!(body["total_capacity"], 10);

    let (status, body) = send(&state, Method::PUT, &format!("/v1/admin/events/{event_id}/capacity"), Some(json!({ "total_capacity": 5 })), Some(admin.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_capacity"], 5);
    assert_eq!(body["available"], 2);

    let (status, body) = send(&state, Method::PUT, &format!("/v1/admin/events/{event_id}/capacity"), Some(json!({ "total_capacity": 2 })), Some(admin.as_str())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CAPACITY_BELOW_SOLD");
    assert_eq!(body["sold"], 3);

    let (status, body) = send(&state, Method::DELETE, &format!("/v1/admin/events/{event_id}"), None, Some(admin.as_str())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "HAS_OUTSTANDING_RESERVATIONS");

    let (status, body) = send(&state, Method::GET, &format!("/v1/events/{event_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], 2);
    assert_eq!(body["version"], 2);
}

#[tokio::test]
async fn test_remove_event_after_full_refund() {
    let state = test_state();
    let event_id = create_event(&state, 4).await;
    let admin = token("ADMIN");

    send(&state, Method::POST, &format!("/v1/events/{event_id}/purchase"), Some(json!({ "quantity": 2 })), None).await;
    let (status, body) = send(&state, Method::POST, &format!("/v1/events/{event_id}/refund"), Some(json!({ "quantity": 2 })), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], 4);

    let (status, _) = send(&state, Method::DELETE, &format!("/v1/admin/events/{event_id}"), None, Some(admin.as_str())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&state, Method::GET, &format!("/v1/events/{event_id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "EVENT_NOT_FOUND");
}

#[tokio::test]
async fn test_invalid_requests() {
    let state = test_state();
    let event_id = create_event(&state, 4).await;

    let (status, body) = send(&state, Method::POST, &format!("/v1/events/{event_id}/purchase"), Some(json!({ "quantity": 0 })), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_QUANTITY");

    let (status, _) = send(&state, Method::POST, &format!("/v1/events/{}/purchase", EventId::new()), Some(json!({ "quantity": 1 })), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&state, Method::GET, &format!("/v1/events/{}/stream", EventId::new()), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &state,
        Method::POST,
        "/v1/admin/events",
        Some(json!({ "event_id": event_id, "total_capacity": 1 })),
        Some(token("ADMIN").as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_EXISTS");
}

#[tokio::test]
async fn test_list_events() {
    let state = test_state();
    create_event(&state, 1).await;
    create_event(&state, 2).await;

    let (status, body) = send(&state, Method::GET, "/v1/events", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_committed_changes_are_broadcast_and_counted() {
    let state = test_state();
    let event_id = create_event(&state, 5).await;
    let mut rx = state.sse_tx.subscribe();

    send(&state, Method::POST, &format!("/v1/events/{event_id}/purchase"), Some(json!({ "quantity": 2 })), None).await;
    send(&state, Method::POST, &format!("/v1/events/{event_id}/purchase"), Some(json!({ "quantity": 9 })), None).await;

    let change = rx.try_recv().unwrap();
    assert_eq!(change.event_id.to_string(), event_id);
    assert_eq!(change.operation, "purchase");
    assert_eq!(change.available, 3);
    // The rejected purchase is not broadcast
    assert!(rx.try_recv().is_err());

    assert_eq!(state.metrics.operation_count("purchase", "committed"), 1);
    assert_eq!(state.metrics.operation_count("purchase", "INSUFFICIENT_INVENTORY"), 1);

    let response = app(state.clone())
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("boxoffice_inventory_operations_total"));
    assert!(text.contains("boxoffice_event_available"));
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&test_state(), Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

/// Delays every read so operations outlive a short timeout
struct SlowStore {
    inner: InMemoryInventoryStore,
    delay: Duration,
}

#[async_trait]
impl InventoryStore for SlowStore {
    async fn get(&self, event_id: EventId) -> Result<EventInventory, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(event_id).await
    }

    async fn list(&self) -> Result<Vec<EventInventory>, StoreError> {
        self.inner.list().await
    }

    async fn create(&self, record: &EventInventory) -> Result<(), StoreError> {
        self.inner.create(record).await
    }

    async fn compare_and_swap(&self, expected_version: u64, record: &EventInventory) -> Result<(), StoreError> {
        self.inner.compare_and_swap(expected_version, record).await
    }

    async fn delete(&self, event_id: EventId) -> Result<(), StoreError> {
        self.inner.delete(event_id).await
    }
}

#[tokio::test]
async fn test_timeout_reports_unknown_outcome() {
    let store = Arc::new(SlowStore {
        inner: InMemoryInventoryStore::new(),
        delay: Duration::from_millis(200),
    });
    let state = state_with(store, 20);
    let event_id = create_event(&state, 3).await;

    let (status, body) = send(&state, Method::POST, &format!("/v1/events/{event_id}/purchase"), Some(json!({ "quantity": 1 })), None).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], "OUTCOME_UNKNOWN");
}

/// Commits immediately but acknowledges the write late
struct LateAckStore {
    inner: InMemoryInventoryStore,
    delay: Duration,
}

#[async_trait]
impl InventoryStore for LateAckStore {
    async fn get(&self, event_id: EventId) -> Result<EventInventory, StoreError> {
        self.inner.get(event_id).await
    }

    async fn list(&self) -> Result<Vec<EventInventory>, StoreError> {
        self.inner.list().await
    }

    async fn create(&self, record: &EventInventory) -> Result<(), StoreError> {
        self.inner.create(record).await
    }

    async fn compare_and_swap(&self, expected_version: u64, record: &EventInventory) -> Result<(), StoreError> {
        self.inner.compare_and_swap(expected_version, record).await?;
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn delete(&self, event_id: EventId) -> Result<(), StoreError> {
        self.inner.delete(event_id).await
    }
}

#[tokio::test]
async fn test_write_committed_after_timeout_is_still_published() {
    let store = Arc::new(LateAckStore {
        inner: InMemoryInventoryStore::new(),
        delay: Duration::from_millis(200),
    });
    let state = state_with(store.clone(), 20);
    let event_id = create_event(&state, 5).await;
    let mut rx = state.sse_tx.subscribe();

    let (status, body) = send(&state, Method::POST, &format!("/v1/events/{event_id}/purchase"), Some(json!({ "quantity": 2 })), None).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], "OUTCOME_UNKNOWN");
    assert_eq!(state.metrics.operation_count("purchase", "OUTCOME_UNKNOWN"), 1);

    // The write landed and is announced once the store acknowledges it
    let change = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert_eq!(change.event_id.to_string(), event_id);
    assert_eq!(change.available, 3);
    assert_eq!(state.metrics.operation_count("purchase", "committed"), 1);

    let stored = store.get(event_id.parse().unwrap()).await.unwrap();
    assert_eq!(stored.available, 3);
}

#[tokio::test]
async fn test_stream_emits_changes_for_its_event_only() {
    let state = test_state();
    let watched = create_event(&state, 6).await;
    let other = create_event(&state, 6).await;

    let response = app(state.clone())
        .oneshot(
            Request::builder()
                .uri(format!("/v1/events/{watched}/stream"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut frames = response.into_body().into_data_stream();

    send(&state, Method::POST, &format!("/v1/events/{other}/purchase"), Some(json!({ "quantity": 1 })), None).await;
    send(&state, Method::POST, &format!("/v1/events/{watched}/purchase"), Some(json!({ "quantity": 2 })), None).await;

    let mut text = String::new();
    while !text.contains("\n\n") {
        let chunk = tokio::time::timeout(Duration::from_secs(2), frames.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        text.push_str(std::str::from_utf8(&chunk).unwrap());
    }

    assert!(text.contains("event: inventory_changed"));
    let data = text
        .lines()
        .find_map(|line| line.strip_prefix("data:"))
        .unwrap()
        .trim();
    let change: Value = serde_json::from_str(data).unwrap();
    // The purchase on the other event was filtered out
    assert_eq!(change["event_id"], watched);
    assert_eq!(change["operation"], "purchase");
    assert_eq!(change["available"], 4);
    assert_eq!(change["total_capacity"], 6);
    assert_eq!(change["version"], 1);
}
