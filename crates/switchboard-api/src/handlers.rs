//! Control-plane handlers.
//!
//! Registration and subscription writes go to the shared state crates;
//! flight accessors read and mutate the flight store on behalf of peers
//! mid-dispatch. Request bodies are parsed leniently: an empty body is
//! treated as `{}` and the `content-type` header is ignored, because peers
//! habitually label JSON payloads as form data.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::debug;

use switchboard_state::{PeerRecord, SubscriptionEntry};

use crate::ApiState;

// ── Wire types ─────────────────────────────────────────────────

/// Body of `POST /register`. Both fields are required; options here only
/// exist so validation can name every absent field at once.
#[derive(Debug, Default, serde::Deserialize)]
pub struct RegisterRequest {
    pub key: Option<String>,
    pub url: Option<String>,
}

/// Body of `POST /subscribe`. Only `key` is required.
#[derive(Debug, Default, serde::Deserialize)]
pub struct SubscribeRequest {
    pub method: Option<String>,
    pub path: Option<String>,
    pub key: Option<String>,
    pub require: Option<Vec<String>>,
}

/// Body of `GET|PUT /response/{flight_id}/status`.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct StatusBody {
    pub status: Option<u16>,
}

/// Response of `GET /table`.
#[derive(Debug, serde::Serialize)]
pub struct TableSnapshot {
    /// Subscription entries keyed by their identity digest.
    pub subscriptions: HashMap<String, SubscriptionEntry>,
    /// Peer records keyed by peer key.
    pub peers: HashMap<String, PeerRecord>,
}

// ── Helpers ────────────────────────────────────────────────────

/// Parse a JSON request body, treating an empty body as `{}`.
fn parse_json_body<T>(body: &Bytes) -> Result<T, Response>
where
    T: DeserializeOwned + Default,
{
    if body.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        (StatusCode::BAD_REQUEST, format!("invalid JSON body: {e}")).into_response()
    })
}

/// 400 naming the absent required fields, in declaration order.
fn missing_parameters(checks: &[(&str, bool)]) -> Response {
    let missing: Vec<String> = checks
        .iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| format!("\"{name}\""))
        .collect();
    let label = if missing.len() == 1 {
        "parameter"
    } else {
        "parameters"
    };
    (
        StatusCode::BAD_REQUEST,
        format!("missing {label}: {}", missing.join(", ")),
    )
        .into_response()
}

fn unknown_flight(id: &str) -> Response {
    (StatusCode::BAD_REQUEST, format!("unknown flight id: {id}")).into_response()
}

// ── Registration & subscription ────────────────────────────────

/// POST /register
pub async fn register(State(state): State<ApiState>, body: Bytes) -> Response {
    let req: RegisterRequest = match parse_json_body(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let (Some(key), Some(url)) = (&req.key, &req.url) else {
        return missing_parameters(&[("key", req.key.is_none()), ("url", req.url.is_none())]);
    };

    state.peers.register(key, url).await;
    StatusCode::OK.into_response()
}

/// POST /subscribe
pub async fn subscribe(State(state): State<ApiState>, body: Bytes) -> Response {
    let req: SubscribeRequest = match parse_json_body(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let Some(key) = &req.key else {
        return missing_parameters(&[("key", true)]);
    };

    let method = req.method.as_deref().unwrap_or("GET");
    let path = req.path.as_deref().unwrap_or("*");
    let require = req.require.unwrap_or_default();

    let digest = state.table.add(method, path, key, require).await;
    debug!(%digest, "subscription upserted");
    StatusCode::OK.into_response()
}

/// GET /table
pub async fn table(State(state): State<ApiState>) -> Response {
    let snapshot = TableSnapshot {
        subscriptions: state.table.entries_by_digest().await,
        peers: state.peers.snapshot().await,
    };
    Json(snapshot).into_response()
}

// ── Request-side flight accessors ──────────────────────────────

/// GET /request/{flight_id}/headers
pub async fn get_request_headers(
    State(state): State<ApiState>,
    Path(flight_id): Path<String>,
) -> Response {
    if !state.flights.exists(&flight_id).await {
        return unknown_flight(&flight_id);
    }
    Json(state.flights.request_headers(&flight_id).await).into_response()
}

/// PUT /request/{flight_id}/headers
pub async fn put_request_headers(
    State(state): State<ApiState>,
    Path(flight_id): Path<String>,
    body: Bytes,
) -> Response {
    if !state.flights.exists(&flight_id).await {
        return unknown_flight(&flight_id);
    }
    let headers: HashMap<String, String> = match parse_json_body(&body) {
        Ok(map) => map,
        Err(resp) => return resp,
    };
    state.flights.set_request_headers(&flight_id, headers).await;
    StatusCode::OK.into_response()
}

/// GET /request/{flight_id}/body
pub async fn get_request_body(
    State(state): State<ApiState>,
    Path(flight_id): Path<String>,
) -> Response {
    if !state.flights.exists(&flight_id).await {
        return unknown_flight(&flight_id);
    }
    let body = state.flights.request_body(&flight_id).await;
    ([(header::CONTENT_TYPE, "application/octet-stream")], body).into_response()
}

/// PUT /request/{flight_id}/body
pub async fn put_request_body(
    State(state): State<ApiState>,
    Path(flight_id): Path<String>,
    body: Bytes,
) -> Response {
    if !state.flights.exists(&flight_id).await {
        return unknown_flight(&flight_id);
    }
    state.flights.set_request_body(&flight_id, body).await;
    StatusCode::OK.into_response()
}

// ── Response-side flight accessors ─────────────────────────────

/// GET /response/{flight_id}/headers
pub async fn get_response_headers(
    State(state): State<ApiState>,
    Path(flight_id): Path<String>,
) -> Response {
    if !state.flights.exists(&flight_id).await {
        return unknown_flight(&flight_id);
    }
    Json(state.flights.response_headers(&flight_id).await).into_response()
}

/// PUT /response/{flight_id}/headers
pub async fn put_response_headers(
    State(state): State<ApiState>,
    Path(flight_id): Path<String>,
    body: Bytes,
) -> Response {
    if !state.flights.exists(&flight_id).await {
        return unknown_flight(&flight_id);
    }
    let headers: HashMap<String, String> = match parse_json_body(&body) {
        Ok(map) => map,
        Err(resp) => return resp,
    };
    state
        .flights
        .set_response_headers(&flight_id, headers)
        .await;
    StatusCode::OK.into_response()
}

/// GET /response/{flight_id}/body
pub async fn get_response_body(
    State(state): State<ApiState>,
    Path(flight_id): Path<String>,
) -> Response {
    if !state.flights.exists(&flight_id).await {
        return unknown_flight(&flight_id);
    }
    let body = state.flights.response_body(&flight_id).await;
    ([(header::CONTENT_TYPE, "application/octet-stream")], body).into_response()
}

/// PUT /response/{flight_id}/body
pub async fn put_response_body(
    State(state): State<ApiState>,
    Path(flight_id): Path<String>,
    body: Bytes,
) -> Response {
    if !state.flights.exists(&flight_id).await {
        return unknown_flight(&flight_id);
    }
    state.flights.set_response_body(&flight_id, body).await;
    StatusCode::OK.into_response()
}

/// GET /response/{flight_id}/status
pub async fn get_response_status(
    State(state): State<ApiState>,
    Path(flight_id): Path<String>,
) -> Response {
    if !state.flights.exists(&flight_id).await {
        return unknown_flight(&flight_id);
    }
    let status = state.flights.response_status(&flight_id).await;
    Json(StatusBody { status }).into_response()
}

/// PUT /response/{flight_id}/status
pub async fn put_response_status(
    State(state): State<ApiState>,
    Path(flight_id): Path<String>,
    body: Bytes,
) -> Response {
    if !state.flights.exists(&flight_id).await {
        return unknown_flight(&flight_id);
    }
    let parsed: StatusBody = match parse_json_body(&body) {
        Ok(parsed) => parsed,
        Err(resp) => return resp,
    };
    let Some(status) = parsed.status else {
        return missing_parameters(&[("status", true)]);
    };
    if !(100..=599).contains(&status) {
        return (
            StatusCode::BAD_REQUEST,
            format!("status out of range: {status}"),
        )
            .into_response();
    }

    state.flights.set_response_status(&flight_id, status).await;
    StatusCode::OK.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_state::{FlightStore, PeerRegistry, SubscriptionTable};

    fn test_state() -> ApiState {
        ApiState {
            peers: PeerRegistry::new(),
            table: SubscriptionTable::new(),
            flights: FlightStore::new(),
        }
    }

    async fn body_text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn json_bytes(value: serde_json::Value) -> Bytes {
        Bytes::from(value.to_string())
    }

    #[tokio::test]
    async fn register_with_empty_body_names_both_fields() {
        let state = test_state();
        let resp = register(State(state), Bytes::new()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(resp).await, "missing parameters: \"key\", \"url\"");
    }

    #[tokio::test]
    async fn register_without_url_uses_singular_message() {
        let state = test_state();
        let body = json_bytes(serde_json::json!({"key": "echo"}));
        let resp = register(State(state), body).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(resp).await, "missing parameter: \"url\"");
    }

    #[tokio::test]
    async fn register_stores_peer_and_returns_empty_200() {
        let state = test_state();
        let body = json_bytes(serde_json::json!({
            "key": "echo",
            "url": "http://localhost:9000"
        }));

        let resp = register(State(state.clone()), body).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.is_empty());

        let record = state.peers.get("echo").await.unwrap();
        assert_eq!(record.url, "http://localhost:9000");
        assert_eq!(record.count, 1);
    }

    #[tokio::test]
    async fn register_rejects_malformed_json() {
        let state = test_state();
        let resp = register(State(state), Bytes::from_static(b"{not json")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(resp).await.starts_with("invalid JSON body"));
    }

    #[tokio::test]
    async fn subscribe_requires_key() {
        let state = test_state();
        let body = json_bytes(serde_json::json!({"method": "GET", "path": "/x"}));
        let resp = subscribe(State(state), body).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(resp).await, "missing parameter: \"key\"");
    }

    #[tokio::test]
    async fn subscribe_fills_in_defaults() {
        let state = test_state();
        let body = json_bytes(serde_json::json!({"key": "echo"}));

        let resp = subscribe(State(state.clone()), body).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let entries = state.table.snapshot().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].method, "GET");
        assert_eq!(entries[0].path, "*");
        assert_eq!(entries[0].key, "echo");
        assert!(entries[0].require.is_empty());
    }

    #[tokio::test]
    async fn subscribe_normalizes_method_and_keeps_require() {
        let state = test_state();
        let body = json_bytes(serde_json::json!({
            "method": "post",
            "path": "/orders",
            "key": "billing",
            "require": ["auth"]
        }));

        subscribe(State(state.clone()), body).await;

        let entries = state.table.snapshot().await;
        assert_eq!(entries[0].method, "POST");
        assert_eq!(entries[0].require, vec!["auth".to_string()]);
    }

    #[tokio::test]
    async fn table_exposes_subscriptions_and_peers() {
        let state = test_state();
        state.peers.register("echo", "http://localhost:9000").await;
        state.table.add("GET", "/hello", "echo", vec![]).await;

        let resp = table(State(state)).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(json["peers"]["echo"]["url"], "http://localhost:9000");
        assert_eq!(json["peers"]["echo"]["count"], 1);

        let subs = json["subscriptions"].as_object().unwrap();
        assert_eq!(subs.len(), 1);
        let entry = subs.values().next().unwrap();
        assert_eq!(entry["key"], "echo");
        assert_eq!(entry["path"], "/hello");
    }

    #[tokio::test]
    async fn accessors_reject_unknown_flight_id() {
        let state = test_state();
        let id = || Path("no-such-flight".to_string());

        let resp = get_request_headers(State(state.clone()), id()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = put_response_body(State(state.clone()), id(), Bytes::from_static(b"x")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = get_response_status(State(state.clone()), id()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        assert!(state.flights.is_empty().await);
    }

    #[tokio::test]
    async fn put_headers_merges_across_calls() {
        let state = test_state();
        let id = state.flights.create("GET", "/x").await;

        let first = json_bytes(serde_json::json!({"x-step": "one"}));
        let resp =
            put_response_headers(State(state.clone()), Path(id.clone()), first).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let second = json_bytes(serde_json::json!({"x-other": "two"}));
        put_response_headers(State(state.clone()), Path(id.clone()), second).await;

        let resp = get_response_headers(State(state), Path(id)).await;
        let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(json["x-step"], "one");
        assert_eq!(json["x-other"], "two");
    }

    #[tokio::test]
    async fn put_body_replaces_previous_body() {
        let state = test_state();
        let id = state.flights.create("GET", "/x").await;

        put_response_body(State(state.clone()), Path(id.clone()), Bytes::from_static(b"first"))
            .await;
        put_response_body(
            State(state.clone()),
            Path(id.clone()),
            Bytes::from_static(b"second"),
        )
        .await;

        let resp = get_response_body(State(state), Path(id)).await;
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
        assert_eq!(body_text(resp).await, "second");
    }

    #[tokio::test]
    async fn request_body_accessor_round_trips() {
        let state = test_state();
        let id = state.flights.create("POST", "/ingest").await;

        put_request_body(
            State(state.clone()),
            Path(id.clone()),
            Bytes::from_static(b"payload"),
        )
        .await;

        let resp = get_request_body(State(state), Path(id)).await;
        assert_eq!(body_text(resp).await, "payload");
    }

    #[tokio::test]
    async fn status_round_trips_and_validates_range() {
        let state = test_state();
        let id = state.flights.create("GET", "/x").await;

        // Unset reads back as null.
        let resp = get_response_status(State(state.clone()), Path(id.clone())).await;
        let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert!(json["status"].is_null());

        let resp = put_response_status(
            State(state.clone()),
            Path(id.clone()),
            json_bytes(serde_json::json!({"status": 201})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = get_response_status(State(state.clone()), Path(id.clone())).await;
        let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(json["status"], 201);

        let resp = put_response_status(
            State(state.clone()),
            Path(id.clone()),
            json_bytes(serde_json::json!({"status": 600})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = put_response_status(
            State(state.clone()),
            Path(id.clone()),
            json_bytes(serde_json::json!({"status": 99})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = put_response_status(State(state), Path(id), json_bytes(serde_json::json!({})))
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn request_and_response_headers_stay_separate() {
        let state = test_state();
        let id = state.flights.create("GET", "/x").await;

        put_request_headers(
            State(state.clone()),
            Path(id.clone()),
            json_bytes(serde_json::json!({"inbound": "1"})),
        )
        .await;

        let resp = get_response_headers(State(state), Path(id)).await;
        let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert!(json.as_object().unwrap().is_empty());
    }
}
