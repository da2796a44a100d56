//! switchboard-api — control plane for the broker.
//!
//! Provides axum route handlers for peer registration, subscription
//! management, table inspection, and the flight-state accessors peers use
//! while a dispatch round is in progress.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/register` | Register a peer's base URL |
//! | POST | `/subscribe` | Declare interest in a method/path pattern |
//! | GET | `/table` | Inspect subscriptions and peers |
//! | GET/PUT | `/request/{flight_id}/headers` | Captured inbound headers |
//! | GET/PUT | `/request/{flight_id}/body` | Captured inbound body |
//! | GET/PUT | `/response/{flight_id}/headers` | Accumulated outer headers |
//! | GET/PUT | `/response/{flight_id}/body` | Accumulated outer body |
//! | GET/PUT | `/response/{flight_id}/status` | Outer status override |
//!
//! Peers routinely send JSON with a non-JSON `content-type`, so every
//! handler takes the raw body and parses it itself instead of relying on
//! the `Json` extractor's content-type check.

pub mod handlers;

use axum::Router;
use axum::routing::{get, post};
use switchboard_state::{FlightStore, PeerRegistry, SubscriptionTable};

/// Shared state for control-plane handlers.
#[derive(Clone)]
pub struct ApiState {
    pub peers: PeerRegistry,
    pub table: SubscriptionTable,
    pub flights: FlightStore,
}

/// Build the complete control-plane router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/subscribe", post(handlers::subscribe))
        .route("/table", get(handlers::table))
        .route(
            "/request/{flight_id}/headers",
            get(handlers::get_request_headers).put(handlers::put_request_headers),
        )
        .route(
            "/request/{flight_id}/body",
            get(handlers::get_request_body).put(handlers::put_request_body),
        )
        .route(
            "/response/{flight_id}/headers",
            get(handlers::get_response_headers).put(handlers::put_response_headers),
        )
        .route(
            "/response/{flight_id}/body",
            get(handlers::get_response_body).put(handlers::put_response_body),
        )
        .route(
            "/response/{flight_id}/status",
            get(handlers::get_response_status).put(handlers::put_response_status),
        )
        .with_state(state)
}
