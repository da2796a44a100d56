//! hello-peer — a demonstration Switchboard peer.
//!
//! Registers itself with a running broker, subscribes to `GET /hello`, and
//! then serves notifications: on each one it writes "Hello, World!" into
//! the flight's response body through the broker's control plane.
//!
//! Walkthrough (broker on the default ports):
//!
//! ```text
//! switchd &
//! hello-peer &
//! curl http://127.0.0.1:8080/hello
//! Hello, World!
//! ```

use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use bytes::Bytes;
use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "hello-peer", about = "Demonstration Switchboard peer")]
struct Cli {
    /// Base URL of the broker's control plane.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    broker: String,

    /// Port this peer listens on for notifications.
    #[arg(long, default_value = "9000")]
    port: u16,

    /// Peer key to register under.
    #[arg(long, default_value = "hello")]
    key: String,
}

#[derive(Clone)]
struct PeerState {
    broker: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hello_peer=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let base_url = format!("http://127.0.0.1:{}", cli.port);

    // Announce ourselves before serving: register, then subscribe.
    broker_post(
        &cli.broker,
        "/register",
        serde_json::json!({"key": cli.key, "url": base_url}),
    )
    .await?;
    broker_post(
        &cli.broker,
        "/subscribe",
        serde_json::json!({"method": "GET", "path": "/hello", "key": cli.key}),
    )
    .await?;
    info!(key = %cli.key, %base_url, broker = %cli.broker, "registered with broker");

    let app = Router::new()
        .route("/hello", post(notified))
        .with_state(PeerState { broker: cli.broker });

    let addr = SocketAddr::from(([127, 0, 0, 1], cli.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "peer listening for notifications");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Handle one broker notification: write the canned body into the flight.
async fn notified(State(state): State<PeerState>, headers: HeaderMap) -> impl IntoResponse {
    let Some(flight_id) = headers.get("x-micro-id").and_then(|v| v.to_str().ok()) else {
        error!("notification without x-micro-id header");
        return StatusCode::BAD_REQUEST;
    };

    let path = format!("/response/{flight_id}/body");
    match broker_put(&state.broker, &path, Bytes::from_static(b"Hello, World!")).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            error!(error = %e, flight = %flight_id, "failed to write response body");
            StatusCode::BAD_GATEWAY
        }
    }
}

// ── Broker client ──────────────────────────────────────────────

async fn broker_post(broker: &str, path: &str, payload: serde_json::Value) -> anyhow::Result<()> {
    send(broker, "POST", path, Bytes::from(payload.to_string())).await
}

async fn broker_put(broker: &str, path: &str, body: Bytes) -> anyhow::Result<()> {
    send(broker, "PUT", path, body).await
}

async fn send(broker: &str, method: &str, path: &str, body: Bytes) -> anyhow::Result<()> {
    let url = format!("{}{}", broker.trim_end_matches('/'), path);
    let uri: hyper::Uri = url.parse().context("invalid broker URL")?;
    let host = uri.host().context("broker URL has no host")?;
    let address = format!("{host}:{}", uri.port_u16().unwrap_or(80));

    let stream = tokio::net::TcpStream::connect(&address)
        .await
        .with_context(|| format!("connect to broker at {address}"))?;
    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = hyper::Request::builder()
        .method(method)
        .uri(url.as_str())
        .header("host", address.as_str())
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Full::new(body))?;

    let resp = sender.send_request(req).await?;
    let status = resp.status();
    resp.into_body().collect().await?;
    anyhow::ensure!(
        status.is_success(),
        "broker answered {status} for {method} {path}"
    );
    Ok(())
}
