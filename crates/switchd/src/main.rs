//! switchd — the Switchboard daemon.
//!
//! Single binary that assembles the broker:
//! - Shared state (flight store, subscription table, peer registry)
//! - Compiled router cache
//! - Dependency-ordered dispatcher
//! - Control plane (axum) for registration and flight accessors
//! - Data plane (hyper) for brokered inbound requests
//!
//! # Usage
//!
//! ```text
//! switchd --control-port 8000 --data-port 8080
//! ```

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use switchboard_api::{ApiState, build_router};
use switchboard_dispatch::Dispatcher;
use switchboard_gateway::Gateway;
use switchboard_router::RouterCache;
use switchboard_state::{FlightStore, PeerRegistry, SubscriptionTable};

#[derive(Parser)]
#[command(name = "switchd", about = "Switchboard broker daemon")]
struct Cli {
    /// Address both listeners bind on.
    #[arg(long, default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Control-plane port (registration, subscriptions, flight accessors).
    #[arg(long, default_value = "8000")]
    control_port: u16,

    /// Data-plane port (brokered inbound requests).
    #[arg(long, default_value = "8080")]
    data_port: u16,

    /// Per-peer dispatch deadline in seconds.
    #[arg(long, default_value = "10")]
    dispatch_timeout: u64,

    /// Seconds an abandoned flight may live before the sweeper evicts it.
    #[arg(long, default_value = "60")]
    flight_ttl: u64,

    /// Sweeper wakeup interval in seconds.
    #[arg(long, default_value = "10")]
    sweep_interval: u64,

    /// Maximum inbound data-plane body size in bytes.
    #[arg(long, default_value = "1048576")]
    max_body_bytes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,switchd=debug,switchboard=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!("Switchboard daemon starting");

    // ── Shared broker state ────────────────────────────────────

    let flights = FlightStore::new();
    let table = SubscriptionTable::new();
    let peers = PeerRegistry::new();

    let router_cache = RouterCache::new(table.clone());
    let dispatcher = Dispatcher::new(peers.clone(), Duration::from_secs(cli.dispatch_timeout));
    info!(timeout_secs = cli.dispatch_timeout, "dispatcher initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_shutdown = shutdown_rx.clone();
    let gateway_shutdown = shutdown_rx.clone();

    // ── Background tasks ───────────────────────────────────────

    // Flight sweeper.
    let sweeper_handle = {
        let flights = flights.clone();
        let interval = Duration::from_secs(cli.sweep_interval);
        let ttl = Duration::from_secs(cli.flight_ttl);
        tokio::spawn(async move {
            flights.run_sweeper(interval, ttl, sweeper_shutdown).await;
        })
    };

    // Data plane.
    let gateway = Gateway::new(
        flights.clone(),
        router_cache,
        dispatcher,
        cli.max_body_bytes,
    );
    let data_addr = SocketAddr::from((cli.bind, cli.data_port));
    let data_listener = tokio::net::TcpListener::bind(data_addr).await?;
    let gateway_handle = tokio::spawn(async move {
        if let Err(e) = gateway.serve(data_listener, gateway_shutdown).await {
            error!(error = %e, "data plane failed");
        }
    });

    // ── Control plane ──────────────────────────────────────────

    let api = build_router(ApiState {
        peers,
        table,
        flights,
    });
    let control_addr = SocketAddr::from((cli.bind, cli.control_port));
    info!(%control_addr, "control plane starting");

    let listener = tokio::net::TcpListener::bind(control_addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, api).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background tasks.
    let _ = gateway_handle.await;
    let _ = sweeper_handle.await;

    info!("Switchboard daemon stopped");
    Ok(())
}
