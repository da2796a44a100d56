//! Flight store: ephemeral per-request state.
//!
//! A flight is created when a request enters the data plane and lives until
//! the broker has assembled the outer response (or the TTL sweeper evicts
//! an abandoned record). Peers read and write the flight's request/response
//! body and headers through the control-plane accessor endpoints while the
//! dispatcher walks them in dependency order.
//!
//! Accessors on an unknown flight id return empty defaults and setters are
//! silent no-ops; the control-plane boundary rejects unknown ids before
//! ever calling in here.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::types::{FlightId, normalize_method};

/// One side of the brokered exchange: a body and a header map.
#[derive(Debug, Default)]
struct Exchange {
    body: Bytes,
    headers: HashMap<String, String>,
}

/// Per-request record held while a flight is in progress.
#[derive(Debug)]
struct FlightRecord {
    /// Original inbound path, query string included. Peer notifications
    /// are dispatched to the peer's base URL plus this path.
    path: String,
    request: Exchange,
    response: Exchange,
    /// Outer response status a peer asked for, if any.
    status: Option<u16>,
    created_at: Instant,
}

/// Thread-safe store of in-flight request state.
///
/// Cloning is cheap; all clones share the same underlying map. Flight ids
/// never collide for the lifetime of the process: a strictly increasing
/// sequence number is folded into the digest, not wall-clock time.
#[derive(Clone, Default)]
pub struct FlightStore {
    flights: Arc<RwLock<HashMap<FlightId, FlightRecord>>>,
    sequence: Arc<AtomicU64>,
}

impl FlightStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new flight for an inbound request and return its id.
    pub async fn create(&self, method: &str, path: &str) -> FlightId {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);

        let mut hasher = Sha256::new();
        hasher.update(seq.to_string().as_bytes());
        hasher.update(normalize_method(method).as_bytes());
        hasher.update(path.as_bytes());
        let id = hex::encode(hasher.finalize());

        let record = FlightRecord {
            path: path.to_string(),
            request: Exchange::default(),
            response: Exchange::default(),
            status: None,
            created_at: Instant::now(),
        };

        let mut flights = self.flights.write().await;
        flights.insert(id.clone(), record);
        debug!(flight_id = %id, method = %method, path = %path, "flight created");
        id
    }

    pub async fn exists(&self, id: &str) -> bool {
        self.flights.read().await.contains_key(id)
    }

    /// Original inbound path of the flight, if it is still live.
    pub async fn path(&self, id: &str) -> Option<String> {
        self.flights.read().await.get(id).map(|f| f.path.clone())
    }

    // ── Request side ───────────────────────────────────────────────

    pub async fn request_body(&self, id: &str) -> Bytes {
        let flights = self.flights.read().await;
        flights
            .get(id)
            .map(|f| f.request.body.clone())
            .unwrap_or_default()
    }

    pub async fn request_headers(&self, id: &str) -> HashMap<String, String> {
        let flights = self.flights.read().await;
        flights
            .get(id)
            .map(|f| f.request.headers.clone())
            .unwrap_or_default()
    }

    /// Replace the captured request body wholesale.
    pub async fn set_request_body(&self, id: &str, body: Bytes) {
        let mut flights = self.flights.write().await;
        if let Some(flight) = flights.get_mut(id) {
            flight.request.body = body;
        }
    }

    /// Merge headers into the request header map. New keys are added,
    /// existing keys overwritten, everything else preserved.
    pub async fn set_request_headers(&self, id: &str, headers: HashMap<String, String>) {
        let mut flights = self.flights.write().await;
        if let Some(flight) = flights.get_mut(id) {
            flight.request.headers.extend(headers);
        }
    }

    // ── Response side ──────────────────────────────────────────────

    pub async fn response_body(&self, id: &str) -> Bytes {
        let flights = self.flights.read().await;
        flights
            .get(id)
            .map(|f| f.response.body.clone())
            .unwrap_or_default()
    }

    pub async fn response_headers(&self, id: &str) -> HashMap<String, String> {
        let flights = self.flights.read().await;
        flights
            .get(id)
            .map(|f| f.response.headers.clone())
            .unwrap_or_default()
    }

    pub async fn response_status(&self, id: &str) -> Option<u16> {
        let flights = self.flights.read().await;
        flights.get(id).and_then(|f| f.status)
    }

    /// Replace the accumulated response body wholesale.
    pub async fn set_response_body(&self, id: &str, body: Bytes) {
        let mut flights = self.flights.write().await;
        if let Some(flight) = flights.get_mut(id) {
            flight.response.body = body;
        }
    }

    /// Merge headers into the response header map. The merge (rather than
    /// replace) semantics are load-bearing: peers typically set one header
    /// at a time and expect earlier writes to survive.
    pub async fn set_response_headers(&self, id: &str, headers: HashMap<String, String>) {
        let mut flights = self.flights.write().await;
        if let Some(flight) = flights.get_mut(id) {
            flight.response.headers.extend(headers);
        }
    }

    pub async fn set_response_status(&self, id: &str, status: u16) {
        let mut flights = self.flights.write().await;
        if let Some(flight) = flights.get_mut(id) {
            flight.status = Some(status);
        }
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Drop a completed flight. Returns true if it existed.
    pub async fn remove(&self, id: &str) -> bool {
        let mut flights = self.flights.write().await;
        flights.remove(id).is_some()
    }

    /// Evict flights older than `ttl`. Returns the number removed.
    pub async fn evict_expired(&self, ttl: Duration) -> usize {
        let mut flights = self.flights.write().await;
        let before = flights.len();
        flights.retain(|_, f| f.created_at.elapsed() <= ttl);
        let evicted = before - flights.len();
        if evicted > 0 {
            debug!(evicted, remaining = flights.len(), "expired flights evicted");
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.flights.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.flights.read().await.is_empty()
    }

    /// Run the eviction loop until the shutdown signal flips.
    ///
    /// Completed flights are removed by the data plane as soon as the outer
    /// response is assembled; this sweeper is the backstop for records
    /// abandoned mid-flight.
    pub async fn run_sweeper(
        &self,
        interval: Duration,
        ttl: Duration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        info!(
            interval_secs = interval.as_secs(),
            ttl_secs = ttl.as_secs(),
            "flight sweeper started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.evict_expired(ttl).await;
                }
                _ = shutdown.changed() => {
                    info!("flight sweeper shutting down");
                    break;
                }
            }
        }
    }
}
