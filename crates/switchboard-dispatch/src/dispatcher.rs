//! Sequential peer notification.
//!
//! Executes a dispatch plan one peer at a time: every planned key is
//! resolved against the registry before the first notification goes out,
//! so a missing registration never leaves a round half dispatched. Peers
//! that were planned only as requirements of others are skipped without a
//! notification once their turn comes up.

use std::time::Duration;

use http_body_util::BodyExt;
use switchboard_router::VisitedSet;
use switchboard_state::PeerRecord;
use tracing::debug;

use crate::error::{DispatchError, DispatchResult};
use crate::plan;

/// Notifies matched peers over HTTP/1.1 in dependency order.
#[derive(Clone)]
pub struct Dispatcher {
    registry: switchboard_state::PeerRegistry,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: switchboard_state::PeerRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Run one dispatch round for a flight.
    ///
    /// `visited` maps each matched peer key to the union of its requirement
    /// lists. Notifications are sent strictly in plan order; the first
    /// failure aborts the remainder of the round.
    pub async fn run(
        &self,
        flight_id: &str,
        path: &str,
        visited: &VisitedSet,
    ) -> DispatchResult<()> {
        if visited.is_empty() {
            return Ok(());
        }

        let order = plan::dispatch_order(visited)?;
        debug!(flight = %flight_id, peers = order.len(), "dispatch plan ready");

        let mut targets: Vec<(&String, Option<PeerRecord>)> = Vec::with_capacity(order.len());
        for key in &order {
            match self.registry.get(key).await {
                Some(record) if visited.contains_key(key) => targets.push((key, Some(record))),
                Some(_) => targets.push((key, None)),
                None => return Err(DispatchError::UnknownPeer(key.clone())),
            }
        }

        for (key, record) in targets {
            match record {
                Some(record) => self.notify(key, &record.url, path, flight_id).await?,
                None => {
                    debug!(peer = %key, flight = %flight_id, "requirement satisfied without notification");
                }
            }
        }

        Ok(())
    }

    /// Notify a single peer, bounded by the configured timeout.
    async fn notify(
        &self,
        key: &str,
        base_url: &str,
        path: &str,
        flight_id: &str,
    ) -> DispatchResult<()> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);
        debug!(peer = %key, flight = %flight_id, %url, "notifying peer");

        match tokio::time::timeout(self.timeout, notify_once(key, &url, flight_id)).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::PeerDispatchFailed {
                key: key.to_string(),
                reason: format!("no response within {:?}", self.timeout),
                timed_out: true,
            }),
        }
    }
}

/// Send the notification request and drain the peer's reply.
///
/// The peer's status code and body are not part of the contract; only
/// completion of the exchange matters. A non-2xx reply is logged and
/// otherwise ignored.
async fn notify_once(key: &str, url: &str, flight_id: &str) -> DispatchResult<()> {
    let fail = |reason: String| DispatchError::PeerDispatchFailed {
        key: key.to_string(),
        reason,
        timed_out: false,
    };

    let uri: http::Uri = url
        .parse()
        .map_err(|e| fail(format!("invalid peer URL {url}: {e}")))?;
    let host = uri
        .host()
        .ok_or_else(|| fail(format!("peer URL {url} has no host")))?;
    let address = format!("{host}:{}", uri.port_u16().unwrap_or(80));

    let stream = tokio::net::TcpStream::connect(&address)
        .await
        .map_err(|e| fail(format!("connect to {address} failed: {e}")))?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| fail(format!("handshake with {address} failed: {e}")))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = http::Request::builder()
        .method("POST")
        .uri(url)
        .header("host", address.as_str())
        .header("content-type", "application/x-www-form-urlencoded")
        .header("content-length", "0")
        .header("x-micro-id", flight_id)
        .body(http_body_util::Empty::<bytes::Bytes>::new())
        .map_err(|e| fail(format!("building notification failed: {e}")))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| fail(format!("request to {url} failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        debug!(peer = %key, %status, %url, "peer answered non-2xx");
    }

    resp.into_body()
        .collect()
        .await
        .map_err(|e| fail(format!("reading reply from {url} failed: {e}")))?;

    debug!(peer = %key, %status, "notification acknowledged");
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────────────
