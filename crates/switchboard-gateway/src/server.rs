//! Data-plane HTTP server.
//!
//! `Gateway` owns the shared broker state and serves inbound requests on a
//! pre-bound listener, one tokio task per connection. Every response the
//! caller sees is produced here; dispatch errors are mapped to 5xx, never
//! propagated to hyper.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use switchboard_dispatch::{DispatchError, Dispatcher};
use switchboard_router::RouterCache;
use switchboard_state::FlightStore;

/// Data-plane server. Cloning shares the underlying broker state.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    flights: FlightStore,
    router: RouterCache,
    dispatcher: Dispatcher,
    max_body_bytes: usize,
}

impl Gateway {
    pub fn new(
        flights: FlightStore,
        router: RouterCache,
        dispatcher: Dispatcher,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                flights,
                router,
                dispatcher,
                max_body_bytes,
            }),
        }
    }

    /// Serve connections from an already-bound listener.
    ///
    /// Runs until the shutdown signal flips. Spawns a tokio task per
    /// connection using HTTP/1.1.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let addr = listener
            .local_addr()
            .context("data plane listener has no local address")?;
        info!(%addr, "data plane listening");

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, peer_addr) = accept_result.context("accept failed")?;
                    let inner = self.inner.clone();

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let svc = service_fn(move |req: Request<Incoming>| {
                            let inner = inner.clone();
                            async move { Ok::<_, Infallible>(handle(inner, req).await) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, svc).await {
                            error!(%peer_addr, error = %e, "connection error");
                        }
                    });
                }
                _ = shutdown.changed() => {
                    info!("data plane shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Handle one inbound request end to end.
async fn handle(inner: Arc<GatewayInner>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let method = req.method().as_str().to_string();
    let path = req
        .uri()
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let inbound_headers = flatten_headers(req.headers());

    let body = match Limited::new(req.into_body(), inner.max_body_bytes)
        .collect()
        .await
    {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            debug!(%method, %path, limit = inner.max_body_bytes, "inbound body over limit");
            return text_response(StatusCode::PAYLOAD_TOO_LARGE, "request body too large");
        }
        Err(e) => {
            debug!(%method, %path, error = %e, "failed to read inbound body");
            return text_response(StatusCode::BAD_REQUEST, "failed to read request body");
        }
    };

    let flight_id = inner.flights.create(&method, &path).await;
    inner.flights.set_request_body(&flight_id, body).await;
    inner
        .flights
        .set_request_headers(&flight_id, inbound_headers)
        .await;

    let visited = inner.router.current().await.visited(&method, &path);
    if visited.is_empty() {
        debug!(%method, %path, "no subscriptions matched");
        inner.flights.remove(&flight_id).await;
        return text_response(StatusCode::NOT_FOUND, "");
    }

    if let Err(e) = inner.dispatcher.run(&flight_id, &path, &visited).await {
        warn!(flight = %flight_id, error = %e, "dispatch failed");
        inner.flights.remove(&flight_id).await;
        return dispatch_error_response(&e);
    }

    let response = assemble_response(&inner.flights, &flight_id).await;
    inner.flights.remove(&flight_id).await;
    response
}

/// Flatten inbound headers to a plain string map for the flight store.
/// Repeated names are joined with `", "`; values that are not valid UTF-8
/// are skipped.
fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut flat: HashMap<String, String> = HashMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            debug!(header = %name, "skipping non-UTF-8 inbound header");
            continue;
        };
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    flat
}

/// Build the outer response from the flight's accumulated state.
async fn assemble_response(flights: &FlightStore, flight_id: &str) -> Response<Full<Bytes>> {
    let status = flights
        .response_status(flight_id)
        .await
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::OK);

    let mut response = Response::new(Full::new(flights.response_body(flight_id).await));
    *response.status_mut() = status;

    for (name, value) in flights.response_headers(flight_id).await {
        let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) else {
            warn!(header = %name, "skipping invalid stored response header");
            continue;
        };
        response.headers_mut().insert(name, value);
    }

    response
}

fn dispatch_error_response(err: &DispatchError) -> Response<Full<Bytes>> {
    let status = match err {
        DispatchError::DependencyCycle(_) => StatusCode::INTERNAL_SERVER_ERROR,
        DispatchError::UnknownPeer(_) => StatusCode::BAD_GATEWAY,
        DispatchError::PeerDispatchFailed { timed_out: true, .. } => StatusCode::GATEWAY_TIMEOUT,
        DispatchError::PeerDispatchFailed { .. } => StatusCode::BAD_GATEWAY,
    };
    text_response(status, &err.to_string())
}

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
}

// ── Tests ───────────────────────────────────────────────────────────────────
