//! switchboard-gateway — data plane of the broker.
//!
//! Accepts arbitrary inbound HTTP requests, captures each one as a flight
//! in the shared store, runs the dependency-ordered dispatcher over the
//! matching subscriptions, and assembles the outer response from whatever
//! the notified peers wrote back.
//!
//! # Request lifecycle
//!
//! ```text
//! inbound request
//!   │
//!   ├── bounded body read (413 over limit)
//!   ├── flight created, body + headers captured
//!   ├── compiled router → matched subscriptions (none → 404)
//!   ├── dispatcher notifies peers in dependency order
//!   │     (cycle → 500, unknown peer → 502, failure → 502, timeout → 504)
//!   ▼
//! outer response = stored status + headers + body, flight removed
//! ```

pub mod server;

pub use server::Gateway;
