//! Dependency-ordered peer dispatch for Switchboard.
//!
//! Turns the matched-peer set of an inbound flight into a deterministic
//! notification plan ([`plan::dispatch_order`]) and executes it one peer at
//! a time ([`Dispatcher`]), delivering a bodiless POST carrying the flight
//! id in the `x-micro-id` header to each matched peer's base URL.

pub mod dispatcher;
pub mod error;
pub mod plan;

pub use dispatcher::Dispatcher;
pub use error::{DispatchError, DispatchResult};
pub use plan::dispatch_order;
