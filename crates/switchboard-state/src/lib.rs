//! switchboard-state: shared broker state.
//!
//! Owns the three pieces of process-wide mutable state the broker runs on:
//!
//! - [`FlightStore`]: ephemeral per-request records peers read/write while
//!   a flight is dispatched
//! - [`SubscriptionTable`]: registered interests, digest-keyed, with a
//!   generation counter the router compiler uses for cache invalidation
//! - [`PeerRegistry`]: base URL per peer key
//!
//! All three are `Clone + Send + Sync` handles over `Arc<RwLock<_>>` maps
//! and can be shared freely across async tasks. Nothing here persists:
//! flight state is explicitly ephemeral and the table/registry are rebuilt
//! by peers re-registering after a restart.

pub mod flight;
pub mod registry;
pub mod table;
pub mod types;

pub use flight::FlightStore;
pub use registry::PeerRegistry;
pub use table::SubscriptionTable;
pub use types::*;
