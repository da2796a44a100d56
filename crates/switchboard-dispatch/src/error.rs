//! Error types for the dispatch crate.

use thiserror::Error;

/// Errors surfaced while planning or executing a dispatch round.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The `require` graph of the matched subscriptions contains a cycle,
    /// so no notification order satisfies every dependency.
    #[error("dependency cycle among peers: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    /// A peer named in the plan (matched or required) has no registration.
    #[error("peer not registered: {0}")]
    UnknownPeer(String),

    /// Notifying a peer failed. `timed_out` distinguishes deadline expiry
    /// from transport or protocol failures.
    #[error("dispatch to peer '{key}' failed: {reason}")]
    PeerDispatchFailed {
        key: String,
        reason: String,
        timed_out: bool,
    },
}

/// Convenience alias used throughout the dispatch crate.
pub type DispatchResult<T> = Result<T, DispatchError>;
