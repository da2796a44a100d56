//! Domain types for the broker's shared state.
//!
//! These types represent registered peers and their subscriptions. Both are
//! serializable so the control plane can expose the full table for
//! inspection.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Opaque identifier of an in-flight request.
pub type FlightId = String;

/// Key under which a peer registered itself.
pub type PeerKey = String;

// ── Peers ─────────────────────────────────────────────────────────

/// A registered peer: its externally reachable base URL and how many
/// times it has registered. The last registration for a key wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerRecord {
    /// Base URL the broker dispatches notifications to.
    pub url: String,
    /// Number of registrations seen for this key.
    pub count: u64,
}

// ── Subscriptions ─────────────────────────────────────────────────

/// A peer's declaration of interest in requests matching a method and
/// path pattern, with optional ordering requirements on other peers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionEntry {
    /// HTTP method, stored normalized (uppercase).
    pub method: String,
    /// Path pattern; `*` matches any suffix.
    pub path: String,
    /// The subscribing peer's key.
    pub key: PeerKey,
    /// Peers that must be dispatched before this one.
    pub require: Vec<PeerKey>,
}

impl SubscriptionEntry {
    /// Identity digest of this entry. Re-adding the same
    /// (method, path, key) triple overwrites in place.
    pub fn digest(&self) -> String {
        subscription_digest(&self.method, &self.path, &self.key)
    }
}

/// Digest identifying a subscription by its (method, path, key) triple.
pub fn subscription_digest(method: &str, path: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_method(method).as_bytes());
    hasher.update(path.as_bytes());
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Canonical form of an HTTP method for comparison and hashing.
pub fn normalize_method(method: &str) -> String {
    method.to_ascii_uppercase()
}
