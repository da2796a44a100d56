//! Peer registry: base URL per peer key.
//!
//! Populated by the control plane's registration endpoint and consulted by
//! the dispatcher when it resolves notification targets. The last
//! registration for a key wins; the registration count is kept for
//! inspection via `GET /table`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::types::{PeerKey, PeerRecord};

/// Thread-safe registry of peers. Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct PeerRegistry {
    peers: Arc<RwLock<HashMap<PeerKey, PeerRecord>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or re-register a peer. The URL is overwritten and the
    /// registration count incremented.
    pub async fn register(&self, key: &str, url: &str) -> PeerRecord {
        let mut peers = self.peers.write().await;
        let record = peers
            .entry(key.to_string())
            .and_modify(|r| {
                r.url = url.to_string();
                r.count += 1;
            })
            .or_insert_with(|| PeerRecord {
                url: url.to_string(),
                count: 1,
            });
        info!(peer = %key, url = %record.url, count = record.count, "peer registered");
        record.clone()
    }

    pub async fn get(&self, key: &str) -> Option<PeerRecord> {
        self.peers.read().await.get(key).cloned()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.peers.read().await.contains_key(key)
    }

    /// Full copy of the registry, for `GET /table`.
    pub async fn snapshot(&self) -> HashMap<PeerKey, PeerRecord> {
        self.peers.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }
}
