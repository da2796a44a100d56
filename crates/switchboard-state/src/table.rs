//! Subscription table: the set of registered interests.
//!
//! Entries are keyed by their (method, path, key) digest; re-adding the
//! same triple overwrites in place. Every mutation bumps a generation
//! counter, which is how the router compiler knows its cached pipeline is
//! stale. The bump is unconditional, even for no-op upserts. There is no
//! unsubscribe.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::info;

use crate::types::{SubscriptionEntry, normalize_method};

/// Thread-safe subscription table. Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct SubscriptionTable {
    entries: Arc<RwLock<HashMap<String, SubscriptionEntry>>>,
    generation: Arc<AtomicU64>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a subscription and return its digest. Invalidates any
    /// compiled router by bumping the generation.
    pub async fn add(
        &self,
        method: &str,
        path: &str,
        key: &str,
        require: Vec<String>,
    ) -> String {
        let entry = SubscriptionEntry {
            method: normalize_method(method),
            path: path.to_string(),
            key: key.to_string(),
            require,
        };
        let digest = entry.digest();

        {
            let mut entries = self.entries.write().await;
            entries.insert(digest.clone(), entry);
        }
        self.generation.fetch_add(1, Ordering::Release);

        info!(peer = %key, method = %normalize_method(method), path = %path, "subscription added");
        digest
    }

    /// Current table generation. Readers snapshot the generation *before*
    /// taking an entry snapshot so a compiled router is never tagged newer
    /// than the entries it was built from.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// All entries, in no particular order.
    pub async fn snapshot(&self) -> Vec<SubscriptionEntry> {
        self.entries.read().await.values().cloned().collect()
    }

    /// Digest-keyed copy of the table, for `GET /table`.
    pub async fn entries_by_digest(&self) -> HashMap<String, SubscriptionEntry> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
