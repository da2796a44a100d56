//! Lazy router compilation.
//!
//! The compiled pipeline is rebuilt on first use after any table mutation.
//! `RouterCache` compares the generation it compiled at against the table's
//! current generation; a mismatch triggers a recompile from a fresh
//! snapshot. Concurrent rebuilds may race, in which case the newest
//! generation wins the cache slot and the loser still serves a router
//! consistent with the table state it observed.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use switchboard_state::SubscriptionTable;

use crate::compiler::CompiledRouter;

#[derive(Clone)]
pub struct RouterCache {
    table: SubscriptionTable,
    cached: Arc<RwLock<Option<(u64, Arc<CompiledRouter>)>>>,
}

impl RouterCache {
    pub fn new(table: SubscriptionTable) -> Self {
        Self {
            table,
            cached: Arc::new(RwLock::new(None)),
        }
    }

    /// The compiled router for the table's current generation, rebuilding
    /// if the cached one is stale or absent.
    pub async fn current(&self) -> Arc<CompiledRouter> {
        // Generation first, snapshot second: the router we compile is never
        // tagged newer than the entries it was built from.
        let generation = self.table.generation();

        {
            let cached = self.cached.read().await;
            if let Some((cached_generation, router)) = cached.as_ref() {
                if *cached_generation == generation {
                    return Arc::clone(router);
                }
            }
        }

        let entries = self.table.snapshot().await;
        let router = Arc::new(CompiledRouter::compile(&entries));
        debug!(generation, entries = router.len(), "router cache rebuilt");

        let mut cached = self.cached.write().await;
        let stale = cached
            .as_ref()
            .map(|(g, _)| *g < generation)
            .unwrap_or(true);
        if stale {
            *cached = Some((generation, Arc::clone(&router)));
        }
        router
    }
}
