//! Session-scoped tie-break seeds
//!
//! The first feed call of a session creates a seed and persists it through
//! the caller's [`SessionStore`]; later calls reuse it so "load more" pages
//! keep a stable order. Two concurrent first calls may both generate a seed;
//! whichever write lands last is kept.

use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::repository::SessionStore;
use crate::error::Result;

/// Positive 31-bit range, so seeds survive any signed 32-bit session layer
const MAX_SEED: i64 = i32::MAX as i64;

pub fn generate_seed() -> i64 {
    rand::thread_rng().gen_range(1..=MAX_SEED)
}

/// Read-or-create the seed for `session_id`. Never fails: a broken store
/// still yields a usable (if unpersisted) seed.
pub async fn get_or_create_seed(store: &dyn SessionStore, session_id: &str) -> i64 {
    match store.load_seed(session_id).await {
        Ok(Some(seed)) => return seed,
        Ok(None) => {}
        Err(e) => warn!("Failed to load seed for session {}: {}", session_id, e),
    }

    let seed = generate_seed();
    if let Err(e) = store.store_seed(session_id, seed).await {
        warn!("Failed to persist seed for session {}: {}", session_id, e);
    } else {
        debug!("Created feed seed for session {}", session_id);
    }
    seed
}

/// Process-local session store, for single-node deployments and tests
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    seeds: RwLock<HashMap<String, i64>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn forget(&self, session_id: &str) {
        self.seeds.write().await.remove(session_id);
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load_seed(&self, session_id: &str) -> Result<Option<i64>> {
        Ok(self.seeds.read().await.get(session_id).copied())
    }

    async fn store_seed(&self, session_id: &str, seed: i64) -> Result<()> {
        self.seeds.write().await.insert(session_id.to_string(), seed);
        Ok(())
    }
}
