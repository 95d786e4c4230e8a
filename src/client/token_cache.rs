use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

/// In-memory map of instance ID to execution access token.
///
/// Lookups share a read lock; inserts and evictions take the write lock.
/// The lock is never held across an `.await`.
#[derive(Debug, Default)]
pub struct TokenCache {
    tokens: RwLock<HashMap<String, String>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, instance_id: &str, token: String) {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        tokens.insert(instance_id.to_string(), token);
        debug!(instance_id = %instance_id, "Cached access token");
    }

    pub fn get(&self, instance_id: &str) -> Option<String> {
        let tokens = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
        tokens.get(instance_id).cloned()
    }

    /// Remove the token for `instance_id`; a missing entry is a no-op.
    pub fn evict(&self, instance_id: &str) {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        if tokens.remove(instance_id).is_some() {
            debug!(instance_id = %instance_id, "Evicted access token");
        }
    }

    pub fn len(&self) -> usize {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
