//! Natural key to remote id resolution
//!
//! Courses name their instructors instead of pointing at ids, so instructor
//! ids are recorded here as their creation responses arrive and looked up
//! when course payloads are built.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use seed_common::RemoteId;

/// Shared handle over the natural key map. Clones point at the same map.
#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver {
    entries: Arc<RwLock<HashMap<String, RemoteId>>>,
}

impl ReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the id assigned to `key`.
    ///
    /// A repeated key overwrites the earlier id (last write wins) and the
    /// replaced id is returned.
    pub async fn record(&self, key: impl Into<String>, id: RemoteId) -> Option<RemoteId> {
        let key = key.into().trim().to_string();
        let previous = self.entries.write().await.insert(key.clone(), id.clone());

        match &previous {
            Some(old) if *old != id => {
                warn!(
                    key = %key,
                    previous = %old,
                    current = %id,
                    "Natural key repeated, keeping latest id"
                );
            },
            _ => debug!(key = %key, id = %id, "Recorded reference"),
        }

        previous
    }

    pub async fn resolve(&self, key: &str) -> Option<RemoteId> {
        self.entries.read().await.get(key.trim()).cloned()
    }

    /// Resolve a comma-separated list of natural keys.
    ///
    /// Unknown keys are dropped, so the result may be shorter than the input.
    pub async fn resolve_many(&self, keys: &str) -> Vec<RemoteId> {
        let entries = self.entries.read().await;
        let mut ids = Vec::new();

        for key in keys.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            match entries.get(key) {
                Some(id) => ids.push(id.clone()),
                None => debug!(key, "Unresolved reference dropped"),
            }
        }

        ids
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
