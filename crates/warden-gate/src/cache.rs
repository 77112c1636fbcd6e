//! Short-lived manifest cache owned by a gate.
//!
//! Readers share the cached value while it is fresh. A miss takes the write
//! lock and re-checks before fetching, so concurrent misses cause a single
//! provider call. Failed loads are never cached.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::ProviderError;
use crate::manifest::AuthorityMap;
use crate::provider::ManifestProvider;

#[derive(Debug)]
struct CachedManifest {
    map: Arc<AuthorityMap>,
    loaded_at: Instant,
}

/// A single cached manifest with a fixed time-to-live.
#[derive(Debug)]
pub struct ManifestCache {
    ttl: Duration,
    slot: RwLock<Option<CachedManifest>>,
}

impl ManifestCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached manifest, loading it from `provider` when stale,
    /// absent, or when `force` is set.
    pub async fn get_or_load(
        &self,
        provider: &dyn ManifestProvider,
        force: bool,
    ) -> Result<Arc<AuthorityMap>, ProviderError> {
        if !force {
            if let Some(map) = self.fresh(&*self.slot.read().await) {
                return Ok(map);
            }
        }

        let mut slot = self.slot.write().await;
        if !force {
            if let Some(map) = self.fresh(&slot) {
                return Ok(map);
            }
        }

        let map = Arc::new(provider.get_authority_map().await?);
        let duplicates = map.manifest.duplicate_bindings();
        if !duplicates.is_empty() {
            tracing::warn!(
                count = duplicates.len(),
                manifest_hash = %map.hash,
                "Authority manifest has duplicate binding rows; first match wins"
            );
        }
        tracing::debug!(manifest_hash = %map.hash, forced = force, "Loaded authority manifest");

        *slot = Some(CachedManifest {
            map: Arc::clone(&map),
            loaded_at: Instant::now(),
        });
        Ok(map)
    }

    /// Drop the cached value.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    fn fresh(&self, slot: &Option<CachedManifest>) -> Option<Arc<AuthorityMap>> {
        slot.as_ref()
            .filter(|cached| cached.loaded_at.elapsed() < self.ttl)
            .map(|cached| Arc::clone(&cached.map))
    }
}
