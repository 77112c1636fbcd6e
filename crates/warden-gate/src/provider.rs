//! Manifest provider abstraction.
//!
//! A provider fetches the current authority manifest together with its
//! stored hash and signature blob. The gate never reads manifests itself.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;
use crate::manifest::{AuthorityManifest, AuthorityMap};

/// Source of authority manifests.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait ManifestProvider: Send + Sync {
    /// Load the manifest and compute its hash and signature checks.
    async fn get_authority_map(&self) -> Result<AuthorityMap, ProviderError>;
}

/// What a [`StaticManifestProvider`] serves.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    pub document: Value,
    pub expected_hash: Option<String>,
    pub signature_blob: Option<Vec<u8>>,
}

impl ManifestSource {
    /// A source whose stored hash matches the document and whose signature
    /// blob is present.
    pub fn attested(document: Value) -> Self {
        let expected_hash = AuthorityManifest::from_value(document.clone())
            .ok()
            .map(|m| m.manifest_hash());
        Self {
            document,
            expected_hash,
            signature_blob: Some(b"attested".to_vec()),
        }
    }
}

/// In-memory provider for embedding and tests.
///
/// The served source can be swapped at runtime; every fetch is counted.
#[derive(Debug)]
pub struct StaticManifestProvider {
    source: RwLock<ManifestSource>,
    fetches: AtomicUsize,
}

impl StaticManifestProvider {
    pub fn new(source: ManifestSource) -> Self {
        Self {
            source: RwLock::new(source),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Replace the served source.
    pub fn replace(&self, source: ManifestSource) {
        *self.source.write().unwrap() = source;
    }

    /// Number of fetches served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManifestProvider for StaticManifestProvider {
    async fn get_authority_map(&self) -> Result<AuthorityMap, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let source = self.source.read().unwrap().clone();
        let manifest = AuthorityManifest::from_value(source.document)?;
        Ok(AuthorityMap::assemble(
            manifest,
            source.expected_hash,
            source.signature_blob.as_deref(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_provider_serves_and_counts() {
        let provider = StaticManifestProvider::new(ManifestSource::attested(json!({
            "binding_table": [],
        })));

        let map = provider.get_authority_map().await.unwrap();
        assert!(map.hash_matches);
        assert!(map.has_signature_file);
        assert_eq!(provider.fetch_count(), 1);

        provider.replace(ManifestSource {
            document: json!("not an object"),
            expected_hash: None,
            signature_blob: None,
        });
        assert!(matches!(
            provider.get_authority_map().await,
            Err(ProviderError::Malformed(_))
        ));
        assert_eq!(provider.fetch_count(), 2);
    }
}
