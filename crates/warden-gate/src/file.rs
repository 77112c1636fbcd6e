//! Filesystem manifest provider.
//!
//! Reads `authority_map.json` plus its siblings `authority_map.hash` (hex
//! digest) and `authority_map.sig` (opaque signature blob). Missing siblings
//! are reported through the [`AuthorityMap`] flags, not as errors; only the
//! manifest itself is required.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use crate::config::FileProviderConfig;
use crate::error::{self, ProviderError};
use crate::manifest::{AuthorityManifest, AuthorityMap};
use crate::provider::ManifestProvider;

/// Path of a sibling file: same stem, extension replaced.
pub fn sibling_path(manifest_path: &Path, extension: &str) -> PathBuf {
    manifest_path.with_extension(extension)
}

/// Loads manifests from disk with a timeout and a byte ceiling.
#[derive(Debug, Clone)]
pub struct FileManifestProvider {
    config: FileProviderConfig,
}

impl FileManifestProvider {
    /// Create a provider. Fails if `config` is out of bounds.
    pub fn new(config: FileProviderConfig) -> error::Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn manifest_path(&self) -> &Path {
        &self.config.manifest_path
    }

    pub fn hash_path(&self) -> PathBuf {
        sibling_path(&self.config.manifest_path, "hash")
    }

    pub fn signature_path(&self) -> PathBuf {
        sibling_path(&self.config.manifest_path, "sig")
    }

    async fn load(&self) -> Result<AuthorityMap, ProviderError> {
        let limit = self.config.max_manifest_bytes;
        let bytes = read_bounded(&self.config.manifest_path, limit)
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(self.config.manifest_path.display().to_string())
            })?;
        let manifest = AuthorityManifest::from_slice(&bytes)?;

        let expected_hash = read_bounded(&self.hash_path(), limit)
            .await?
            .map(|raw| String::from_utf8_lossy(&raw).trim().to_string());
        let signature = read_bounded(&self.signature_path(), limit).await?;

        Ok(AuthorityMap::assemble(
            manifest,
            expected_hash,
            signature.as_deref(),
        ))
    }
}

#[async_trait]
impl ManifestProvider for FileManifestProvider {
    async fn get_authority_map(&self) -> Result<AuthorityMap, ProviderError> {
        let timeout = self.config.fetch_timeout;
        tokio::time::timeout(timeout, self.load())
            .await
            .map_err(|_| ProviderError::Timeout(timeout))?
    }
}

/// Read a whole file, refusing anything over `limit` bytes.
///
/// Returns `None` when the file does not exist.
async fn read_bounded(path: &Path, limit: u64) -> Result<Option<Vec<u8>>, ProviderError> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if file.metadata().await?.len() > limit {
        return Err(ProviderError::TooLarge { limit });
    }

    // The file may grow between the metadata check and the read.
    let mut bytes = Vec::new();
    file.take(limit + 1).read_to_end(&mut bytes).await?;
    if bytes.len() as u64 > limit {
        return Err(ProviderError::TooLarge { limit });
    }
    Ok(Some(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibling_replaces_extension() {
        let path = Path::new("/etc/warden/authority_map.json");
        assert_eq!(
            sibling_path(path, "hash"),
            PathBuf::from("/etc/warden/authority_map.hash")
        );
        assert_eq!(
            sibling_path(path, "sig"),
            PathBuf::from("/etc/warden/authority_map.sig")
        );
    }

    #[test]
    fn test_new_rejects_zero_limits() {
        let config = FileProviderConfig {
            max_manifest_bytes: 0,
            ..FileProviderConfig::new("authority_map.json")
        };
        assert!(FileManifestProvider::new(config).is_err());
        assert!(FileManifestProvider::new(FileProviderConfig::new("authority_map.json")).is_ok());
    }

    #[tokio::test]
    async fn test_read_bounded_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let got = read_bounded(&dir.path().join("absent.json"), 10).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_read_bounded_enforces_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.json");
        std::fs::write(&path, vec![b' '; 64]).unwrap();

        assert!(matches!(
            read_bounded(&path, 63).await,
            Err(ProviderError::TooLarge { limit: 63 })
        ));
        assert_eq!(read_bounded(&path, 64).await.unwrap().unwrap().len(), 64);
    }
}
