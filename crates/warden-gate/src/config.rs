//! Gate and provider configuration.
//!
//! Both configs have working defaults and can be read from `WARDEN_*`
//! environment variables. Values that are set but do not parse are errors,
//! never silently replaced by defaults.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{GateError, Result};

/// Shortest allowed manifest cache lifetime.
pub const MIN_CACHE_TTL: Duration = Duration::from_secs(5);

/// Longest allowed manifest cache lifetime.
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(10);

/// Configuration for [`crate::Gate`].
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// How long a loaded manifest is reused. Must lie in `[5s, 10s]`.
    pub cache_ttl: Duration,
    /// Tolerated clock difference when checking `effective_after`.
    pub clock_skew_secs: u64,
    /// Upper bound on one ledger sink call.
    pub sink_timeout: Duration,
    /// Minimum spacing between sink failure warnings.
    pub sink_warn_interval: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cache_ttl: MIN_CACHE_TTL,
            clock_skew_secs: 30,
            sink_timeout: Duration::from_secs(2),
            sink_warn_interval: Duration::from_secs(60),
        }
    }
}

impl GateConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`, starting from the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(secs) = parse_var::<u64>(&lookup, "WARDEN_CACHE_TTL_SECS")? {
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "WARDEN_CLOCK_SKEW_SECS")? {
            config.clock_skew_secs = secs;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "WARDEN_SINK_TIMEOUT_MS")? {
            config.sink_timeout = Duration::from_millis(ms);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl < MIN_CACHE_TTL || self.cache_ttl > MAX_CACHE_TTL {
            return Err(GateError::InvalidConfig(format!(
                "cache_ttl must be between {:?} and {:?}, got {:?}",
                MIN_CACHE_TTL, MAX_CACHE_TTL, self.cache_ttl
            )));
        }
        if self.sink_timeout.is_zero() {
            return Err(GateError::InvalidConfig(
                "sink_timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for [`crate::FileManifestProvider`].
#[derive(Debug, Clone)]
pub struct FileProviderConfig {
    /// Path of the manifest JSON; `.hash` and `.sig` siblings sit beside it.
    pub manifest_path: PathBuf,
    /// Upper bound on reading all three files.
    pub fetch_timeout: Duration,
    /// Byte ceiling applied to each file.
    pub max_manifest_bytes: u64,
}

impl FileProviderConfig {
    pub fn new(manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            fetch_timeout: Duration::from_secs(2),
            max_manifest_bytes: 1024 * 1024,
        }
    }

    /// Read from the process environment. `WARDEN_MANIFEST_PATH` is required.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = lookup("WARDEN_MANIFEST_PATH")
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| GateError::InvalidConfig("WARDEN_MANIFEST_PATH is not set".into()))?;

        let mut config = Self::new(path);
        if let Some(ms) = parse_var::<u64>(&lookup, "WARDEN_MANIFEST_TIMEOUT_MS")? {
            config.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(bytes) = parse_var::<u64>(&lookup, "WARDEN_MANIFEST_MAX_BYTES")? {
            config.max_manifest_bytes = bytes;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.manifest_path.as_os_str().is_empty() {
            return Err(GateError::InvalidConfig("manifest_path is empty".into()));
        }
        if self.fetch_timeout.is_zero() {
            return Err(GateError::InvalidConfig(
                "fetch_timeout must be non-zero".into(),
            ));
        }
        if self.max_manifest_bytes == 0 {
            return Err(GateError::InvalidConfig(
                "max_manifest_bytes must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| GateError::InvalidConfig(format!("{key}: cannot parse {raw:?}"))),
    }
}
