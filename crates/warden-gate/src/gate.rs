//! The authority gate state machine.
//!
//! ## Checks
//!
//! Every request runs the same strictly ordered checks and stops at the
//! first failure:
//!
//! ```text
//! MANIFEST_LOAD -> G2 (hash + dual signature) -> G3 (effective time) -> G1 (binding) -> ALLOW
//! ```
//!
//! | Check         | Failure code                      | Status |
//! |---------------|-----------------------------------|--------|
//! | MANIFEST_LOAD | `MANIFEST_UNAVAILABLE`            | 503    |
//! | G2            | `UNSIGNED_MANIFEST`               | 403    |
//! | G2            | `G2_DUO_SIG_MISMATCH`             | 403    |
//! | G3            | `G3_AUTH_MAP_NOT_YET_EFFECTIVE`   | 503    |
//! | G1            | `G1_SCOPE_VIOLATION`              | 403    |
//!
//! The manifest is re-verified on every request; only the fetched document
//! is cached, for at most the configured TTL.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::binding::{resolve_binding, GateRequest};
use crate::cache::ManifestCache;
use crate::config::GateConfig;
use crate::error::Result;
use crate::manifest::{AuthorityManifest, AuthorityMap, BindingTuple};
use crate::provider::ManifestProvider;
use crate::sink::{GateCheckEvent, LedgerSink, SinkFailureLog};

/// Machine-readable rejection codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "MANIFEST_UNAVAILABLE")]
    ManifestUnavailable,
    #[serde(rename = "UNSIGNED_MANIFEST")]
    UnsignedManifest,
    #[serde(rename = "G2_DUO_SIG_MISMATCH")]
    DuoSignatureMismatch,
    #[serde(rename = "G3_AUTH_MAP_NOT_YET_EFFECTIVE")]
    NotYetEffective,
    #[serde(rename = "G1_SCOPE_VIOLATION")]
    ScopeViolation,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ManifestUnavailable => "MANIFEST_UNAVAILABLE",
            ErrorCode::UnsignedManifest => "UNSIGNED_MANIFEST",
            ErrorCode::DuoSignatureMismatch => "G2_DUO_SIG_MISMATCH",
            ErrorCode::NotYetEffective => "G3_AUTH_MAP_NOT_YET_EFFECTIVE",
            ErrorCode::ScopeViolation => "G1_SCOPE_VIOLATION",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::ManifestUnavailable | ErrorCode::NotYetEffective => 503,
            ErrorCode::UnsignedManifest
            | ErrorCode::DuoSignatureMismatch
            | ErrorCode::ScopeViolation => 403,
        }
    }

    /// 503-class codes may succeed on retry; 403-class codes will not.
    pub fn is_retryable(&self) -> bool {
        self.http_status() == 503
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal rejection.
///
/// Serializes as `{"error_code": ..., "details": {...}}`; the status is
/// carried separately for the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateRejection {
    #[serde(skip)]
    pub status: u16,
    pub error_code: ErrorCode,
    pub details: Value,
}

impl GateRejection {
    pub fn new(error_code: ErrorCode, details: Value) -> Self {
        Self {
            status: error_code.http_status(),
            error_code,
            details,
        }
    }

    /// Which check failed, as recorded in `details.check`.
    pub fn check(&self) -> Option<&str> {
        self.details.get("check").and_then(Value::as_str)
    }

    pub fn reason(&self) -> Option<&str> {
        self.details.get("reason").and_then(Value::as_str)
    }
}

/// What an allowed request carries forward.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorizedContext {
    pub binding: BindingTuple,
    pub manifest_hash: String,
    /// Epoch milliseconds.
    pub effective_after: i64,
    pub maker_key: String,
    pub checker_key: String,
    pub checked_at: DateTime<Utc>,
}

/// Outcome of one gate evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Allow(AuthorizedContext),
    Deny(GateRejection),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow(_))
    }

    pub fn into_result(self) -> std::result::Result<AuthorizedContext, GateRejection> {
        match self {
            GateDecision::Allow(context) => Ok(context),
            GateDecision::Deny(rejection) => Err(rejection),
        }
    }
}

/// The authority gate.
///
/// Holds no per-request state; the only mutable state is the manifest cache.
pub struct Gate {
    provider: Arc<dyn ManifestProvider>,
    sink: Arc<dyn LedgerSink>,
    cache: ManifestCache,
    config: GateConfig,
    sink_failures: SinkFailureLog,
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate").field("config", &self.config).finish()
    }
}

impl Gate {
    /// Create a gate. Fails if `config` is out of bounds.
    pub fn new(
        provider: Arc<dyn ManifestProvider>,
        sink: Arc<dyn LedgerSink>,
        config: GateConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cache: ManifestCache::new(config.cache_ttl),
            sink_failures: SinkFailureLog::new(config.sink_warn_interval),
            provider,
            sink,
            config,
        })
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Evaluate a request against the current manifest.
    pub async fn evaluate(&self, request: &GateRequest) -> GateDecision {
        self.evaluate_at(request, Utc::now(), false).await
    }

    /// Evaluate after reloading the manifest, ignoring the cache.
    pub async fn evaluate_forced(&self, request: &GateRequest) -> GateDecision {
        self.evaluate_at(request, Utc::now(), true).await
    }

    /// Evaluate as of `now`.
    pub async fn evaluate_at(
        &self,
        request: &GateRequest,
        now: DateTime<Utc>,
        force: bool,
    ) -> GateDecision {
        let map = match self.cache.get_or_load(self.provider.as_ref(), force).await {
            Ok(map) => map,
            Err(e) => {
                return deny(GateRejection::new(
                    ErrorCode::ManifestUnavailable,
                    json!({
                        "check": "manifest_load",
                        "reason": e.to_string(),
                        "transient": e.is_transient(),
                    }),
                ))
            }
        };

        if let Err(rejection) = check_attestation(&map) {
            return deny(rejection);
        }
        let effective_after =
            match check_effective(&map.manifest, now, self.config.clock_skew_secs) {
                Ok(ms) => ms,
                Err(rejection) => return deny(rejection),
            };
        let binding = match check_scope(&map.manifest, request) {
            Ok(binding) => binding,
            Err(rejection) => return deny(rejection),
        };

        let context = AuthorizedContext {
            binding,
            manifest_hash: map.hash.clone(),
            effective_after,
            maker_key: map.manifest.maker_key().unwrap_or_default().to_string(),
            checker_key: map.manifest.checker_key().unwrap_or_default().to_string(),
            checked_at: now,
        };
        tracing::info!(
            avatar = %context.binding.avatar,
            vessel = %context.binding.vessel,
            capsule = %context.binding.capsule,
            gate = %context.binding.gate,
            manifest_hash = %context.manifest_hash,
            "Gate allowed request"
        );

        self.notify_sink(&GateCheckEvent {
            binding: context.binding.clone(),
            manifest_hash: context.manifest_hash.clone(),
            outcome: "ALLOW".into(),
            checked_at: now,
        })
        .await;

        GateDecision::Allow(context)
    }

    async fn notify_sink(&self, event: &GateCheckEvent) {
        let timeout = self.config.sink_timeout;
        let error = match tokio::time::timeout(timeout, self.sink.record_gate_check(event)).await
        {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {timeout:?}"),
        };
        self.sink_failures.record(&error);
    }
}

fn deny(rejection: GateRejection) -> GateDecision {
    tracing::warn!(
        error_code = %rejection.error_code,
        status = rejection.status,
        check = rejection.check().unwrap_or("unknown"),
        reason = rejection.reason().unwrap_or(""),
        "Gate rejected request"
    );
    GateDecision::Deny(rejection)
}

// ─────────────────────────────────────────────────────────────────────────────
// Checks
// ─────────────────────────────────────────────────────────────────────────────

/// G2: stored hash matches, signature blob present, both signatures verify.
fn check_attestation(map: &AuthorityMap) -> std::result::Result<(), GateRejection> {
    let unsigned = |reason: &str| {
        GateRejection::new(
            ErrorCode::UnsignedManifest,
            json!({
                "check": "G2",
                "reason": reason,
                "expected_hash": map.expected_hash,
                "computed_hash": map.hash,
            }),
        )
    };

    if map.expected_hash.is_none() {
        return Err(unsigned("hash_missing"));
    }
    if !map.hash_matches {
        return Err(unsigned("hash_mismatch"));
    }
    if !map.has_signature_file {
        return Err(unsigned("signature_missing"));
    }
    if !map.duo.ok {
        return Err(GateRejection::new(
            ErrorCode::DuoSignatureMismatch,
            json!({
                "check": "G2",
                "reason": "duo_signature_mismatch",
                "errors": map.duo.errors,
                "maker": map.duo.maker,
                "checker": map.duo.checker,
            }),
        ));
    }
    Ok(())
}

/// G3: `effective_after - skew <= now`. Returns `effective_after` in ms.
fn check_effective(
    manifest: &AuthorityManifest,
    now: DateTime<Utc>,
    skew_secs: u64,
) -> std::result::Result<i64, GateRejection> {
    let Some(effective_after) = manifest.effective_after_ms() else {
        return Err(GateRejection::new(
            ErrorCode::NotYetEffective,
            json!({
                "check": "G3",
                "reason": "unparseable",
                "effective_after": manifest.effective_after(),
            }),
        ));
    };

    let now_ms = now.timestamp_millis();
    let skew_ms = i64::try_from(skew_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
    if effective_after.saturating_sub(skew_ms) > now_ms {
        return Err(GateRejection::new(
            ErrorCode::NotYetEffective,
            json!({
                "check": "G3",
                "reason": "not_yet_effective",
                "effective_after": effective_after,
                "now": now_ms,
                "skew_secs": skew_secs,
            }),
        ));
    }
    Ok(effective_after)
}

/// G1: the normalized request matches a normalized table row.
fn check_scope(
    manifest: &AuthorityManifest,
    request: &GateRequest,
) -> std::result::Result<BindingTuple, GateRejection> {
    let Some(requested) = resolve_binding(request) else {
        return Err(GateRejection::new(
            ErrorCode::ScopeViolation,
            json!({"check": "G1", "reason": "binding_missing"}),
        ));
    };

    manifest.find_binding(&requested).cloned().ok_or_else(|| {
        GateRejection::new(
            ErrorCode::ScopeViolation,
            json!({
                "check": "G1",
                "reason": "no_matching_binding",
                "binding": requested.normalized(),
            }),
        )
    })
}
