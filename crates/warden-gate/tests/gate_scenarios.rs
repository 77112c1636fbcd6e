//! End-to-end gate behavior against signed manifests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use warden_core::verify_ledger;
use warden_gate::{
    ErrorCode, Gate, GateCheckEvent, GateConfig, GateRequest, LedgerSink, ManifestSource,
    MemoryLedgerSink, NullLedgerSink, SinkError, StaticManifestProvider,
};
use warden_testkit::{scenario_bindings, TestFixture};

const NOW_MS: i64 = 1_750_000_000_000;

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(NOW_MS).unwrap()
}

fn gate_with(source: ManifestSource, sink: Arc<dyn LedgerSink>, skew: u64) -> Gate {
    let config = GateConfig {
        clock_skew_secs: skew,
        ..GateConfig::default()
    };
    Gate::new(Arc::new(StaticManifestProvider::new(source)), sink, config).unwrap()
}

fn effective_manifest(fixture: &TestFixture) -> Value {
    fixture.signed_manifest(scenario_bindings(), json!(NOW_MS - 60_000))
}

fn celine_request() -> GateRequest {
    GateRequest::new().with_body(json!({
        "avatar": "Celine",
        "vessel": " AURORA ",
        "capsule": "LUMA",
        "gate": "thrust_control",
    }))
}

#[tokio::test]
async fn scenario_a_authorized_binding_is_allowed() {
    let fixture = TestFixture::new();
    let manifest = effective_manifest(&fixture);
    let gate = gate_with(ManifestSource::attested(manifest), Arc::new(NullLedgerSink), 30);

    let context = gate
        .evaluate_at(&celine_request(), now(), false)
        .await
        .into_result()
        .expect("Celine should be allowed");

    assert_eq!(context.binding.vessel, "aurora");
    assert_eq!(context.binding.gate, "THRUST_CONTROL");
    assert_eq!(context.effective_after, NOW_MS - 60_000);
    assert_eq!(context.maker_key, fixture.maker.public_key().to_hex());
    assert_eq!(context.checked_at, now());
}

#[tokio::test]
async fn scenario_b_unknown_binding_is_scope_violation() {
    let fixture = TestFixture::new();
    let gate = gate_with(
        ManifestSource::attested(effective_manifest(&fixture)),
        Arc::new(NullLedgerSink),
        30,
    );
    let request = GateRequest::new().with_body(json!({
        "binding": {
            "avatar": "Spryte",
            "vessel": "Halcyon",
            "capsule": "dot",
            "gate": "MISSION_PLANNER",
        }
    }));

    let rejection = gate
        .evaluate_at(&request, now(), false)
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(rejection.error_code, ErrorCode::ScopeViolation);
    assert_eq!(rejection.status, 403);
    assert_eq!(rejection.reason(), Some("no_matching_binding"));
    assert_eq!(rejection.details["binding"]["vessel"], "halcyon");
}

#[tokio::test]
async fn scenario_c_future_manifest_is_not_yet_effective() {
    let fixture = TestFixture::new();
    let manifest = fixture.signed_manifest(scenario_bindings(), json!(NOW_MS + 3_600_000));
    let gate = gate_with(ManifestSource::attested(manifest), Arc::new(NullLedgerSink), 0);

    let rejection = gate
        .evaluate_at(&celine_request(), now(), false)
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(rejection.error_code, ErrorCode::NotYetEffective);
    assert_eq!(rejection.status, 503);
    assert!(rejection.error_code.is_retryable());
    assert_eq!(rejection.details["now"], json!(NOW_MS));
}

#[tokio::test]
async fn skew_tolerates_slightly_early_manifests() {
    let fixture = TestFixture::new();
    let manifest = fixture.signed_manifest(scenario_bindings(), json!(NOW_MS + 20_000));

    let lenient = gate_with(
        ManifestSource::attested(manifest.clone()),
        Arc::new(NullLedgerSink),
        30,
    );
    assert!(lenient
        .evaluate_at(&celine_request(), now(), false)
        .await
        .is_allowed());

    let strict = gate_with(ManifestSource::attested(manifest), Arc::new(NullLedgerSink), 10);
    assert!(!strict
        .evaluate_at(&celine_request(), now(), false)
        .await
        .is_allowed());
}

#[tokio::test]
async fn rfc3339_effective_after_is_accepted() {
    let fixture = TestFixture::new();
    let manifest = fixture.signed_manifest(scenario_bindings(), json!("2024-01-01T00:00:00Z"));
    let gate = gate_with(ManifestSource::attested(manifest), Arc::new(NullLedgerSink), 30);

    assert!(gate
        .evaluate_at(&celine_request(), now(), false)
        .await
        .is_allowed());
}

#[tokio::test]
async fn float_millis_effective_after_is_accepted() {
    let fixture = TestFixture::new();
    let past = (NOW_MS - 60_000) as f64 + 0.25;
    let manifest = fixture.signed_manifest(scenario_bindings(), json!(past));
    let gate = gate_with(ManifestSource::attested(manifest), Arc::new(NullLedgerSink), 0);

    let context = gate
        .evaluate_at(&celine_request(), now(), false)
        .await
        .into_result()
        .expect("float timestamp in the past should be effective");
    assert_eq!(context.effective_after, NOW_MS - 60_000);

    let future = fixture.signed_manifest(scenario_bindings(), json!((NOW_MS + 3_600_000) as f64));
    let gate = gate_with(ManifestSource::attested(future), Arc::new(NullLedgerSink), 0);
    let rejection = gate
        .evaluate_at(&celine_request(), now(), false)
        .await
        .into_result()
        .unwrap_err();
    assert_eq!(rejection.reason(), Some("not_yet_effective"));
}

#[tokio::test]
async fn unparseable_effective_after_is_rejected() {
    let fixture = TestFixture::new();
    let manifest = fixture.signed_manifest(scenario_bindings(), json!("whenever"));
    let gate = gate_with(ManifestSource::attested(manifest), Arc::new(NullLedgerSink), 30);

    let rejection = gate
        .evaluate_at(&celine_request(), now(), false)
        .await
        .into_result()
        .unwrap_err();
    assert_eq!(rejection.error_code, ErrorCode::NotYetEffective);
    assert_eq!(rejection.reason(), Some("unparseable"));
}

#[tokio::test]
async fn unsigned_manifest_rejected_before_binding_check() {
    let fixture = TestFixture::new();
    let manifest = effective_manifest(&fixture);
    let source = ManifestSource {
        signature_blob: None,
        ..ManifestSource::attested(manifest)
    };
    let gate = gate_with(source, Arc::new(NullLedgerSink), 30);

    let rejection = gate
        .evaluate_at(&celine_request(), now(), false)
        .await
        .into_result()
        .unwrap_err();
    assert_eq!(rejection.error_code, ErrorCode::UnsignedManifest);
    assert_eq!(rejection.reason(), Some("signature_missing"));
}

#[tokio::test]
async fn edited_manifest_fails_hash_check() {
    let fixture = TestFixture::new();
    let manifest = effective_manifest(&fixture);
    let mut source = ManifestSource::attested(manifest);
    source.document["binding_table"][0]["avatar"] = json!("Mallory");

    let gate = gate_with(source, Arc::new(NullLedgerSink), 30);
    let rejection = gate
        .evaluate_at(&celine_request(), now(), false)
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(rejection.error_code, ErrorCode::UnsignedManifest);
    assert_eq!(rejection.reason(), Some("hash_mismatch"));
    assert_ne!(
        rejection.details["expected_hash"],
        rejection.details["computed_hash"]
    );
}

#[tokio::test]
async fn flipped_checker_signature_is_duo_mismatch() {
    let fixture = TestFixture::new();
    let mut manifest = effective_manifest(&fixture);
    let checker = manifest["signatures"]["checker"].as_str().unwrap().to_string();
    let mut sig = warden_core::decode_signature(&checker).unwrap();
    sig.0[10] ^= 0x01;
    manifest["signatures"]["checker"] = json!(sig.to_hex());

    // Stored hash is recomputed, so only the signature check can fail.
    let gate = gate_with(ManifestSource::attested(manifest), Arc::new(NullLedgerSink), 30);
    let rejection = gate
        .evaluate_at(&celine_request(), now(), false)
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(rejection.error_code, ErrorCode::DuoSignatureMismatch);
    assert_eq!(rejection.details["errors"], json!(["checker signature invalid"]));
    assert_eq!(rejection.details["maker"]["verified"], json!(true));
}

#[tokio::test]
async fn flipped_maker_signature_is_duo_mismatch() {
    let fixture = TestFixture::new();
    let mut manifest = effective_manifest(&fixture);
    let maker = manifest["signatures"]["maker"].as_str().unwrap().to_string();
    let mut sig = warden_core::decode_signature(&maker).unwrap();
    sig.0[0] ^= 0x80;
    manifest["signatures"]["maker"] = json!(sig.to_hex());

    let gate = gate_with(ManifestSource::attested(manifest), Arc::new(NullLedgerSink), 30);
    let rejection = gate
        .evaluate_at(&celine_request(), now(), false)
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(rejection.error_code, ErrorCode::DuoSignatureMismatch);
    assert_eq!(rejection.details["errors"], json!(["maker signature invalid"]));
    assert_eq!(rejection.details["maker"]["verified"], json!(false));
    assert_eq!(rejection.details["checker"]["verified"], json!(true));
}

#[tokio::test]
async fn request_without_binding_is_scope_violation() {
    let fixture = TestFixture::new();
    let gate = gate_with(
        ManifestSource::attested(effective_manifest(&fixture)),
        Arc::new(NullLedgerSink),
        30,
    );

    let rejection = gate
        .evaluate_at(&GateRequest::new().with_body(json!({"avatar": "Celine"})), now(), false)
        .await
        .into_result()
        .unwrap_err();
    assert_eq!(rejection.error_code, ErrorCode::ScopeViolation);
    assert_eq!(rejection.reason(), Some("binding_missing"));
}

#[tokio::test]
async fn query_binding_is_used_as_fallback() {
    let fixture = TestFixture::new();
    let gate = gate_with(
        ManifestSource::attested(effective_manifest(&fixture)),
        Arc::new(NullLedgerSink),
        30,
    );
    let request = GateRequest::new().with_query([
        ("avatar", "Orin"),
        ("vessel", "Aurora"),
        ("capsule", "luma"),
        ("gate", "nav_sync"),
    ]);

    assert!(gate.evaluate_at(&request, now(), false).await.is_allowed());
}

#[tokio::test]
async fn allowed_requests_are_recorded_in_ledger() {
    let fixture = TestFixture::new();
    let sink = Arc::new(MemoryLedgerSink::new(fixture.ledger.clone()));
    let gate = gate_with(
        ManifestSource::attested(effective_manifest(&fixture)),
        sink.clone(),
        30,
    );

    assert!(gate.evaluate_at(&celine_request(), now(), false).await.is_allowed());
    let denied = GateRequest::new().with_body(json!({
        "avatar": "Spryte", "vessel": "x", "capsule": "y", "gate": "z"
    }));
    assert!(!gate.evaluate_at(&denied, now(), false).await.is_allowed());
    assert!(gate.evaluate_at(&celine_request(), now(), false).await.is_allowed());

    let entries = sink.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].content().unwrap()["outcome"], "ALLOW");
    assert_eq!(entries[0].content().unwrap()["binding"]["avatar"], "Celine");
    assert!(verify_ledger(&entries, &fixture.ledger_public_key()).ok);
}

struct FailingSink {
    calls: AtomicUsize,
}

#[async_trait]
impl LedgerSink for FailingSink {
    async fn record_gate_check(&self, _event: &GateCheckEvent) -> Result<(), SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Unavailable("ledger offline".into()))
    }
}

struct StalledSink;

#[async_trait]
impl LedgerSink for StalledSink {
    async fn record_gate_check(&self, _event: &GateCheckEvent) -> Result<(), SinkError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

#[tokio::test]
async fn sink_failure_never_blocks_allow() {
    let fixture = TestFixture::new();
    let sink = Arc::new(FailingSink {
        calls: AtomicUsize::new(0),
    });
    let gate = gate_with(
        ManifestSource::attested(effective_manifest(&fixture)),
        sink.clone(),
        30,
    );

    for _ in 0..3 {
        assert!(gate.evaluate_at(&celine_request(), now(), false).await.is_allowed());
    }
    assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn stalled_sink_is_bounded_by_timeout() {
    let fixture = TestFixture::new();
    let gate = gate_with(
        ManifestSource::attested(effective_manifest(&fixture)),
        Arc::new(StalledSink),
        30,
    );

    let started = tokio::time::Instant::now();
    assert!(gate.evaluate_at(&celine_request(), now(), false).await.is_allowed());
    assert!(started.elapsed() <= gate.config().sink_timeout + Duration::from_millis(10));
}

#[tokio::test]
async fn identical_requests_reach_identical_outcomes() {
    let fixture = TestFixture::new();
    let gate = gate_with(
        ManifestSource::attested(effective_manifest(&fixture)),
        Arc::new(NullLedgerSink),
        30,
    );
    let request = GateRequest::new().with_body(json!({
        "avatar": "Spryte", "vessel": "Halcyon", "capsule": "dot", "gate": "MISSION_PLANNER"
    }));

    let first = gate.evaluate_at(&request, now(), false).await;
    let second = gate.evaluate_at(&request, now(), true).await;
    assert_eq!(first, second);
}
