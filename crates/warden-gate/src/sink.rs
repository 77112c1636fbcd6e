//! Ledger sink abstraction.
//!
//! After a request is allowed, the gate reports the check to a ledger sink.
//! Reporting is best-effort: failures never change the gate's decision.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use warden_core::{Keypair, LedgerEntry, LedgerWriter, PublicKey};

use crate::error::SinkError;
use crate::manifest::BindingTuple;

/// Record of one successful gate check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateCheckEvent {
    pub binding: BindingTuple,
    pub manifest_hash: String,
    pub outcome: String,
    pub checked_at: DateTime<Utc>,
}

/// Destination for gate check events.
#[async_trait]
pub trait LedgerSink: Send + Sync {
    async fn record_gate_check(&self, event: &GateCheckEvent) -> Result<(), SinkError>;
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLedgerSink;

#[async_trait]
impl LedgerSink for NullLedgerSink {
    async fn record_gate_check(&self, _event: &GateCheckEvent) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Appends events to an in-memory, hash-chained, signed ledger.
///
/// Appends are serialized by a mutex around a single writer.
#[derive(Debug)]
pub struct MemoryLedgerSink {
    inner: Mutex<MemoryLedgerInner>,
}

#[derive(Debug)]
struct MemoryLedgerInner {
    writer: LedgerWriter,
    entries: Vec<LedgerEntry>,
}

impl MemoryLedgerSink {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            inner: Mutex::new(MemoryLedgerInner {
                writer: LedgerWriter::new(keypair),
                entries: Vec::new(),
            }),
        }
    }

    /// Snapshot of the entries written so far.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.inner.lock().unwrap().entries.clone()
    }

    pub fn public_key(&self) -> PublicKey {
        self.inner.lock().unwrap().writer.public_key()
    }
}

#[async_trait]
impl LedgerSink for MemoryLedgerSink {
    async fn record_gate_check(&self, event: &GateCheckEvent) -> Result<(), SinkError> {
        let content =
            serde_json::to_value(event).map_err(|e| SinkError::Rejected(e.to_string()))?;
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.writer.append(content);
        inner.entries.push(entry);
        Ok(())
    }
}

/// Rate-limits sink failure warnings.
///
/// At most one warning per interval; failures in between are counted and
/// reported with the next warning.
#[derive(Debug)]
pub(crate) struct SinkFailureLog {
    interval: Duration,
    state: Mutex<FailureState>,
}

#[derive(Debug, Default)]
struct FailureState {
    last_warned: Option<Instant>,
    suppressed: u64,
}

impl SinkFailureLog {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Mutex::new(FailureState::default()),
        }
    }

    /// Note a failure; returns whether a warning was emitted.
    pub(crate) fn record(&self, error: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        let due = state
            .last_warned
            .map_or(true, |at| at.elapsed() >= self.interval);
        if !due {
            state.suppressed += 1;
            return false;
        }

        tracing::warn!(
            error = %error,
            suppressed = state.suppressed,
            "Ledger sink failed to record gate check"
        );
        state.last_warned = Some(Instant::now());
        state.suppressed = 0;
        true
    }

    pub(crate) fn suppressed(&self) -> u64 {
        self.state.lock().unwrap().suppressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::verify_ledger;

    fn event(gate: &str) -> GateCheckEvent {
        GateCheckEvent {
            binding: BindingTuple::new("Celine", "aurora", "luma", gate),
            manifest_hash: "ab".repeat(32),
            outcome: "ALLOW".into(),
            checked_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_memory_sink_builds_valid_ledger() {
        let sink = MemoryLedgerSink::new(Keypair::from_seed(&[5u8; 32]));
        sink.record_gate_check(&event("A")).await.unwrap();
        sink.record_gate_check(&event("B")).await.unwrap();

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content().unwrap()["binding"]["gate"], "A");
        assert!(verify_ledger(&entries, &sink.public_key().to_hex()).ok);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_log_rate_limits() {
        let log = SinkFailureLog::new(Duration::from_secs(60));
        assert!(log.record("down"));
        assert!(!log.record("down"));
        assert!(!log.record("down"));
        assert_eq!(log.suppressed(), 2);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(log.record("down"));
        assert_eq!(log.suppressed(), 0);
    }
}
