//! # Warden Gate
//!
//! Request-time authorization against a signed authority manifest.
//!
//! ## Overview
//!
//! A [`Gate`] loads the current manifest through a [`ManifestProvider`],
//! checks that it is attested (stored hash and maker/checker signatures),
//! that it is in effect, and that the requested binding appears in its
//! table. Allowed requests are reported to a [`LedgerSink`].
//!
//! Rejections carry a stable [`ErrorCode`]: 403-class codes are final,
//! 503-class codes are worth retrying.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden_gate::{
//!     FileManifestProvider, FileProviderConfig, Gate, GateConfig, GateRequest, NullLedgerSink,
//! };
//!
//! async fn example() {
//!     let provider =
//!         FileManifestProvider::new(FileProviderConfig::new("authority_map.json")).unwrap();
//!     let gate = Gate::new(Arc::new(provider), Arc::new(NullLedgerSink), GateConfig::default())
//!         .unwrap();
//!
//!     let request = GateRequest::new().with_body(serde_json::json!({
//!         "binding": {"avatar": "Celine", "vessel": "aurora", "capsule": "luma", "gate": "THRUST_CONTROL"}
//!     }));
//!     match gate.evaluate(&request).await.into_result() {
//!         Ok(context) => println!("allowed under {}", context.manifest_hash),
//!         Err(rejection) => println!("{} ({})", rejection.error_code, rejection.status),
//!     }
//! }
//! ```

pub mod binding;
pub mod cache;
pub mod config;
pub mod error;
pub mod file;
pub mod gate;
pub mod manifest;
pub mod provider;
pub mod sink;

pub use binding::{resolve_binding, GateRequest};
pub use cache::ManifestCache;
pub use config::{FileProviderConfig, GateConfig, MAX_CACHE_TTL, MIN_CACHE_TTL};
pub use error::{GateError, ProviderError, Result, SinkError};
pub use file::{sibling_path, FileManifestProvider};
pub use gate::{AuthorizedContext, ErrorCode, Gate, GateDecision, GateRejection};
pub use manifest::{parse_effective_after, AuthorityManifest, AuthorityMap, BindingTuple};
pub use provider::{ManifestProvider, ManifestSource, StaticManifestProvider};
pub use sink::{GateCheckEvent, LedgerSink, MemoryLedgerSink, NullLedgerSink};
