//! Probe engine boundary — the record an engine emits per target and the
//! traits an engine implements.
//!
//! An engine is configured once per scan from a [`ProbeProfile`], then run to
//! completion. Results go out through a [`ResultSink`] as each target
//! finishes, so workers never touch the collector's state directly.

pub mod http;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::EngineError;
use crate::profile::ProbeProfile;
use crate::targets::Target;

/// Header name to every value received for it
pub type HeaderValues = BTreeMap<String, Vec<String>>;

/// One engine record per target.
///
/// Known fields are typed; anything else an engine reports lands in `extra`
/// and is carried through to the caller untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawProbeResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub input: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scheme: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub port: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webserver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Resolved addresses of the host
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub a: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http2: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tech: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub csp: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<Value>,

    /// Per-target failure marker; such records never reach the caller
    #[serde(skip)]
    pub error: Option<String>,
    /// Full wire response: status line, headers, blank line, body
    #[serde(skip)]
    pub raw: String,
    #[serde(skip)]
    pub headers: Option<HeaderValues>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawProbeResult {
    /// A record for a target that could not be probed
    pub fn failed(input: &str, error: impl Into<String>) -> Self {
        Self {
            timestamp: Some(Utc::now()),
            input: input.to_string(),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Sending half of the worker → collector queue
#[derive(Clone)]
pub struct ResultSink {
    tx: mpsc::Sender<RawProbeResult>,
}

impl ResultSink {
    pub fn new(tx: mpsc::Sender<RawProbeResult>) -> Self {
        Self { tx }
    }

    /// Hand one finished target to the collector. Waits while the queue is full.
    pub async fn emit(&self, result: RawProbeResult) {
        if self.tx.send(result).await.is_err() {
            debug!("result collector closed, dropping record");
        }
    }
}

/// A probe engine: validates a profile and builds a runnable scan
pub trait ProbeEngine: Send + Sync {
    /// Reject profiles this engine cannot run
    fn validate(&self, profile: &ProbeProfile) -> Result<(), EngineError> {
        validate_profile(profile)
    }

    /// Build a scan over `targets`
    fn configure(
        &self,
        profile: &ProbeProfile,
        targets: Vec<Target>,
    ) -> Result<Box<dyn ProbeRun>, EngineError>;
}

/// A configured scan
#[async_trait]
pub trait ProbeRun: Send {
    /// Process every target, emitting exactly one record per target.
    /// Returns once all targets are done.
    async fn run(&mut self, sink: ResultSink);

    /// Release whatever the run holds. Must be safe to call more than once.
    fn close(&mut self);
}

/// Baseline checks every engine shares
pub fn validate_profile(profile: &ProbeProfile) -> Result<(), EngineError> {
    if profile.method.trim().is_empty() {
        return Err(EngineError::Config("request method is empty".into()));
    }
    if profile.threads == 0 {
        return Err(EngineError::Config("thread count must be at least 1".into()));
    }
    Ok(())
}
