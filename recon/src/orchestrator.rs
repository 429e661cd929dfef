//! Recon orchestrator — drives one scan from targets to response envelope
//!
//! Pipeline: select profile → validate → configure engine → run (workers →
//! queue → single collector that shapes and appends) → close → envelope

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::asn::AsnAdapter;
use crate::engine::{ProbeEngine, ProbeRun, RawProbeResult, ResultSink};
use crate::error::ScanError;
use crate::isolation::SuppressedIo;
use crate::profile::{ProbeProfile, ScanMode};
use crate::shaper::{ResultShaper, ShapedResult};
use crate::targets::Target;

/// Capacity of the worker → collector queue
const RESULT_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub mode: ScanMode,
    pub results: Vec<ShapedResult>,
}

#[derive(Clone)]
pub struct Orchestrator {
    engine: Arc<dyn ProbeEngine>,
    asn: AsnAdapter,
    isolate_stdio: bool,
}

/// Closes the engine run when dropped, whichever way `run` exits
struct RunHandle(Box<dyn ProbeRun>);

impl Drop for RunHandle {
    fn drop(&mut self) {
        self.0.close();
    }
}

impl Orchestrator {
    pub fn new(engine: Arc<dyn ProbeEngine>, asn: AsnAdapter, isolate_stdio: bool) -> Self {
        Self {
            engine,
            asn,
            isolate_stdio,
        }
    }

    /// Run a whole scan. Blocks until every target has been processed.
    /// Targets the engine marks as failed are left out of the results.
    pub async fn run(&self, targets: Vec<Target>, mode: ScanMode) -> Result<ScanResponse, ScanError> {
        let scan_id = Uuid::new_v4();
        let span = info_span!("scan", %scan_id, %mode, targets = targets.len());
        self.run_inner(targets, mode).instrument(span).await
    }

    async fn run_inner(&self, targets: Vec<Target>, mode: ScanMode) -> Result<ScanResponse, ScanError> {
        let profile = ProbeProfile::select(mode);
        self.engine.validate(&profile)?;

        let _io = if self.isolate_stdio {
            Some(SuppressedIo::acquire().await?)
        } else {
            None
        };

        let mut handle = RunHandle(self.engine.configure(&profile, targets)?);
        let shaper = ResultShaper::new(mode, self.asn.clone());
        let (tx, mut rx) = mpsc::channel::<RawProbeResult>(RESULT_QUEUE_DEPTH);

        let collect = async {
            let mut results = Vec::new();
            let mut dropped = 0usize;
            while let Some(raw) = rx.recv().await {
                if let Some(reason) = &raw.error {
                    debug!("dropping failed target {}: {reason}", raw.input);
                    dropped += 1;
                    continue;
                }
                results.push(shaper.shape(raw).await);
            }
            (results, dropped)
        };

        let ((), (results, dropped)) = tokio::join!(handle.0.run(ResultSink::new(tx)), collect);
        info!("scan finished: {} results, {dropped} failed targets", results.len());

        Ok(ScanResponse { mode, results })
    }
}
