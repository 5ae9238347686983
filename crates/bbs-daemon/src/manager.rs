//! The orchestrator manager thread (§4.G/§5): evicts idle containers every
//! tick and sweeps orphaned ones roughly every ten minutes.

use bbs_runner::{ContainerEngine, Orchestrator};
use std::sync::Arc;
use std::time::Duration;

const EVICTION_TICK: Duration = Duration::from_secs(5);
const ORPHAN_SCAN_INTERVAL: Duration = Duration::from_secs(600);

/// Runs the orchestrator's housekeeping passes on its own thread, separate
/// from the job-draining [`crate::worker::JobWorker`] thread.
pub struct OrchestratorManager<E: ContainerEngine + 'static> {
    orchestrator: Arc<Orchestrator<E>>,
}

impl<E: ContainerEngine + 'static> OrchestratorManager<E> {
    /// Build a manager over `orchestrator`.
    pub fn new(orchestrator: Arc<Orchestrator<E>>) -> Self {
        Self { orchestrator }
    }

    /// Run forever: evict idle containers every [`EVICTION_TICK`], and scan
    /// for orphans every [`ORPHAN_SCAN_INTERVAL`]. Intended to be the body
    /// of its own thread.
    pub fn run(&self) {
        let mut since_last_orphan_scan = Duration::ZERO;
        loop {
            std::thread::sleep(EVICTION_TICK);
            self.orchestrator.evict_idle_containers();

            since_last_orphan_scan += EVICTION_TICK;
            if since_last_orphan_scan >= ORPHAN_SCAN_INTERVAL {
                since_last_orphan_scan = Duration::ZERO;
                if let Err(err) = self.orchestrator.scan_orphans() {
                    tracing::warn!(error = %err, "orphan container scan failed");
                }
            }
        }
    }
}
