//! Run lifecycle event types.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::orchestration::types::{ActionResult, RunOutcome, RunTally, Target};

/// Events emitted over the lifetime of one invitation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    /// The run's worker has started processing
    Started {
        run_id: Uuid,
        identity: String,
        destination: String,
        total_targets: usize,
    },
    /// One target was processed (granted, skipped, or failed)
    TargetProcessed {
        target: Target,
        result: ActionResult,
    },
    /// Overall progress, as an integer percentage rounded down.
    /// Monotonically non-decreasing within a run.
    Progress { percent: u8 },
    /// The run is pausing at a batch boundary
    BatchPause {
        after_processed: usize,
        duration: Duration,
    },
    /// Ordered, human-readable log line
    Log { line: String },
    /// Terminal event: exactly one per run
    Finished {
        run_id: Uuid,
        outcome: RunOutcome,
        tally: RunTally,
    },
}
