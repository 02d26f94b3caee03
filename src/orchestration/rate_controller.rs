//! # Rate Controller
//!
//! Pure pacing policy: the scheduling decision points the run loop consumes,
//! and the cooperative-stop switch. No I/O lives here; the orchestrator owns
//! the actual sleeping so its loop never hardcodes timing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::orchestration::types::PacingPolicy;

/// Pacing policy violations caught at construction
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacingError {
    #[error("batch_size must be at least 1")]
    ZeroBatchSize,
}

/// Validated pacing schedule for one run
#[derive(Debug, Clone)]
pub struct RateController {
    policy: PacingPolicy,
}

impl RateController {
    /// Validate and wrap a pacing policy
    pub fn new(policy: PacingPolicy) -> Result<Self, PacingError> {
        if policy.batch_size == 0 {
            return Err(PacingError::ZeroBatchSize);
        }
        Ok(Self { policy })
    }

    /// Delay charged after each attempted grant
    pub fn per_item_delay(&self) -> Duration {
        self.policy.per_item_delay
    }

    /// Batch-boundary decision: pause after every `batch_size`-th processed
    /// target (skips count toward the boundary), but only while targets
    /// remain.
    pub fn batch_pause(&self, processed: usize, total: usize) -> Option<Duration> {
        if processed > 0 && processed < total && processed % self.policy.batch_size == 0 {
            Some(self.policy.inter_batch_delay)
        } else {
            None
        }
    }

    pub fn policy(&self) -> &PacingPolicy {
        &self.policy
    }
}

/// Cooperative cancellation switch for one run.
///
/// A single atomic flag shared by reference between the caller and the
/// worker. Requesting a stop is idempotent; the worker observes the flag
/// only at loop-iteration boundaries, so an in-flight call or sleep is never
/// interrupted.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a cooperative stop. Idempotent.
    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Has a stop been requested?
    pub fn is_stop_requested(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}
