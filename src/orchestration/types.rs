//! # Orchestration Types
//!
//! Core types and data structures shared across the orchestration
//! components: identities, destinations, targets, pacing policies, and the
//! per-run accounting types.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::session::{AuthorizationState, SessionAuth};

/// One authenticated account used to perform actions against the platform.
///
/// Assembled by the session store at run start; the orchestrator only ever
/// borrows it read-only.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Account label (phone number or handle the session is filed under)
    pub label: String,
    /// Durable authentication material reference
    pub auth: SessionAuth,
    /// Authorization state as last recorded
    pub authorization: AuthorizationState,
}

/// A recipient identifier to be invited, exactly as supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normalized form used for membership comparison
    pub fn normalized(&self) -> String {
        normalize_identifier(&self.0)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Target {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Normalize a recipient identifier for membership comparison: drop a
/// leading `@`, lower-case handles. Stringified numeric ids pass through
/// unchanged.
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_lowercase()
}

/// The resource targets are being granted membership in.
///
/// Resolved once per run and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Reference exactly as given by the caller
    pub raw: String,
    /// Resolved numeric id, in the platform's canonical channel form
    pub id: i64,
    /// Normalized reference used for resolution
    pub normalized: String,
}

impl Destination {
    /// Strip the link prefixes callers paste in (`https://t.me/...`,
    /// `t.me/...`, `@name`) down to the bare reference.
    pub fn normalize_ref(raw: &str) -> String {
        let trimmed = raw.trim();
        for prefix in ["https://t.me/", "t.me/", "@"] {
            if let Some(rest) = trimmed.strip_prefix(prefix) {
                return rest.to_string();
            }
        }
        trimmed.to_string()
    }

    /// Build a destination from the caller's reference and the resolved id.
    ///
    /// A positive id is converted to the platform's canonical channel form
    /// by prefixing `-100`; ids already in canonical form pass through.
    pub fn from_resolved(raw: impl Into<String>, resolved_id: i64) -> Self {
        let raw = raw.into();
        let normalized = Self::normalize_ref(&raw);
        let id = if resolved_id > 0 {
            format!("-100{resolved_id}")
                .parse::<i64>()
                .unwrap_or(resolved_id)
        } else {
            resolved_id
        };
        Self {
            raw,
            id,
            normalized,
        }
    }
}

/// Pacing contract for one run: the delay/batch schedule used to stay under
/// the platform's abuse thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingPolicy {
    /// Delay after each attempted grant
    pub per_item_delay: Duration,
    /// Number of processed targets per batch
    pub batch_size: usize,
    /// Delay at each batch boundary
    pub inter_batch_delay: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            per_item_delay: Duration::from_secs(4),
            batch_size: 10,
            inter_batch_delay: Duration::from_secs(300),
        }
    }
}

impl PacingPolicy {
    /// Zero-delay policy for tests and dry runs
    pub fn immediate(batch_size: usize) -> Self {
        Self {
            per_item_delay: Duration::ZERO,
            batch_size,
            inter_batch_delay: Duration::ZERO,
        }
    }
}

/// Per-target processing result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionResult {
    /// Membership granted
    Success,
    /// Target already belongs to the destination; no grant attempted
    SkippedAlreadyMember,
    /// Per-target failure; the run continues
    RecoverableFailure { detail: String },
    /// Failure that halts the entire run
    FatalFailure { detail: String },
}

impl ActionResult {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ActionResult::FatalFailure { .. })
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, ActionResult::SkippedAlreadyMember)
    }
}

/// Run accounting: counters are monotonically non-decreasing while the run
/// is live and frozen once it ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTally {
    pub successful: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl RunTally {
    /// Fold one per-target result into the tally
    pub fn record(&mut self, result: &ActionResult) {
        match result {
            ActionResult::Success => self.successful += 1,
            ActionResult::SkippedAlreadyMember => self.skipped += 1,
            ActionResult::RecoverableFailure { .. } | ActionResult::FatalFailure { .. } => {
                self.failed += 1;
            }
        }
    }

    /// Total number of targets processed so far
    pub fn processed(&self) -> u64 {
        self.successful + self.skipped + self.failed
    }
}

/// Terminal state of a run. Exactly one per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// Every target was attempted
    Completed,
    /// The caller requested a cooperative stop
    StoppedByCaller,
    /// A fatal classification halted the run
    StoppedByFatalError,
}

/// Final report for one run: the outcome tag plus the frozen tally
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    pub tally: RunTally,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}
