//! # Orchestration Engine
//!
//! Core run machinery for bulk invitation operations.
//!
//! ## Core Components
//!
//! - **BulkOrchestrator**: drives one run end to end - destination
//!   resolution, membership dedup, paced grants, failure classification,
//!   event publishing
//! - **AccountAuditor**: sequential authorization/liveness checks with an
//!   optional re-authentication sub-flow
//! - **RateController / StopToken**: pacing decision points and the
//!   cooperative cancellation switch
//! - **MembershipIndex**: one-shot member-set snapshot used for dedup
//! - **Failure classification**: shared fatal/recoverable policy over the
//!   client's grant errors

pub mod auditor;
pub mod bulk_orchestrator;
pub mod error_classifier;
pub mod membership_index;
pub mod rate_controller;
pub mod types;

pub use auditor::{
    AccountAuditor, AccountAuditorConfig, AuditDecision, AuditPrompt, CheckResult, CheckStatus,
    ProbeOutcome,
};
pub use bulk_orchestrator::{
    BulkOrchestrator, BulkOrchestratorConfig, RunHandle, RunRegistry, SpawnError,
};
pub use error_classifier::{
    FailureCategory, FailureClassification, FailureClassifier, FailureDisposition,
    StandardFailureClassifier,
};
pub use membership_index::{MembershipIndex, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
pub use rate_controller::{PacingError, RateController, StopToken};
pub use types::{
    ActionResult, Destination, Identity, PacingPolicy, RunOutcome, RunReport, RunTally, Target,
};
