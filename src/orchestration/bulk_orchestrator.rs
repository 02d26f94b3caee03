//! # Bulk Orchestrator
//!
//! ## Architecture: Main Run Engine
//!
//! The BulkOrchestrator drives one invitation run end to end: it resolves
//! the destination, builds the membership index, walks the target list in
//! input order under the rate controller's pacing decisions, classifies
//! every grant failure, and folds everything into the final report.
//!
//! ## Key Responsibilities
//!
//! - **Run Lifecycle Management**: resolve, index, iterate, finalize
//! - **Deduplication**: skip targets already present in the membership snapshot
//! - **Pacing**: per-item and inter-batch delays from the RateController
//! - **Failure Classification**: fatal failures halt the run, recoverable
//!   failures only count against the target
//! - **Cooperative Cancellation**: a stop request is honored at loop
//!   boundaries, never mid-call
//! - **Event Coordination**: progress, per-target results, and log lines are
//!   published to subscribers
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roster_core::client::PlatformClient;
//! use roster_core::orchestration::bulk_orchestrator::BulkOrchestrator;
//! use roster_core::orchestration::types::{PacingPolicy, Target};
//! # async fn example(client: Arc<dyn PlatformClient>, identity: roster_core::orchestration::types::Identity) {
//! let orchestrator = BulkOrchestrator::new(client);
//! let targets = vec![Target::new("@alice"), Target::new("@bob")];
//!
//! let report = orchestrator
//!     .run(&identity, "https://t.me/mychannel", &targets, PacingPolicy::default())
//!     .await;
//!
//! println!(
//!     "{:?}: {} granted, {} skipped, {} failed",
//!     report.outcome, report.tally.successful, report.tally.skipped, report.tally.failed
//! );
//! # }
//! ```

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::client::PlatformClient;
use crate::error::{Result, RosterError};
use crate::events::{EventPublisher, PublishedEvent, RunEvent};
use crate::orchestration::error_classifier::{FailureClassifier, StandardFailureClassifier};
use crate::orchestration::membership_index::{
    MembershipIndex, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE,
};
use crate::orchestration::rate_controller::{RateController, StopToken};
use crate::orchestration::types::{
    ActionResult, Destination, Identity, PacingPolicy, RunOutcome, RunReport, RunTally, Target,
};
use crate::session::{AuthorizationState, SessionStore};

/// Configuration for the bulk orchestrator
#[derive(Debug, Clone)]
pub struct BulkOrchestratorConfig {
    /// Member-list page size used while building the membership index
    pub member_page_size: usize,
    /// Pagination safety bound for the membership index
    pub max_member_pages: usize,
    /// Capacity of the run-event broadcast channel
    pub event_channel_capacity: usize,
}

impl Default for BulkOrchestratorConfig {
    fn default() -> Self {
        Self {
            member_page_size: DEFAULT_PAGE_SIZE,
            max_member_pages: DEFAULT_MAX_PAGES,
            event_channel_capacity: 1024,
        }
    }
}

impl BulkOrchestratorConfig {
    /// Configuration with tiny pages for exercising pagination in tests
    pub fn for_testing() -> Self {
        Self {
            member_page_size: 2,
            max_member_pages: 4,
            event_channel_capacity: 256,
        }
    }
}

/// Errors refusing to spawn a run worker
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("a run is already active for identity '{0}'")]
    AlreadyRunning(String),
    #[error("session for identity '{0}' is not authorized")]
    SessionUnauthorized(String),
    #[error("pre-flight connect failed for identity '{label}': {reason}")]
    Preflight { label: String, reason: String },
}

/// Tracks which identities currently have an active run.
///
/// At most one run per identity: the worker releases its claim when the run
/// ends, whatever the outcome.
#[derive(Debug, Default)]
pub struct RunRegistry {
    active: Mutex<HashSet<String>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Is a run currently active for this identity?
    pub fn is_active(&self, label: &str) -> bool {
        self.active.lock().contains(label)
    }

    fn claim(&self, label: &str) -> bool {
        self.active.lock().insert(label.to_string())
    }

    fn release(&self, label: &str) {
        self.active.lock().remove(label);
    }
}

/// Handle to a spawned run worker
pub struct RunHandle {
    stop: StopToken,
    events: EventPublisher,
    join: JoinHandle<RunReport>,
}

impl RunHandle {
    /// Request a cooperative stop. The worker quiesces at its next loop
    /// boundary, which may be up to one pacing interval away.
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    /// Subscribe to the run's event stream
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.events.subscribe()
    }

    /// Has the worker finished?
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the worker and return the final report
    pub async fn wait(self) -> Result<RunReport> {
        self.join
            .await
            .map_err(|e| RosterError::OrchestrationError(format!("run worker failed: {e}")))
    }
}

/// Main orchestrator that drives one invitation run
pub struct BulkOrchestrator {
    /// Opaque platform capability
    client: Arc<dyn PlatformClient>,
    /// Shared failure-classification policy
    classifier: Arc<dyn FailureClassifier>,
    /// Publishes run lifecycle events
    events: EventPublisher,
    /// Cooperative cancellation switch
    stop: StopToken,
    /// Configuration
    config: BulkOrchestratorConfig,
}

impl BulkOrchestrator {
    /// Create an orchestrator with default configuration
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self::with_config(client, BulkOrchestratorConfig::default())
    }

    /// Create an orchestrator with custom configuration
    pub fn with_config(client: Arc<dyn PlatformClient>, config: BulkOrchestratorConfig) -> Self {
        Self {
            client,
            classifier: Arc::new(StandardFailureClassifier::new()),
            events: EventPublisher::new(config.event_channel_capacity),
            stop: StopToken::new(),
            config,
        }
    }

    /// Replace the failure-classification policy
    pub fn with_classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// The run's cooperative cancellation switch
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// Subscribe to the run's event stream
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.events.subscribe()
    }

    /// Spawn the run on its own worker task after claiming the identity and
    /// verifying the session authorizes.
    pub async fn spawn(
        self: Arc<Self>,
        registry: Arc<RunRegistry>,
        store: Arc<SessionStore>,
        identity: Identity,
        destination_ref: String,
        targets: Vec<Target>,
        policy: PacingPolicy,
    ) -> std::result::Result<RunHandle, SpawnError> {
        if !registry.claim(&identity.label) {
            return Err(SpawnError::AlreadyRunning(identity.label));
        }

        match self.client.connect(&identity.auth).await {
            Ok(AuthorizationState::Authorized) => {
                if let Err(e) =
                    store.mark_authorization(&identity.label, AuthorizationState::Authorized)
                {
                    warn!(identity = %identity.label, error = %e, "Failed to record authorization state");
                }
            }
            Ok(_) => {
                if let Err(e) =
                    store.mark_authorization(&identity.label, AuthorizationState::Unauthorized)
                {
                    warn!(identity = %identity.label, error = %e, "Failed to record authorization state");
                }
                registry.release(&identity.label);
                return Err(SpawnError::SessionUnauthorized(identity.label));
            }
            Err(e) => {
                registry.release(&identity.label);
                return Err(SpawnError::Preflight {
                    label: identity.label,
                    reason: e.to_string(),
                });
            }
        }

        let stop = self.stop.clone();
        let events = self.events.clone();
        let label = identity.label.clone();
        let worker_registry = Arc::clone(&registry);

        let join = tokio::spawn(async move {
            let report = self
                .run(&identity, &destination_ref, &targets, policy)
                .await;
            worker_registry.release(&label);
            report
        });

        Ok(RunHandle { stop, events, join })
    }

    /// Drive one full run.
    ///
    /// Infallible from the caller's point of view: every failure folds into
    /// the report and the event stream.
    #[instrument(skip_all, fields(identity = %identity.label, destination = %destination_ref))]
    pub async fn run(
        &self,
        identity: &Identity,
        destination_ref: &str,
        targets: &[Target],
        policy: PacingPolicy,
    ) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut tally = RunTally::default();

        let pacing = match RateController::new(policy) {
            Ok(pacing) => pacing,
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Invalid pacing policy");
                self.log_line(format!("❌ Invalid pacing policy: {e}")).await;
                return self
                    .finish(run_id, RunOutcome::StoppedByFatalError, tally, started_at)
                    .await;
            }
        };

        self.emit(RunEvent::Started {
            run_id,
            identity: identity.label.clone(),
            destination: destination_ref.to_string(),
            total_targets: targets.len(),
        })
        .await;

        if self.stop.is_stop_requested() {
            self.log_line("🛑 Run stopped by caller".to_string()).await;
            return self
                .finish(run_id, RunOutcome::StoppedByCaller, tally, started_at)
                .await;
        }

        let destination = match self.resolve_destination(destination_ref).await {
            Ok(destination) => destination,
            Err(detail) => {
                self.log_line(format!("❌ Could not resolve destination: {detail}"))
                    .await;
                return self
                    .finish(run_id, RunOutcome::StoppedByFatalError, tally, started_at)
                    .await;
            }
        };

        self.log_line("📋 Fetching current member list...".to_string())
            .await;
        let index = match MembershipIndex::build(
            &self.client,
            &destination,
            self.config.member_page_size,
            self.config.max_member_pages,
        )
        .await
        {
            Ok(index) => index,
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Membership listing failed");
                self.log_line(format!("❌ Could not list existing members: {e}"))
                    .await;
                return self
                    .finish(run_id, RunOutcome::StoppedByFatalError, tally, started_at)
                    .await;
            }
        };
        self.log_line(format!("✅ Found {} existing members", index.len()))
            .await;

        let total = targets.len();
        let mut processed = 0usize;
        let mut outcome = RunOutcome::Completed;

        for target in targets {
            if self.stop.is_stop_requested() {
                self.log_line("🛑 Run stopped by caller".to_string()).await;
                outcome = RunOutcome::StoppedByCaller;
                break;
            }

            let result = self.process_target(run_id, &destination, target, &index).await;
            tally.record(&result);
            processed += 1;

            let is_fatal = result.is_fatal();
            let attempted = !result.is_skip();

            self.emit(RunEvent::TargetProcessed {
                target: target.clone(),
                result,
            })
            .await;
            self.emit(RunEvent::Progress {
                percent: (processed * 100 / total) as u8,
            })
            .await;

            if is_fatal {
                outcome = RunOutcome::StoppedByFatalError;
                break;
            }

            // No delay charged for skipped targets
            if attempted
                && !pacing.per_item_delay().is_zero()
                && !self.stop.is_stop_requested()
            {
                tokio::time::sleep(pacing.per_item_delay()).await;
            }

            if let Some(pause) = pacing.batch_pause(processed, total) {
                self.log_line(format!("⏳ Pausing for {} seconds...", pause.as_secs()))
                    .await;
                self.emit(RunEvent::BatchPause {
                    after_processed: processed,
                    duration: pause,
                })
                .await;
                if !pause.is_zero() && !self.stop.is_stop_requested() {
                    tokio::time::sleep(pause).await;
                }
            }
        }

        self.finish(run_id, outcome, tally, started_at).await
    }

    /// Resolve the caller's destination reference to a concrete destination
    async fn resolve_destination(
        &self,
        reference: &str,
    ) -> std::result::Result<Destination, String> {
        let normalized = Destination::normalize_ref(reference);
        match self.client.resolve_destination(&normalized).await {
            Ok(id) => {
                let destination = Destination::from_resolved(reference, id);
                info!(
                    destination = %destination.normalized,
                    destination_id = destination.id,
                    "✅ Destination resolved"
                );
                self.log_line(format!("✅ Destination id resolved: {}", destination.id))
                    .await;
                Ok(destination)
            }
            Err(e) => {
                error!(reference = %reference, error = %e, "Destination resolution failed");
                Err(e.to_string())
            }
        }
    }

    /// Process one target: dedup against the membership snapshot, otherwise
    /// grant and classify the result.
    async fn process_target(
        &self,
        run_id: Uuid,
        destination: &Destination,
        target: &Target,
        index: &MembershipIndex,
    ) -> ActionResult {
        if index.contains(target) {
            self.log_line(format!("⏭️ {target} is already a member")).await;
            return ActionResult::SkippedAlreadyMember;
        }

        match self.client.grant(destination, target).await {
            Ok(()) => {
                crate::logging::log_grant_operation(
                    "grant",
                    Some(&run_id.to_string()),
                    Some(target.as_str()),
                    "success",
                    None,
                );
                ActionResult::Success
            }
            Err(e) => {
                let classification = self.classifier.classify(&e);
                crate::logging::log_grant_operation(
                    "grant",
                    Some(&run_id.to_string()),
                    Some(target.as_str()),
                    "failed",
                    Some(&classification.detail),
                );
                if classification.is_fatal() {
                    self.log_line(format!(
                        "🛑 Fatal failure - stopping the run: {}",
                        classification.detail
                    ))
                    .await;
                } else {
                    self.log_line(format!(
                        "❌ Failed to invite {target}: {}",
                        classification.detail
                    ))
                    .await;
                }
                classification.into()
            }
        }
    }

    /// Emit the terminal summary and freeze the report
    async fn finish(
        &self,
        run_id: Uuid,
        outcome: RunOutcome,
        tally: RunTally,
        started_at: chrono::DateTime<chrono::Utc>,
    ) -> RunReport {
        self.log_line(format!(
            "📊 Run summary: successful={}, skipped={}, failed={}",
            tally.successful, tally.skipped, tally.failed
        ))
        .await;
        self.emit(RunEvent::Finished {
            run_id,
            outcome,
            tally,
        })
        .await;

        crate::logging::log_run_operation(
            "run_finished",
            Some(&run_id.to_string()),
            None,
            None,
            &format!("{outcome:?}"),
            Some(&format!(
                "successful={}, skipped={}, failed={}",
                tally.successful, tally.skipped, tally.failed
            )),
        );

        RunReport {
            run_id,
            outcome,
            tally,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn emit(&self, event: RunEvent) {
        let _ = self.events.publish(event).await;
    }

    async fn log_line(&self, line: String) {
        self.emit(RunEvent::Log { line }).await;
    }
}
