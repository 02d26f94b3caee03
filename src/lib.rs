#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Roster Core
//!
//! Rust core for bulk membership-invitation orchestration against a remote,
//! rate-limited messaging platform.
//!
//! ## Overview
//!
//! One authenticated identity per run drives a list of recipient targets
//! into a destination resource: resolve the destination, snapshot its
//! current membership for dedup, then grant membership target by target
//! under a pacing policy, with failure classification that can halt the
//! whole run and a cooperative stop switch that never interrupts an
//! in-flight call.
//!
//! ## Architecture
//!
//! The platform itself is an opaque capability behind the
//! [`client::PlatformClient`] trait; the core owns orchestration, pacing,
//! dedup, classification, and accounting. A sibling audit pass checks
//! authorization and liveness for a batch of identities and can walk an
//! unauthorized identity through re-authentication.
//!
//! ## Module Organization
//!
//! - [`orchestration`] - the run engine, auditor, pacing, and classification
//! - [`client`] - the platform capability trait and its typed errors
//! - [`session`] - file-backed session repository
//! - [`config`] - per-identity and pacing configuration documents
//! - [`events`] - typed run-event publishing
//! - [`error`] - crate-level error handling
//! - [`logging`] - structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roster_core::client::PlatformClient;
//! use roster_core::orchestration::{BulkOrchestrator, PacingPolicy, Target};
//! use roster_core::session::SessionStore;
//!
//! # async fn example(client: Arc<dyn PlatformClient>) -> anyhow::Result<()> {
//! let store = SessionStore::new("accounts");
//! let identity = store.load_identity("79990001122")?;
//!
//! let orchestrator = BulkOrchestrator::new(client);
//! let targets: Vec<Target> = vec!["@alice".into(), "@bob".into()];
//!
//! let report = orchestrator
//!     .run(&identity, "https://t.me/mychannel", &targets, PacingPolicy::default())
//!     .await;
//! println!("{:?}: {:?}", report.outcome, report.tally);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod orchestration;
pub mod session;

pub use client::{ClientError, GrantError, PlatformClient};
pub use config::{IdentityConfig, PacingConfig};
pub use error::{Result, RosterError};
pub use events::{EventPublisher, RunEvent};
pub use orchestration::{
    AccountAuditor, ActionResult, BulkOrchestrator, Destination, Identity, PacingPolicy,
    RunOutcome, RunReport, RunTally, StopToken, Target,
};
pub use session::{AuthorizationState, SessionStore};
