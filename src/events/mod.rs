//! # Run Event System
//!
//! Typed lifecycle events for invitation runs. The orchestrator's worker
//! publishes onto a broadcast channel; any number of observers (progress
//! bars, log panes, tests) subscribe without slowing the run down.

pub mod publisher;
pub mod types;

pub use publisher::{EventPublisher, PublishError, PublishedEvent};
pub use types::RunEvent;
