//! # Grant Failure Classification
//!
//! Centralized classification for per-target grant failures, shared by the
//! bulk orchestrator and the account auditor.
//!
//! ## Overview
//!
//! The platform reports most per-target failures as typed errors, but some
//! surface only as opaque RPC detail strings. This module maps both onto a
//! category and a disposition: **fatal** failures halt the whole run
//! (insufficient privilege, cool-down restrictions), **recoverable**
//! failures count against the target and let the run continue.
//!
//! ## Usage
//!
//! ```rust
//! use roster_core::client::GrantError;
//! use roster_core::orchestration::error_classifier::{
//!     FailureClassifier, FailureDisposition, StandardFailureClassifier,
//! };
//!
//! let classifier = StandardFailureClassifier::new();
//! let error = GrantError::Rpc("admin rights do not allow you to do this".to_string());
//!
//! let classification = classifier.classify(&error);
//! assert_eq!(classification.disposition, FailureDisposition::Fatal);
//! ```

use serde::{Deserialize, Serialize};

use crate::client::GrantError;
use crate::orchestration::types::ActionResult;

/// Primary failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// The acting identity lacks the privilege to grant membership
    Privilege,

    /// Cool-down restriction: recently authorized or rate-limited
    CoolDown,

    /// The target was rejected (blocked, privacy-restricted, invalid)
    TargetRejected,

    /// Transient network fault
    Network,

    /// Anything the patterns do not recognize
    Unknown,
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCategory::Privilege => write!(f, "Privilege"),
            FailureCategory::CoolDown => write!(f, "Cool-Down"),
            FailureCategory::TargetRejected => write!(f, "Target Rejected"),
            FailureCategory::Network => write!(f, "Network"),
            FailureCategory::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Whether a failure halts the run or only the current target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureDisposition {
    /// Halt the entire run immediately
    Fatal,
    /// Count the target as failed and continue
    Recoverable,
}

/// Result of classifying one grant failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureClassification {
    pub category: FailureCategory,
    pub disposition: FailureDisposition,
    /// Human-readable detail, carried into logs and the event stream
    pub detail: String,
}

impl FailureClassification {
    pub fn is_fatal(&self) -> bool {
        self.disposition == FailureDisposition::Fatal
    }
}

impl From<FailureClassification> for ActionResult {
    fn from(classification: FailureClassification) -> Self {
        match classification.disposition {
            FailureDisposition::Fatal => ActionResult::FatalFailure {
                detail: classification.detail,
            },
            FailureDisposition::Recoverable => ActionResult::RecoverableFailure {
                detail: classification.detail,
            },
        }
    }
}

/// Trait for failure classification strategies
pub trait FailureClassifier: Send + Sync {
    /// Classify a grant failure
    fn classify(&self, error: &GrantError) -> FailureClassification;

    /// Get the classifier name for identification
    fn classifier_name(&self) -> &'static str;
}

/// Standard classifier: typed errors map directly, opaque RPC detail
/// strings fall back to message-pattern analysis.
#[derive(Debug, Default)]
pub struct StandardFailureClassifier;

impl StandardFailureClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Pattern analysis for opaque RPC detail strings
    fn classify_rpc_detail(&self, detail: &str) -> (FailureCategory, FailureDisposition) {
        let lowered = detail.to_lowercase();

        if lowered.contains("admin right")
            || lowered.contains("not enough rights")
            || lowered.contains("privilege")
        {
            (FailureCategory::Privilege, FailureDisposition::Fatal)
        } else if lowered.contains("recently authorized")
            || lowered.contains("flood")
            || lowered.contains("too many requests")
            || lowered.contains("wait of")
        {
            (FailureCategory::CoolDown, FailureDisposition::Fatal)
        } else if lowered.contains("blocked")
            || lowered.contains("privacy")
            || lowered.contains("not mutual")
            || lowered.contains("invalid")
            || lowered.contains("not found")
        {
            (FailureCategory::TargetRejected, FailureDisposition::Recoverable)
        } else if lowered.contains("network")
            || lowered.contains("connection")
            || lowered.contains("timed out")
            || lowered.contains("timeout")
        {
            (FailureCategory::Network, FailureDisposition::Recoverable)
        } else {
            (FailureCategory::Unknown, FailureDisposition::Recoverable)
        }
    }
}

impl FailureClassifier for StandardFailureClassifier {
    fn classify(&self, error: &GrantError) -> FailureClassification {
        let (category, disposition) = match error {
            GrantError::InsufficientPrivilege(_) => {
                (FailureCategory::Privilege, FailureDisposition::Fatal)
            }
            GrantError::CoolDown(_) => (FailureCategory::CoolDown, FailureDisposition::Fatal),
            GrantError::TargetRejected(_) => {
                (FailureCategory::TargetRejected, FailureDisposition::Recoverable)
            }
            GrantError::Network(_) => (FailureCategory::Network, FailureDisposition::Recoverable),
            GrantError::Rpc(detail) => self.classify_rpc_detail(detail),
        };

        FailureClassification {
            category,
            disposition,
            detail: error.to_string(),
        }
    }

    fn classifier_name(&self) -> &'static str {
        "StandardFailureClassifier"
    }
}
