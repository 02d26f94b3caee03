//! # Account Auditor
//!
//! Sequential authorization and liveness checks over a batch of identities.
//!
//! The pass is one-way and not restartable: authentication work is
//! inherently sequential against one identity at a time, so results stream
//! out as each identity finishes. An unauthorized identity suspends the pass
//! for a caller decision (restore / discard / skip); the restore sub-flow
//! suspends again for login-code and passphrase entry. All prompts go
//! through the caller-supplied [`AuditPrompt`] and are bounded by the
//! configured timeout; a timed-out prompt reads as caller cancellation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::client::{PlatformClient, SignInOutcome};
use crate::logging::log_audit_operation;
use crate::session::{AuthorizationState, SessionAuth, SessionStore};

/// Caller decision for an unauthorized identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditDecision {
    /// Attempt the re-authentication sub-flow
    Restore,
    /// Remove the identity's session artifacts
    Discard,
    /// Leave the identity as-is
    Skip,
}

/// Informational liveness-probe outcome. Probe failure never reclassifies
/// the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeOutcome {
    /// Raw reply text from the platform's status utility
    Reply { text: String },
    /// The probe did not come back in time or errored
    Failed { detail: String },
}

/// Per-identity audit status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    /// Session connected and is authorized
    Authorized { probe: Option<ProbeOutcome> },
    /// Session is not authorized; carries the caller's decision and whether
    /// a restore attempt succeeded
    Unauthorized {
        decision: AuditDecision,
        restored: bool,
    },
    /// No session material or configuration document for this label
    ConfigMissing,
    /// Could not connect at all
    ConnectFailed { detail: String },
}

/// One per-identity audit outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub label: String,
    pub status: CheckStatus,
}

/// Suspend-for-input interface supplied by the caller layer.
///
/// Every method is a suspension point: the audit pass blocks on the reply
/// (up to the configured timeout) before continuing.
#[async_trait]
pub trait AuditPrompt: Send + Sync {
    /// Restore / discard / skip decision for an unauthorized identity
    async fn decide(&self, label: &str) -> AuditDecision;

    /// Login code sent to the contact address; `None` means cancelled
    async fn login_code(&self, contact: &str) -> Option<String>;

    /// Second-factor passphrase; `None` means cancelled
    async fn password(&self, label: &str) -> Option<String>;
}

/// Configuration for audit passes
#[derive(Debug, Clone)]
pub struct AccountAuditorConfig {
    /// Run the liveness probe for authorized identities
    pub probe_enabled: bool,
    /// Bounded wait for the probe reply
    pub probe_wait: Duration,
    /// Bounded wait for each caller prompt
    pub prompt_timeout: Duration,
}

impl Default for AccountAuditorConfig {
    fn default() -> Self {
        Self {
            probe_enabled: true,
            probe_wait: Duration::from_secs(2),
            prompt_timeout: Duration::from_secs(120),
        }
    }
}

impl AccountAuditorConfig {
    /// Configuration with short waits for tests
    pub fn for_testing() -> Self {
        Self {
            probe_enabled: true,
            probe_wait: Duration::from_millis(20),
            prompt_timeout: Duration::from_millis(250),
        }
    }
}

/// Audits identities against the remote platform
pub struct AccountAuditor {
    client: Arc<dyn PlatformClient>,
    store: Arc<SessionStore>,
    prompt: Arc<dyn AuditPrompt>,
    config: AccountAuditorConfig,
}

impl AccountAuditor {
    pub fn new(
        client: Arc<dyn PlatformClient>,
        store: Arc<SessionStore>,
        prompt: Arc<dyn AuditPrompt>,
    ) -> Self {
        Self::with_config(client, store, prompt, AccountAuditorConfig::default())
    }

    pub fn with_config(
        client: Arc<dyn PlatformClient>,
        store: Arc<SessionStore>,
        prompt: Arc<dyn AuditPrompt>,
        config: AccountAuditorConfig,
    ) -> Self {
        Self {
            client,
            store,
            prompt,
            config,
        }
    }

    /// One pass over the given identities. Results stream out as each
    /// identity finishes; dropping the receiver abandons the rest of the
    /// pass.
    pub fn check(self: Arc<Self>, labels: Vec<String>) -> mpsc::Receiver<CheckResult> {
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            for label in labels {
                let result = self.check_one(&label).await;
                if tx.send(result).await.is_err() {
                    break;
                }
            }
        });

        rx
    }

    /// Audit a single identity
    pub async fn check_one(&self, label: &str) -> CheckResult {
        log_audit_operation("check", Some(label), "started", None);

        let auth = match self.store.resolve(label) {
            Ok(auth) => auth,
            Err(e) => {
                warn!(identity = %label, error = %e, "No session material");
                return CheckResult {
                    label: label.to_string(),
                    status: CheckStatus::ConfigMissing,
                };
            }
        };
        let identity_config = match self.store.load_identity_config(label) {
            Ok(config) => config,
            Err(e) => {
                warn!(identity = %label, error = %e, "No configuration document");
                return CheckResult {
                    label: label.to_string(),
                    status: CheckStatus::ConfigMissing,
                };
            }
        };

        let state = match self.client.connect(&auth).await {
            Ok(state) => state,
            Err(e) => {
                log_audit_operation("check", Some(label), "connect_failed", Some(&e.to_string()));
                return CheckResult {
                    label: label.to_string(),
                    status: CheckStatus::ConnectFailed {
                        detail: e.to_string(),
                    },
                };
            }
        };

        if state == AuthorizationState::Authorized {
            self.record_authorization(label, AuthorizationState::Authorized);
            let probe = if self.config.probe_enabled {
                Some(self.probe().await)
            } else {
                None
            };
            log_audit_operation("check", Some(label), "authorized", None);
            return CheckResult {
                label: label.to_string(),
                status: CheckStatus::Authorized { probe },
            };
        }

        self.record_authorization(label, AuthorizationState::Unauthorized);
        log_audit_operation("check", Some(label), "unauthorized", None);

        let decision = match timeout(self.config.prompt_timeout, self.prompt.decide(label)).await {
            Ok(decision) => decision,
            Err(_) => {
                warn!(identity = %label, "Decision prompt timed out - skipping");
                AuditDecision::Skip
            }
        };

        let restored = match decision {
            AuditDecision::Restore => {
                let contact = contact_address(&identity_config.phone_or_label);
                self.restore(label, &auth, &contact).await
            }
            AuditDecision::Discard => {
                if let Err(e) = self.store.discard(label) {
                    warn!(identity = %label, error = %e, "Failed to discard session artifacts");
                }
                false
            }
            AuditDecision::Skip => false,
        };

        CheckResult {
            label: label.to_string(),
            status: CheckStatus::Unauthorized { decision, restored },
        }
    }

    /// Liveness probe against the platform's status utility
    async fn probe(&self) -> ProbeOutcome {
        match self.client.probe_status(self.config.probe_wait).await {
            Ok(text) => {
                info!(reply = %text, "📝 Status probe reply");
                ProbeOutcome::Reply { text }
            }
            Err(e) => {
                // Informational only: a dead probe does not mean a dead session
                warn!(error = %e, "⚠️ Status probe failed");
                ProbeOutcome::Failed {
                    detail: e.to_string(),
                }
            }
        }
    }

    /// Re-authentication sub-flow. Returns whether the session ended up
    /// authorized.
    async fn restore(&self, label: &str, auth: &SessionAuth, contact: &str) -> bool {
        log_audit_operation("restore", Some(label), "started", Some(contact));

        // The session may have authorized since the check connected
        if let Ok(AuthorizationState::Authorized) = self.client.connect(auth).await {
            info!(identity = %label, "✅ Session already authorized");
            self.record_authorization(label, AuthorizationState::Authorized);
            return true;
        }

        if let Err(e) = self.client.request_login_code(contact).await {
            log_audit_operation("restore", Some(label), "code_request_failed", Some(&e.to_string()));
            return false;
        }

        let code = match timeout(self.config.prompt_timeout, self.prompt.login_code(contact)).await
        {
            Ok(Some(code)) => code,
            Ok(None) => {
                log_audit_operation("restore", Some(label), "cancelled", None);
                return false;
            }
            Err(_) => {
                warn!(identity = %label, "Login-code prompt timed out");
                return false;
            }
        };

        match self.client.sign_in(&code).await {
            Ok(SignInOutcome::Completed) => {
                log_audit_operation("restore", Some(label), "restored", None);
                self.record_authorization(label, AuthorizationState::Authorized);
                true
            }
            Ok(SignInOutcome::PasswordRequired) => {
                info!(identity = %label, "🔐 Second factor required");
                let password =
                    match timeout(self.config.prompt_timeout, self.prompt.password(label)).await {
                        Ok(Some(password)) => password,
                        Ok(None) => {
                            log_audit_operation("restore", Some(label), "cancelled", None);
                            return false;
                        }
                        Err(_) => {
                            warn!(identity = %label, "Passphrase prompt timed out");
                            return false;
                        }
                    };

                match self.client.sign_in_with_password(&password).await {
                    Ok(()) => {
                        log_audit_operation("restore", Some(label), "restored", None);
                        self.record_authorization(label, AuthorizationState::Authorized);
                        true
                    }
                    Err(e) => {
                        log_audit_operation(
                            "restore",
                            Some(label),
                            "failed",
                            Some(&e.to_string()),
                        );
                        false
                    }
                }
            }
            Err(e) => {
                log_audit_operation("restore", Some(label), "failed", Some(&e.to_string()));
                false
            }
        }
    }

    fn record_authorization(&self, label: &str, state: AuthorizationState) {
        if let Err(e) = self.store.mark_authorization(label, state) {
            warn!(identity = %label, error = %e, "Failed to record authorization state");
        }
    }
}

/// Contact address for login-code delivery: the stored address with a `+`
/// prefixed when absent.
fn contact_address(raw: &str) -> String {
    if raw.starts_with('+') {
        raw.to_string()
    } else {
        format!("+{raw}")
    }
}
