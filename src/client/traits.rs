//! The platform client trait consumed by the orchestrator and the auditor.

use async_trait::async_trait;
use std::time::Duration;

use crate::client::errors::{ClientError, GrantError};
use crate::orchestration::types::{Destination, Target};
use crate::session::{AuthorizationState, SessionAuth};

/// One member of a destination resource, as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    /// Numeric account id
    pub id: i64,
    /// Public handle, when the account has one
    pub handle: Option<String>,
}

/// Outcome of a sign-in attempt with a login code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInOutcome {
    /// Sign-in completed; the session is authorized
    Completed,
    /// The platform requires the account's second-factor passphrase
    PasswordRequired,
}

/// Capability interface over the remote messaging platform.
///
/// All calls are sequential from the caller's point of view; the core never
/// issues concurrent calls against one client.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Connect using the identity's durable authentication material and
    /// report the session's authorization state.
    async fn connect(&self, auth: &SessionAuth) -> Result<AuthorizationState, ClientError>;

    /// Resolve a normalized destination reference to its numeric id
    async fn resolve_destination(&self, reference: &str) -> Result<i64, ClientError>;

    /// Fetch one page of the destination's member list.
    ///
    /// A page shorter than `limit` (including an empty page) signals the end
    /// of the listing.
    async fn list_members(
        &self,
        destination: &Destination,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<MemberRecord>, ClientError>;

    /// Grant the target membership (or the configured role) in the
    /// destination.
    async fn grant(&self, destination: &Destination, target: &Target) -> Result<(), GrantError>;

    /// Liveness probe: ask the platform's status utility for the account's
    /// standing and wait up to `wait` for a single reply.
    async fn probe_status(&self, wait: Duration) -> Result<String, ClientError>;

    /// Request a login code be sent to the given contact address
    async fn request_login_code(&self, contact: &str) -> Result<(), ClientError>;

    /// Attempt sign-in with a login code
    async fn sign_in(&self, code: &str) -> Result<SignInOutcome, ClientError>;

    /// Complete sign-in with the second-factor passphrase
    async fn sign_in_with_password(&self, password: &str) -> Result<(), ClientError>;
}
