//! Typed errors surfaced by the platform client.
//!
//! [`GrantError`] is the per-target error the failure classifier consumes;
//! [`ClientError`] covers session-level and listing operations. Opaque RPC
//! rejections keep their raw detail string so the classifier can fall back
//! to message-pattern analysis.

use thiserror::Error;

/// Session-level and listing errors
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("failed to connect to the platform: {0}")]
    Connection(String),
    #[error("session is not authorized: {0}")]
    Unauthorized(String),
    #[error("failed to resolve destination '{reference}': {reason}")]
    Resolution { reference: String, reason: String },
    #[error("failed to list members: {0}")]
    Listing(String),
    #[error("status probe failed: {0}")]
    Probe(String),
    #[error("sign-in failed: {0}")]
    SignIn(String),
    #[error("platform rejected the request: {0}")]
    Rpc(String),
}

/// Per-target grant errors
#[derive(Debug, Clone, Error)]
pub enum GrantError {
    /// The acting identity lacks the privilege to grant membership
    #[error("insufficient privilege: {0}")]
    InsufficientPrivilege(String),
    /// Cool-down restriction: the platform flagged the identity as recently
    /// authorized or rate-limited
    #[error("cool-down restriction: {0}")]
    CoolDown(String),
    /// The target itself was rejected (blocked, privacy-restricted, invalid)
    #[error("target rejected: {0}")]
    TargetRejected(String),
    /// Transient network fault
    #[error("network fault: {0}")]
    Network(String),
    /// Opaque platform rejection; detail string carries whatever the
    /// platform reported
    #[error("platform error: {0}")]
    Rpc(String),
}
