//! # Platform Client Capability
//!
//! The remote messaging platform is consumed as an opaque capability: the
//! orchestration core never speaks the wire protocol itself. [`PlatformClient`]
//! is the seam: real deployments hand in a client backed by the platform
//! SDK, tests hand in a mock that scripts responses and records calls.

pub mod errors;
pub mod traits;

pub use errors::{ClientError, GrantError};
pub use traits::{MemberRecord, PlatformClient, SignInOutcome};
