//! # Session Repository
//!
//! Durable storage for identity sessions: authentication material, the
//! per-identity configuration document, and the recorded authorization
//! state. The repository root is injected explicitly; nothing in here scans
//! the working directory or moves files around on its own.

pub mod store;

pub use store::{AuthorizationState, SessionAuth, SessionStore, SessionStoreError};
