use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum RosterError {
    SessionError(String),
    ConfigurationError(String),
    ClientError(String),
    OrchestrationError(String),
    ValidationError(String),
}

impl fmt::Display for RosterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterError::SessionError(msg) => write!(f, "Session error: {msg}"),
            RosterError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            RosterError::ClientError(msg) => write!(f, "Client error: {msg}"),
            RosterError::OrchestrationError(msg) => write!(f, "Orchestration error: {msg}"),
            RosterError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
        }
    }
}

impl std::error::Error for RosterError {}

impl From<crate::config::ConfigError> for RosterError {
    fn from(err: crate::config::ConfigError) -> Self {
        RosterError::ConfigurationError(err.to_string())
    }
}

impl From<crate::session::SessionStoreError> for RosterError {
    fn from(err: crate::session::SessionStoreError) -> Self {
        RosterError::SessionError(err.to_string())
    }
}

impl From<crate::client::ClientError> for RosterError {
    fn from(err: crate::client::ClientError) -> Self {
        RosterError::ClientError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RosterError>;
