//! File-backed session store.
//!
//! Layout under the injected root:
//!
//! ```text
//! <root>/sessions/<label>.session          authentication material (opaque)
//! <root>/sessions/<label>.session-journal  client-side journal (opaque)
//! <root>/sessions/<label>.state.json       recorded authorization state
//! <root>/configs/<label>.json              identity configuration document
//! ```
//!
//! Authorization state is written atomically (temp file + rename) so a
//! concurrent reader never observes a torn record. Last-writer-wins is
//! acceptable: at most one run per identity is permitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{ConfigError, IdentityConfig};
use crate::orchestration::types::Identity;

/// Errors raised by the session store
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("no session found for identity '{label}'")]
    NotFound { label: String },
    #[error("session store I/O failure at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode authorization record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Authorization state of an identity, as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationState {
    Unknown,
    Authorized,
    Unauthorized,
}

/// Durable authentication material reference for one identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAuth {
    pub label: String,
    pub material_path: PathBuf,
}

/// On-disk authorization record
#[derive(Debug, Serialize, Deserialize)]
struct AuthorizationRecord {
    state: AuthorizationState,
    updated_at: DateTime<Utc>,
}

/// File-backed session repository rooted at an injected directory
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions_dir: PathBuf,
    configs_dir: PathBuf,
}

impl SessionStore {
    /// Create a store rooted at `root`. Directories are created on first
    /// write, not here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            sessions_dir: root.join("sessions"),
            configs_dir: root.join("configs"),
        }
    }

    /// Resolve a label to its authentication material
    pub fn resolve(&self, label: &str) -> Result<SessionAuth, SessionStoreError> {
        let material_path = self.sessions_dir.join(format!("{label}.session"));
        if !material_path.exists() {
            return Err(SessionStoreError::NotFound {
                label: label.to_string(),
            });
        }
        Ok(SessionAuth {
            label: label.to_string(),
            material_path,
        })
    }

    /// Last recorded authorization state for a label.
    ///
    /// A missing or unreadable record reads as `Unknown`.
    pub fn authorization(&self, label: &str) -> AuthorizationState {
        let path = self.state_path(label);
        let Ok(raw) = fs::read_to_string(&path) else {
            return AuthorizationState::Unknown;
        };
        match serde_json::from_str::<AuthorizationRecord>(&raw) {
            Ok(record) => record.state,
            Err(_) => AuthorizationState::Unknown,
        }
    }

    /// Record the authorization state for a label, atomically
    pub fn mark_authorization(
        &self,
        label: &str,
        state: AuthorizationState,
    ) -> Result<(), SessionStoreError> {
        fs::create_dir_all(&self.sessions_dir).map_err(|source| SessionStoreError::Io {
            path: self.sessions_dir.display().to_string(),
            source,
        })?;

        let record = AuthorizationRecord {
            state,
            updated_at: Utc::now(),
        };
        let encoded = serde_json::to_string_pretty(&record)?;

        let final_path = self.state_path(label);
        let tmp_path = self.sessions_dir.join(format!("{label}.state.json.tmp"));
        fs::write(&tmp_path, encoded).map_err(|source| SessionStoreError::Io {
            path: tmp_path.display().to_string(),
            source,
        })?;
        fs::rename(&tmp_path, &final_path).map_err(|source| SessionStoreError::Io {
            path: final_path.display().to_string(),
            source,
        })?;

        tracing::debug!(
            identity = %label,
            state = ?state,
            "💾 Recorded authorization state"
        );
        Ok(())
    }

    /// Remove every artifact belonging to a label: session material, the
    /// client journal, the configuration document, and the state record.
    /// Missing files are not an error.
    pub fn discard(&self, label: &str) -> Result<(), SessionStoreError> {
        let candidates = [
            self.sessions_dir.join(format!("{label}.session")),
            self.sessions_dir.join(format!("{label}.session-journal")),
            self.state_path(label),
            self.config_path(label),
        ];

        for path in candidates {
            if let Err(source) = fs::remove_file(&path) {
                if source.kind() != std::io::ErrorKind::NotFound {
                    return Err(SessionStoreError::Io {
                        path: path.display().to_string(),
                        source,
                    });
                }
            }
        }

        tracing::info!(identity = %label, "🗑️ Discarded session artifacts");
        Ok(())
    }

    /// Path of the identity configuration document for a label
    pub fn config_path(&self, label: &str) -> PathBuf {
        self.configs_dir.join(format!("{label}.json"))
    }

    /// Load and resolve the identity configuration document for a label
    pub fn load_identity_config(&self, label: &str) -> Result<IdentityConfig, SessionStoreError> {
        Ok(IdentityConfig::load(self.config_path(label), label)?)
    }

    /// Assemble the read-only identity view used by a run
    pub fn load_identity(&self, label: &str) -> Result<Identity, SessionStoreError> {
        let auth = self.resolve(label)?;
        let authorization = self.authorization(label);
        Ok(Identity {
            label: label.to_string(),
            auth,
            authorization,
        })
    }

    /// Labels of every identity with session material in the repository
    pub fn list_labels(&self) -> Result<Vec<String>, SessionStoreError> {
        let entries = match fs::read_dir(&self.sessions_dir) {
            Ok(entries) => entries,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(SessionStoreError::Io {
                    path: self.sessions_dir.display().to_string(),
                    source,
                });
            }
        };

        let mut labels = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SessionStoreError::Io {
                path: self.sessions_dir.display().to_string(),
                source,
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(label) = name.strip_suffix(".session") {
                labels.push(label.to_string());
            }
        }
        labels.sort();
        Ok(labels)
    }

    fn state_path(&self, label: &str) -> PathBuf {
        self.sessions_dir.join(format!("{label}.state.json"))
    }
}
