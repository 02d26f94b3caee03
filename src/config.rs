//! # Configuration Management
//!
//! Per-identity configuration documents and shared pacing settings.
//!
//! Two historical document shapes exist in the wild: the current form nests
//! credentials under a `platform_api` section, the legacy form carries
//! `app_id`/`app_secret` at the top level. Both are resolved once at load
//! time into the canonical [`IdentityConfig`]; nothing downstream branches on
//! document shape.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::orchestration::types::PacingPolicy;

/// Errors raised while loading configuration documents
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Canonical per-identity configuration, resolved once at load time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityConfig {
    /// Application id issued by the platform
    pub app_id: i64,
    /// Application secret issued by the platform
    pub app_secret: String,
    /// Contact address or account label this identity authenticates as
    pub phone_or_label: String,
    /// Destination resource reference, when the document pins one
    pub destination_ref: Option<String>,
}

impl IdentityConfig {
    /// Load and resolve an identity document from disk.
    ///
    /// `label` supplies the fallback contact address when the document does
    /// not carry one (older documents never did).
    pub fn load(path: impl AsRef<Path>, label: &str) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw, label)
    }

    /// Resolve an identity document from its JSON text
    pub fn from_json_str(raw: &str, label: &str) -> Result<Self, ConfigError> {
        let document: RawIdentityDocument = serde_json::from_str(raw)?;
        Ok(document.resolve(label))
    }
}

/// Raw identity document: one tagged variant per historical schema.
///
/// Deserialization tries the current nested shape first, then the legacy
/// flat shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawIdentityDocument {
    Nested {
        platform_api: RawCredentials,
        #[serde(default)]
        destination: Option<RawDestination>,
    },
    Legacy {
        #[serde(deserialize_with = "app_id_from_string_or_number")]
        app_id: i64,
        app_secret: String,
        #[serde(default)]
        phone: Option<String>,
        #[serde(default)]
        destination_ref: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct RawCredentials {
    #[serde(deserialize_with = "app_id_from_string_or_number")]
    app_id: i64,
    app_secret: String,
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDestination {
    destination_ref: Option<String>,
}

impl RawIdentityDocument {
    fn resolve(self, label: &str) -> IdentityConfig {
        match self {
            RawIdentityDocument::Nested {
                platform_api,
                destination,
            } => IdentityConfig {
                app_id: platform_api.app_id,
                app_secret: platform_api.app_secret,
                phone_or_label: platform_api.phone.unwrap_or_else(|| label.to_string()),
                destination_ref: destination.and_then(|d| d.destination_ref),
            },
            RawIdentityDocument::Legacy {
                app_id,
                app_secret,
                phone,
                destination_ref,
            } => IdentityConfig {
                app_id,
                app_secret,
                phone_or_label: phone.unwrap_or_else(|| label.to_string()),
                destination_ref,
            },
        }
    }
}

/// Older documents store the application id as a JSON string, newer ones as
/// a number. Accept both.
fn app_id_from_string_or_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| D::Error::custom("app_id is not an integer")),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| D::Error::custom(format!("app_id is not numeric: {e}"))),
        other => Err(D::Error::custom(format!(
            "app_id has unsupported type: {other}"
        ))),
    }
}

/// Shared pacing settings document
#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    /// Delay between consecutive grant attempts, in seconds
    #[serde(default = "default_per_item_delay_secs")]
    pub per_item_delay_secs: u64,
    /// Number of processed targets per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Delay between batches, in seconds
    #[serde(default = "default_inter_batch_delay_secs")]
    pub inter_batch_delay_secs: u64,
    /// Present in older documents; parsed for compatibility, never enforced
    #[serde(default)]
    pub max_retries: Option<u32>,
}

fn default_per_item_delay_secs() -> u64 {
    4
}

fn default_batch_size() -> usize {
    10
}

fn default_inter_batch_delay_secs() -> u64 {
    300
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            per_item_delay_secs: default_per_item_delay_secs(),
            batch_size: default_batch_size(),
            inter_batch_delay_secs: default_inter_batch_delay_secs(),
            max_retries: None,
        }
    }
}

/// Settings document wrapper: `{"pacing": {...}}`
#[derive(Debug, Default, Deserialize)]
struct SettingsDocument {
    #[serde(default)]
    pacing: Option<PacingConfig>,
}

impl PacingConfig {
    /// Load pacing settings from a `{"pacing": {...}}` document
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Parse pacing settings from JSON text
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let document: SettingsDocument = serde_json::from_str(raw)?;
        Ok(document.pacing.unwrap_or_default())
    }

    /// Convert into the run-loop pacing policy.
    ///
    /// `max_retries` is a dead field from older documents: the run loop
    /// never retried and still does not, so the value is logged and dropped.
    pub fn into_policy(self) -> PacingPolicy {
        if let Some(retries) = self.max_retries {
            tracing::warn!(
                max_retries = retries,
                "⚠️ pacing document sets max_retries, which is not enforced - ignoring"
            );
        }

        PacingPolicy {
            per_item_delay: Duration::from_secs(self.per_item_delay_secs),
            batch_size: self.batch_size,
            inter_batch_delay: Duration::from_secs(self.inter_batch_delay_secs),
        }
    }
}
