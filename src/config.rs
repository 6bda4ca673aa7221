// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the replica provider.
//!
//! Configuration arrives in one of two shapes:
//!
//! 1. A host link definition: a flat string map validated into [`LinkConfig`]
//!    and expanded with [`ProviderConfig::from_link()`].
//! 2. A full [`ProviderConfig`], constructed programmatically or deserialized
//!    from YAML/JSON.
//!
//! # Configuration Structure
//!
//! ```text
//! ProviderConfig
//! ├── addr: String                 # metrics bind address ("" = disabled)
//! ├── access_key_id / secret_access_key   # global object-store credentials
//! ├── logging: LogConfig
//! └── dbs: Vec<DatabaseConfig>
//!     ├── path: String             # "~/" is expanded
//!     ├── monitor_interval, checkpoint_interval: Option<"1s">
//!     ├── min/max_checkpoint_page_count: Option<u32>
//!     └── replicas: Vec<ReplicaConfigInput>
//! ```
//!
//! # JSON Example
//!
//! ```json
//! {
//!   "addr": ":9090",
//!   "dbs": [{
//!     "path": "/var/lib/app/app.db",
//!     "checkpoint_interval": "30s",
//!     "replicas": [
//!       { "url": "s3://app-backups/app.db", "sync_interval": "10s" }
//!     ]
//!   }]
//! }
//! ```

use crate::error::{ProviderError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// Link definition keys
// ═══════════════════════════════════════════════════════════════════════════════

pub const KEY_METRICS_ADDR: &str = "URL";
pub const KEY_ACCESS_KEY_ID: &str = "AccessKeyID";
pub const KEY_SECRET_ACCESS_KEY: &str = "SecretAccessKey";
pub const KEY_REPLICA_URL: &str = "S3URL";
pub const KEY_DB_LOCATION: &str = "DBLocation";

const REQUIRED_LINK_KEYS: [&str; 5] = [
    KEY_METRICS_ADDR,
    KEY_ACCESS_KEY_ID,
    KEY_SECRET_ACCESS_KEY,
    KEY_REPLICA_URL,
    KEY_DB_LOCATION,
];

/// Validated values from a host link definition.
///
/// All five keys are required and must be non-empty.
#[derive(Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Metrics bind address (`host:port`).
    pub metrics_addr: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Replica target URL.
    pub replica_url: String,
    /// Path to the local database file.
    pub db_location: String,
}

impl LinkConfig {
    /// Validate a link definition's values.
    ///
    /// Fails with [`ProviderError::Config`] naming every missing or empty key.
    pub fn from_values(values: &HashMap<String, String>) -> Result<Self> {
        let missing: Vec<&str> = REQUIRED_LINK_KEYS
            .iter()
            .copied()
            .filter(|key| values.get(*key).map_or(true, |v| v.trim().is_empty()))
            .collect();

        if !missing.is_empty() {
            return Err(ProviderError::Config(format!(
                "invalid link configuration, missing required keys: {}",
                missing.join(", ")
            )));
        }

        let get = |key: &str| values.get(key).cloned().unwrap_or_default();
        Ok(Self {
            metrics_addr: get(KEY_METRICS_ADDR),
            access_key_id: get(KEY_ACCESS_KEY_ID),
            secret_access_key: get(KEY_SECRET_ACCESS_KEY),
            replica_url: get(KEY_REPLICA_URL),
            db_location: get(KEY_DB_LOCATION),
        })
    }
}

// Secrets stay out of logs.
impl fmt::Debug for LinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkConfig")
            .field("metrics_addr", &self.metrics_addr)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("replica_url", &self.replica_url)
            .field("db_location", &self.db_location)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ProviderConfig: top level
// ═══════════════════════════════════════════════════════════════════════════════

/// The top-level provider configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Bind address for serving metrics. Empty disables the endpoint.
    #[serde(default)]
    pub addr: String,

    /// Databases to manage.
    #[serde(default)]
    pub dbs: Vec<DatabaseConfig>,

    /// Global object-store credentials, used when a replica sets none.
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,

    #[serde(default)]
    pub logging: LogConfig,
}

impl ProviderConfig {
    /// Build the single-database, single-replica config described by a link.
    pub fn from_link(link: &LinkConfig) -> Self {
        let replica = ReplicaConfigInput {
            url: link.replica_url.clone(),
            access_key_id: link.access_key_id.clone(),
            secret_access_key: link.secret_access_key.clone(),
            ..Default::default()
        };

        Self {
            addr: link.metrics_addr.clone(),
            dbs: vec![DatabaseConfig {
                replicas: vec![replica],
                ..DatabaseConfig::for_path(&link.db_location)
            }],
            access_key_id: link.access_key_id.clone(),
            secret_access_key: link.secret_access_key.clone(),
            logging: LogConfig::default(),
        }
    }

    /// Check the config can be assembled at all.
    pub fn validate(&self) -> Result<()> {
        if self.dbs.is_empty() {
            return Err(ProviderError::Config(
                "no databases specified in configuration".to_string(),
            ));
        }
        for db in &self.dbs {
            if db.path.trim().is_empty() {
                return Err(ProviderError::Config("database path required".to_string()));
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DatabaseConfig: one entry per local database
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for a single local database and its replicas.
///
/// Unset overrides keep the engine defaults (see [`crate::assembler`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite file. A leading `~` is expanded.
    pub path: String,

    /// How often the engine checks the WAL for changes (e.g. "1s").
    #[serde(default)]
    pub monitor_interval: Option<String>,

    /// How often the engine forces a checkpoint (e.g. "1m").
    #[serde(default)]
    pub checkpoint_interval: Option<String>,

    #[serde(default)]
    pub min_checkpoint_page_count: Option<u32>,

    #[serde(default)]
    pub max_checkpoint_page_count: Option<u32>,

    /// Connection pool size for serving requests.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Replicas in declaration order.
    #[serde(default)]
    pub replicas: Vec<ReplicaConfigInput>,
}

fn default_max_connections() -> u32 {
    4
}

impl DatabaseConfig {
    /// Create a config for `path` with no overrides and no replicas.
    pub fn for_path(path: &str) -> Self {
        Self {
            path: path.to_string(),
            monitor_interval: None,
            checkpoint_interval: None,
            min_checkpoint_page_count: None,
            max_checkpoint_page_count: None,
            max_connections: default_max_connections(),
            replicas: Vec::new(),
        }
    }

    /// Parse the monitor interval override.
    pub fn monitor_interval_duration(&self) -> Result<Option<Duration>> {
        parse_optional_duration("monitor_interval", self.monitor_interval.as_deref())
    }

    /// Parse the checkpoint interval override.
    pub fn checkpoint_interval_duration(&self) -> Result<Option<Duration>> {
        parse_optional_duration("checkpoint_interval", self.checkpoint_interval.as_deref())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ReplicaConfigInput: raw replica fields before resolution
// ═══════════════════════════════════════════════════════════════════════════════

/// Replica settings as written by the user.
///
/// Either `url` or the explicit `path`/`bucket` fields name the target, never
/// both for the same field. See [`crate::replica::resolve`] for the rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicaConfigInput {
    /// "file" or "s3". Ignored when `url` has a scheme.
    #[serde(rename = "type")]
    pub replica_type: String,

    /// Optional replica name, used in logs.
    pub name: Option<String>,

    /// Filesystem path (file) or key prefix (s3).
    pub path: String,

    /// Replica URL, e.g. `s3://bucket/prefix` or `file:///backups/app`.
    pub url: String,

    pub retention: Option<String>,
    pub retention_check_interval: Option<String>,
    pub sync_interval: Option<String>,
    pub snapshot_interval: Option<String>,
    pub validation_interval: Option<String>,

    // Object-store settings
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,
    pub endpoint: String,
    /// `None` means "derive from endpoint / URL".
    pub force_path_style: Option<bool>,
    pub skip_verify: bool,
}

impl ReplicaConfigInput {
    /// Create an input that only sets `url`.
    pub fn for_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LogConfig
// ═══════════════════════════════════════════════════════════════════════════════

/// Log output settings used by [`crate::telemetry::init`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// JSON log file. Falls back to stderr when it cannot be opened.
    /// `None` logs to stderr directly.
    #[serde(default = "default_log_path")]
    pub path: Option<String>,

    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_path() -> Option<String> {
    Some("/tmp/replica_provider.log".to_string())
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            filter: default_log_filter(),
        }
    }
}

/// Parse an optional human-readable duration ("10s", "1m", "500ms").
pub fn parse_optional_duration(field: &str, value: Option<&str>) -> Result<Option<Duration>> {
    match value {
        None => Ok(None),
        Some(raw) => humantime::parse_duration(raw.trim())
            .map(Some)
            .map_err(|_| ProviderError::InvalidDuration {
                field: field.to_string(),
                value: raw.to_string(),
            }),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
