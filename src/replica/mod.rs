// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replica configuration and clients.
//!
//! A replica is a destination that a database's WAL changes are shipped to.
//! Turning user config into a replica takes three steps:
//!
//! ```text
//! ReplicaConfigInput ──► resolve() ──► ReplicaConfig ──► Replica
//!        │                  │                              ├── ReplicaClient (File | ObjectStore)
//!        │          ReplicaUrl::parse()                    └── ReplicaSchedule (effective intervals)
//!        │          HostDescriptor::decode()
//! ```
//!
//! The set of client kinds is closed: a new backend is a new
//! [`ReplicaKind`] variant with matching arms in [`resolve`] and
//! [`ReplicaClient::from_config`].

pub mod host;
pub mod resolve;
pub mod url;

pub use host::HostDescriptor;
pub use resolve::resolve;
pub use url::ReplicaUrl;

use crate::error::{ProviderError, Result};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default retention of snapshots and WAL segments.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
/// Default interval between retention enforcement passes.
pub const DEFAULT_RETENTION_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// Default interval between WAL syncs to the replica.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(1);
/// Default interval between snapshots.
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = DEFAULT_RETENTION;

/// Kind of replica client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplicaKind {
    /// Local or mounted filesystem.
    File,
    /// S3-compatible object store.
    ObjectStore,
}

impl ReplicaKind {
    /// Map a URL scheme or `type` field to a kind.
    pub fn from_type(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "s3" => Ok(Self::ObjectStore),
            _ => Err(ProviderError::UnknownReplicaType(value.to_string())),
        }
    }

    /// Type name as used in config and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::ObjectStore => "s3",
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::ObjectStore)
    }
}

impl fmt::Display for ReplicaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object-store credentials.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_key_id.is_empty() && self.secret_access_key.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Interval overrides from config. `None` keeps the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicaIntervals {
    pub retention: Option<Duration>,
    pub retention_check: Option<Duration>,
    pub sync: Option<Duration>,
    pub snapshot: Option<Duration>,
    pub validation: Option<Duration>,
}

/// A fully resolved replica description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaConfig {
    pub kind: ReplicaKind,
    pub name: Option<String>,
    /// Filesystem path (file) or key prefix within the bucket (s3).
    pub path: String,
    pub bucket: String,
    pub region: String,
    pub endpoint: String,
    pub force_path_style: bool,
    pub credentials: Credentials,
    pub skip_tls_verify: bool,
    pub intervals: ReplicaIntervals,
}

/// Effective replica timing after defaults are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaSchedule {
    pub retention: Duration,
    pub retention_check_interval: Duration,
    pub sync_interval: Duration,
    pub snapshot_interval: Duration,
    /// `None` disables periodic validation.
    pub validation_interval: Option<Duration>,
}

impl Default for ReplicaSchedule {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
            retention_check_interval: DEFAULT_RETENTION_CHECK_INTERVAL,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            validation_interval: None,
        }
    }
}

impl ReplicaSchedule {
    /// Apply overrides on top of the defaults.
    pub fn with_overrides(intervals: &ReplicaIntervals) -> Self {
        let defaults = Self::default();
        Self {
            retention: intervals.retention.unwrap_or(defaults.retention),
            retention_check_interval: intervals
                .retention_check
                .unwrap_or(defaults.retention_check_interval),
            sync_interval: intervals.sync.unwrap_or(defaults.sync_interval),
            snapshot_interval: intervals.snapshot.unwrap_or(defaults.snapshot_interval),
            validation_interval: intervals.validation.or(defaults.validation_interval),
        }
    }
}

/// Client for a filesystem replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReplicaClient {
    pub path: PathBuf,
}

/// Client settings for an S3-compatible replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreClient {
    pub credentials: Credentials,
    pub bucket: String,
    pub path: String,
    pub region: String,
    pub endpoint: String,
    pub force_path_style: bool,
    pub skip_verify: bool,
}

/// The client attached to a replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaClient {
    File(FileReplicaClient),
    ObjectStore(ObjectStoreClient),
}

impl ReplicaClient {
    /// Build the client matching `config.kind`.
    pub fn from_config(config: &ReplicaConfig) -> Self {
        match config.kind {
            ReplicaKind::File => Self::File(FileReplicaClient {
                path: PathBuf::from(&config.path),
            }),
            ReplicaKind::ObjectStore => Self::ObjectStore(ObjectStoreClient {
                credentials: config.credentials.clone(),
                bucket: config.bucket.clone(),
                path: config.path.clone(),
                region: config.region.clone(),
                endpoint: config.endpoint.clone(),
                force_path_style: config.force_path_style,
                skip_verify: config.skip_tls_verify,
            }),
        }
    }

    pub fn kind(&self) -> ReplicaKind {
        match self {
            Self::File(_) => ReplicaKind::File,
            Self::ObjectStore(_) => ReplicaKind::ObjectStore,
        }
    }
}

/// A replica attached to a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replica {
    name: Option<String>,
    pub client: ReplicaClient,
    pub schedule: ReplicaSchedule,
}

impl Replica {
    /// Build a replica from a resolved config.
    pub fn from_config(config: &ReplicaConfig) -> Self {
        Self {
            name: config.name.clone().filter(|n| !n.is_empty()),
            client: ReplicaClient::from_config(config),
            schedule: ReplicaSchedule::with_overrides(&config.intervals),
        }
    }

    /// Replica name, defaulting to the client type.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.client.kind().as_str())
    }

    pub fn kind(&self) -> ReplicaKind {
        self.client.kind()
    }
}
