// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Database/replica assembly.
//!
//! [`assemble`] turns one [`DatabaseConfig`] into an opened [`Database`]:
//!
//! 1. Expand the path (`~` against the home directory, otherwise absolute).
//! 2. Apply engine setting overrides on top of the defaults.
//! 3. Resolve every replica input and attach its client.
//! 4. Open the SQLite handle.
//!
//! Assembly is all-or-nothing. A failing replica aborts the whole database
//! before the file is touched.

use crate::config::DatabaseConfig;
use crate::database::{Database, EngineSettings};
use crate::error::{ProviderError, Result};
use crate::metrics;
use crate::replica::{self, Credentials, Replica, ReplicaClient};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Expand a leading `~` and make the path absolute.
pub fn expand_path(path: &str) -> Result<PathBuf> {
    if path == "~" || path.starts_with("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| ProviderError::HomeDirectoryUnavailable(path.to_string()))?;
        let rest = path.trim_start_matches('~').trim_start_matches('/');
        return Ok(if rest.is_empty() { home } else { home.join(rest) });
    }

    let path = Path::new(path);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

/// Build the engine settings for `cfg`, keeping defaults for unset fields.
pub fn engine_settings(cfg: &DatabaseConfig) -> Result<EngineSettings> {
    let defaults = EngineSettings::default();
    Ok(EngineSettings {
        monitor_interval: cfg
            .monitor_interval_duration()?
            .unwrap_or(defaults.monitor_interval),
        checkpoint_interval: cfg
            .checkpoint_interval_duration()?
            .unwrap_or(defaults.checkpoint_interval),
        min_checkpoint_page_count: cfg
            .min_checkpoint_page_count
            .unwrap_or(defaults.min_checkpoint_page_count),
        max_checkpoint_page_count: cfg
            .max_checkpoint_page_count
            .unwrap_or(defaults.max_checkpoint_page_count),
    })
}

/// Resolve every replica input of `cfg` in declaration order.
pub fn build_replicas(cfg: &DatabaseConfig, global: &Credentials) -> Result<Vec<Replica>> {
    cfg.replicas
        .iter()
        .map(|input| replica::resolve(input, global).map(|resolved| Replica::from_config(&resolved)))
        .collect()
}

/// Assemble and open the database described by `cfg`.
#[instrument(skip_all, fields(path = %cfg.path))]
pub async fn assemble(cfg: &DatabaseConfig, global: &Credentials) -> Result<Database> {
    let path = expand_path(&cfg.path)?;

    let mut db = Database::new(path);
    db.settings = engine_settings(cfg)?;
    db.replicas = build_replicas(cfg, global)?;
    db.set_max_connections(cfg.max_connections);

    db.open().await?;
    metrics::record_database_opened();
    metrics::set_replicas_attached(db.replicas.len());

    for replica in &db.replicas {
        log_replica(&db, replica);
    }

    Ok(db)
}

fn log_replica(db: &Database, replica: &Replica) {
    match &replica.client {
        ReplicaClient::File(client) => info!(
            db = %db.path().display(),
            name = replica.name(),
            kind = %replica.kind(),
            path = %client.path.display(),
            sync_interval = ?replica.schedule.sync_interval,
            "Replica attached"
        ),
        ReplicaClient::ObjectStore(client) => info!(
            db = %db.path().display(),
            name = replica.name(),
            kind = %replica.kind(),
            bucket = %client.bucket,
            path = %client.path,
            region = %client.region,
            endpoint = %client.endpoint,
            sync_interval = ?replica.schedule.sync_interval,
            "Replica attached"
        ),
    }
}
