// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Provider lifecycle.
//!
//! The provider ties together:
//! - Link validation via [`crate::config::LinkConfig`]
//! - Database assembly via [`crate::assembler`]
//! - The external replication engine via [`ReplicationEngineRef`]
//! - The metrics endpoint via [`crate::exporter`]
//! - Log output via [`crate::telemetry`]
//! - Request serving via [`crate::dispatch`]
//!
//! # Startup
//!
//! 1. Wait for the first link definition (or shutdown).
//! 2. Validate the link values. Any missing key is fatal.
//! 3. Install the JSON log subscriber from the config's logging section.
//! 4. Assemble and open every configured database, then start replication.
//! 5. Start the metrics endpoint.
//! 6. Ask the host to deliver the actor's requests.
//!
//! Requests are only accepted after every step succeeded, so a bad link can
//! never lead to a request running against a half-configured database.

mod types;

pub use types::ProviderState;

use crate::assembler;
use crate::config::{LinkConfig, ProviderConfig};
use crate::database::Database;
use crate::dispatch::{run_dispatch_loop, Dispatcher, RequestEnvelope};
use crate::engine::{NoOpReplicationEngine, ReplicationEngineRef};
use crate::error::{ProviderError, Result};
use crate::exporter;
use crate::host::{wait_for_shutdown, HostChannels, HostRuntime, LinkDefinition, NoOpHost};
use crate::metrics;
use crate::replica::Credentials;
use crate::telemetry::{self, LogTarget};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How long shutdown waits for the metrics server to stop.
const METRICS_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// The SQL capability provider.
pub struct Provider<E: ReplicationEngineRef = NoOpReplicationEngine, H: HostRuntime = NoOpHost> {
    /// Host runtime (subscriptions)
    host: Arc<H>,

    /// External replication engine
    engine: Arc<E>,

    /// Provider state (broadcast to watchers)
    state_tx: watch::Sender<ProviderState>,

    /// Provider state receiver (for internal use)
    state_rx: watch::Receiver<ProviderState>,

    /// Internal shutdown signal for background tasks
    shutdown_tx: watch::Sender<bool>,

    /// Opened databases. The first one serves requests.
    databases: Vec<Arc<Database>>,

    metrics_server: Option<JoinHandle<()>>,

    /// Where logs are written, once [`Provider::start`] set it up.
    log_target: Option<LogTarget>,
}

impl Provider<NoOpReplicationEngine, NoOpHost> {
    /// Create a provider with no replication engine and no host (for testing/standalone).
    pub fn new() -> Self {
        Self::with_runtime(Arc::new(NoOpHost), Arc::new(NoOpReplicationEngine))
    }
}

impl Default for Provider<NoOpReplicationEngine, NoOpHost> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ReplicationEngineRef, H: HostRuntime> Provider<E, H> {
    /// Create a provider driving `engine` on behalf of `host`.
    pub fn with_runtime(host: Arc<H>, engine: Arc<E>) -> Self {
        let (state_tx, state_rx) = watch::channel(ProviderState::Created);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            host,
            engine,
            state_tx,
            state_rx,
            shutdown_tx,
            databases: Vec::new(),
            metrics_server: None,
            log_target: None,
        }
    }

    /// Get current provider state.
    pub fn state(&self) -> ProviderState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ProviderState> {
        self.state_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), ProviderState::Running)
    }

    /// Log destination chosen at startup, `None` before [`Provider::start`].
    pub fn log_target(&self) -> Option<&LogTarget> {
        self.log_target.as_ref()
    }

    /// Opened databases, in configuration order.
    pub fn databases(&self) -> &[Arc<Database>] {
        &self.databases
    }

    fn set_state(&self, state: ProviderState) {
        let _ = self.state_tx.send(state);
        metrics::set_provider_state(&state.to_string());
    }

    fn expect_state(&self, expected: ProviderState) -> Result<()> {
        let actual = self.state();
        if actual != expected {
            return Err(ProviderError::InvalidState {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    /// Run the provider against the host's channels until shutdown.
    ///
    /// Returns an error only when startup fails; the provider is then in
    /// [`ProviderState::Failed`] and has served no requests.
    pub async fn run(&mut self, channels: HostChannels) -> Result<()> {
        self.expect_state(ProviderState::Created)?;

        let HostChannels {
            shutdown,
            mut links,
            actions,
        } = channels;

        self.set_state(ProviderState::Configuring);
        info!("Ready for link definitions");

        let Some(link) = wait_for_link(&mut links, shutdown.clone()).await else {
            info!("Stopped before a link definition arrived");
            self.set_state(ProviderState::Stopped);
            return Ok(());
        };
        info!(actor_id = %link.actor_id, "Received link definition");

        let config = match LinkConfig::from_values(&link.values) {
            Ok(link_config) => ProviderConfig::from_link(&link_config),
            Err(e) => return self.fail(e).await,
        };

        if let Err(e) = self.start(&config).await {
            return self.fail(e).await;
        }

        if let Err(e) = self.host.listen_for_actor(&link.actor_id) {
            return self.fail(e).await;
        }
        info!(actor_id = %link.actor_id, "Listening for actor requests");

        self.serve(actions, shutdown).await?;
        self.shutdown().await;
        Ok(())
    }

    /// Set up logging, assemble every database, start replication and the
    /// metrics endpoint.
    ///
    /// On success the provider is [`ProviderState::Running`].
    pub async fn start(&mut self, config: &ProviderConfig) -> Result<()> {
        let state = self.state();
        if !matches!(state, ProviderState::Created | ProviderState::Configuring) {
            return Err(ProviderError::InvalidState {
                expected: "Created or Configuring".to_string(),
                actual: state.to_string(),
            });
        }
        self.set_state(ProviderState::Configuring);

        if self.log_target.is_none() {
            let target = telemetry::init(&config.logging);
            info!(log_target = ?target, "Logging initialized");
            self.log_target = Some(target);
        }

        config.validate()?;
        let global = Credentials::new(&config.access_key_id, &config.secret_access_key);

        info!(databases = config.dbs.len(), "Starting provider");

        for db_config in &config.dbs {
            let db = Arc::new(assembler::assemble(db_config, &global).await?);
            // Tracked before starting replication so a failed start still closes it
            self.databases.push(Arc::clone(&db));
            self.engine.start(&db).await?;
            info!(path = %db.path().display(), replicas = db.replicas.len(), "Replication started");
        }

        self.metrics_server =
            exporter::start_metrics_server(&config.addr, self.shutdown_tx.subscribe()).await?;

        self.set_state(ProviderState::Running);
        info!("Provider running");
        Ok(())
    }

    /// Serve requests until the channel closes or shutdown is signalled.
    ///
    /// Returns the number of requests dispatched.
    pub async fn serve(
        &self,
        actions: mpsc::Receiver<RequestEnvelope>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<u64> {
        self.expect_state(ProviderState::Running)?;

        let db = self
            .databases
            .first()
            .cloned()
            .ok_or_else(|| ProviderError::Internal("no database to serve".to_string()))?;

        Ok(run_dispatch_loop(actions, Dispatcher::new(db), shutdown_rx).await)
    }

    /// Shutdown the provider gracefully.
    ///
    /// Shutdown sequence:
    /// 1. Signal background tasks to stop
    /// 2. Stop replication for every database
    /// 3. Checkpoint and close databases
    /// 4. Wait for the metrics server to exit
    pub async fn shutdown(&mut self) {
        if self.state().is_terminal() {
            return;
        }
        info!("Shutting down provider");
        self.set_state(ProviderState::ShuttingDown);

        self.release().await;

        self.set_state(ProviderState::Stopped);
        info!("Provider stopped");
    }

    async fn release(&mut self) {
        let _ = self.shutdown_tx.send(true);

        for db in self.databases.drain(..) {
            if let Err(e) = self.engine.stop(&db).await {
                warn!(path = %db.path().display(), error = %e, "Failed to stop replication");
            }
            db.close().await;
        }
        metrics::set_replicas_attached(0);

        if let Some(server) = self.metrics_server.take() {
            match tokio::time::timeout(METRICS_STOP_TIMEOUT, server).await {
                Ok(Ok(())) => debug!("Metrics server stopped"),
                Ok(Err(e)) => warn!(error = %e, "Metrics server panicked during shutdown"),
                Err(_) => warn!("Metrics server did not stop in time"),
            }
        }
    }

    async fn fail(&mut self, e: ProviderError) -> Result<()> {
        error!(
            error = %e,
            category = e.category().as_str(),
            fatal = e.is_fatal(),
            "Provider failed to start"
        );
        metrics::record_error(e.category());
        self.release().await;
        self.set_state(ProviderState::Failed);
        Err(e)
    }
}

async fn wait_for_link(
    links: &mut mpsc::Receiver<LinkDefinition>,
    shutdown_rx: watch::Receiver<bool>,
) -> Option<LinkDefinition> {
    tokio::select! {
        biased;
        _ = wait_for_shutdown(shutdown_rx) => None,
        link = links.recv() => link,
    }
}
