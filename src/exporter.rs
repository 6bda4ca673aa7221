// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Prometheus scrape endpoint.
//!
//! Installs a `metrics-exporter-prometheus` recorder behind the facade used in
//! [`crate::metrics`] and serves its rendering at `GET /metrics`.
//!
//! The bind address is `host:port`. A missing port is a configuration error.
//! An empty host binds every interface and is advertised as `localhost`.
//! Failing to bind is not fatal: the provider keeps serving requests without
//! a scrape endpoint.

use crate::error::{ProviderError, Result};
use crate::host::wait_for_shutdown;
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Mutex;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Parsed metrics bind address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsAddr {
    /// Address passed to the listener.
    pub bind: String,
    /// Address shown in logs.
    pub advertised: String,
}

impl MetricsAddr {
    /// Parse `host:port`, `:port` or `[v6]:port`.
    pub fn parse(addr: &str) -> Result<Self> {
        let addr = addr.trim();
        let (host, port) = addr.rsplit_once(':').ok_or_else(|| {
            ProviderError::Config(format!("metrics address {:?} is missing a port", addr))
        })?;

        let port: u16 = port.parse().map_err(|_| {
            ProviderError::Config(format!("metrics address {:?} has an invalid port", addr))
        })?;

        if host.is_empty() {
            return Ok(Self {
                bind: format!("0.0.0.0:{}", port),
                advertised: format!("localhost:{}", port),
            });
        }

        let unbracketed = host.trim_start_matches('[').trim_end_matches(']');
        if unbracketed.contains(':') && !host.starts_with('[') {
            return Err(ProviderError::Config(format!(
                "metrics address {:?} must bracket IPv6 hosts",
                addr
            )));
        }

        Ok(Self {
            bind: format!("{}:{}", host, port),
            advertised: format!("{}:{}", host, port),
        })
    }
}

static RECORDER: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Install the Prometheus recorder, or return the one already installed.
pub fn install_recorder() -> Result<PrometheusHandle> {
    let mut slot = RECORDER
        .lock()
        .map_err(|_| ProviderError::Internal("metrics recorder lock poisoned".to_string()))?;
    if let Some(handle) = slot.as_ref() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ProviderError::Internal(format!("failed to install metrics recorder: {}", e)))?;
    *slot = Some(handle.clone());
    Ok(handle)
}

/// Router serving `GET /metrics`.
pub fn router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(handle)
}

async fn render_metrics(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

/// Start serving metrics until shutdown.
///
/// Returns `Ok(None)` when `addr` is empty or the listener cannot be bound.
pub async fn start_metrics_server(
    addr: &str,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<Option<JoinHandle<()>>> {
    if addr.trim().is_empty() {
        info!("Metrics endpoint disabled");
        return Ok(None);
    }

    let addr = MetricsAddr::parse(addr)?;
    let handle = install_recorder()?;

    let listener = match TcpListener::bind(&addr.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!(addr = %addr.bind, error = %e, "Failed to bind metrics endpoint, continuing without it");
            return Ok(None);
        }
    };

    info!(url = %format!("http://{}/metrics", addr.advertised), "Serving metrics");

    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router(handle))
            .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
            .await;
        if let Err(e) = result {
            warn!(error = %e, "Metrics server stopped with error");
        }
    });

    Ok(Some(server))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_host() {
        let addr = MetricsAddr::parse(":9090").unwrap();
        assert_eq!(addr.bind, "0.0.0.0:9090");
        assert_eq!(addr.advertised, "localhost:9090");
    }

    #[test]
    fn test_parse_host_port() {
        let addr = MetricsAddr::parse("127.0.0.1:9090").unwrap();
        assert_eq!(addr.bind, "127.0.0.1:9090");
        assert_eq!(addr.advertised, "127.0.0.1:9090");

        let addr = MetricsAddr::parse("[::1]:9090").unwrap();
        assert_eq!(addr.bind, "[::1]:9090");
    }

    #[test]
    fn test_parse_missing_port() {
        for bad in ["localhost", "localhost:", "localhost:http", "::1", ""] {
            let err = MetricsAddr::parse(bad).unwrap_err();
            assert!(matches!(err, ProviderError::Config(_)), "addr {:?}", bad);
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn test_install_recorder_is_idempotent() {
        let first = install_recorder().unwrap();
        let second = install_recorder().unwrap();
        crate::metrics::record_database_opened();
        assert!(first.render().contains("replica_provider_databases_opened_total"));
        assert!(second.render().contains("replica_provider_databases_opened_total"));
    }

    #[tokio::test]
    async fn test_disabled_when_empty() {
        let (_tx, rx) = watch::channel(false);
        assert!(start_metrics_server("", rx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_stops_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let server = start_metrics_server("127.0.0.1:0", rx)
            .await
            .unwrap()
            .expect("bind to an ephemeral port");

        tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
    }
}
