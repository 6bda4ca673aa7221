// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Host runtime interface.
//!
//! The host plugin runtime delivers three things to the provider, each on its
//! own channel:
//!
//! - a shutdown signal (`watch<bool>`, `true` means stop)
//! - link definitions, the first of which configures the provider
//! - request envelopes for the linked actor
//!
//! Request envelopes only start flowing after
//! [`HostRuntime::listen_for_actor`] subscribes to the actor.

use crate::dispatch::RequestEnvelope;
use crate::error::Result;
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};

/// A link between an actor and this provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkDefinition {
    pub actor_id: String,
    /// Link configuration values (see [`crate::config::LinkConfig`]).
    pub values: HashMap<String, String>,
}

/// Channels the host runtime feeds the provider.
#[derive(Debug)]
pub struct HostChannels {
    pub shutdown: watch::Receiver<bool>,
    pub links: mpsc::Receiver<LinkDefinition>,
    pub actions: mpsc::Receiver<RequestEnvelope>,
}

/// Host-side operations the provider calls.
pub trait HostRuntime: Send + Sync + 'static {
    /// Subscribe to request traffic for `actor_id`.
    fn listen_for_actor(&self, actor_id: &str) -> Result<()>;
}

/// Host that accepts every subscription without doing anything.
#[derive(Debug, Clone, Default)]
pub struct NoOpHost;

impl HostRuntime for NoOpHost {
    fn listen_for_actor(&self, actor_id: &str) -> Result<()> {
        tracing::debug!(actor_id, "NoOp: would listen for actor");
        Ok(())
    }
}

/// Resolve once shutdown is signalled or the signal's sender is gone.
pub async fn wait_for_shutdown(mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_for_shutdown_signal() {
        let (tx, rx) = watch::channel(false);
        let waiter = tokio::spawn(wait_for_shutdown(rx));

        tx.send(false).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_sender_dropped() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), wait_for_shutdown(rx))
            .await
            .unwrap();
    }

    #[test]
    fn test_noop_host_accepts() {
        assert!(NoOpHost.listen_for_actor("actor-1").is_ok());
    }
}
