// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Replica Provider
//!
//! A SQL capability provider that serves actor requests against a local
//! SQLite database while an external engine replicates it to file or
//! S3-compatible object storage.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                            replica-provider                               │
//! │                                                                           │
//! │  LinkDefinition ──► LinkConfig ──► ProviderConfig                         │
//! │                                         │                                 │
//! │                                         ▼                                 │
//! │  ┌────────────────┐  ┌──────────────┐    ┌───────────────────────────┐    │
//! │  │ ReplicaUrl     │─►│ resolve()    │───►│ assemble() → Database     │    │
//! │  │ HostDescriptor │  │ (precedence) │    │ (SQLite pool + replicas)  │    │
//! │  └────────────────┘  └──────────────┘    └───────────────────────────┘    │
//! │                                                      │                    │
//! │                                                      ▼                    │
//! │  RequestEnvelope (mpsc) ──► run_dispatch_loop ──► Dispatcher ──► reply    │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use replica_provider::{Provider, HostChannels};
//! use tokio::sync::{mpsc, watch};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (_shutdown_tx, shutdown) = watch::channel(false);
//!     let (_links_tx, links) = mpsc::channel(1);
//!     let (_actions_tx, actions) = mpsc::channel(64);
//!
//!     let mut provider = Provider::new();
//!     provider
//!         .run(HostChannels { shutdown, links, actions })
//!         .await
//!         .expect("provider failed to start");
//! }
//! ```

pub mod assembler;
pub mod config;
pub mod database;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod exporter;
pub mod host;
pub mod metrics;
pub mod provider;
pub mod replica;
pub mod telemetry;

// Re-exports for convenience
pub use assembler::assemble;
pub use config::{DatabaseConfig, LinkConfig, LogConfig, ProviderConfig, ReplicaConfigInput};
pub use database::{ColumnInfo, Database, QueryOutput, SqlValue};
pub use dispatch::{run_dispatch_loop, Dispatcher, Operation, ProviderResponse, RequestEnvelope};
pub use engine::{NoOpReplicationEngine, ReplicationEngineRef};
pub use error::{ErrorCategory, ProviderError, Result};
pub use host::{HostChannels, HostRuntime, LinkDefinition};
pub use provider::{Provider, ProviderState};
pub use replica::{HostDescriptor, Replica, ReplicaClient, ReplicaConfig, ReplicaKind, ReplicaUrl};
