// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replication engine integration trait.
//!
//! The engine that shadows the WAL and ships it to replicas lives outside
//! this crate. The provider only needs to hand it an opened [`Database`]
//! and later tell it to stop.
//!
//! # Example
//!
//! ```rust,no_run
//! use replica_provider::database::Database;
//! use replica_provider::engine::{BoxFuture, ReplicationEngineRef};
//!
//! struct MyEngine;
//!
//! impl ReplicationEngineRef for MyEngine {
//!     fn start<'a>(&'a self, db: &'a Database) -> BoxFuture<'a, ()> {
//!         Box::pin(async move {
//!             println!("shadowing {} to {} replicas", db.path().display(), db.replicas.len());
//!             Ok(())
//!         })
//!     }
//!
//!     fn stop<'a>(&'a self, _db: &'a Database) -> BoxFuture<'a, ()> {
//!         Box::pin(async move { Ok(()) })
//!     }
//! }
//! ```

use crate::database::Database;
use crate::error::Result;
use std::future::Future;
use std::pin::Pin;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// What the provider needs from a replication engine.
///
/// `start` is called once the database is open and its replicas attached.
/// `stop` is called during shutdown, before the database is closed, so the
/// engine can flush pending WAL segments.
pub trait ReplicationEngineRef: Send + Sync + 'static {
    fn start<'a>(&'a self, db: &'a Database) -> BoxFuture<'a, ()>;

    fn stop<'a>(&'a self, db: &'a Database) -> BoxFuture<'a, ()>;
}

/// A no-op implementation for testing/standalone mode.
///
/// Logs the calls but replicates nothing.
#[derive(Debug, Clone, Default)]
pub struct NoOpReplicationEngine;

impl ReplicationEngineRef for NoOpReplicationEngine {
    fn start<'a>(&'a self, db: &'a Database) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            tracing::debug!(
                path = %db.path().display(),
                replicas = db.replicas.len(),
                "NoOp: would start replication"
            );
            Ok(())
        })
    }

    fn stop<'a>(&'a self, db: &'a Database) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            tracing::debug!(path = %db.path().display(), "NoOp: would stop replication");
            Ok(())
        })
    }
}
