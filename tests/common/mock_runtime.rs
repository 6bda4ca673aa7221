//! Recording mocks for the host runtime and replication engine.

use replica_provider::engine::BoxFuture;
use replica_provider::{Database, HostRuntime, ProviderError, ReplicationEngineRef};
use std::path::PathBuf;
use std::sync::Mutex;

/// Engine that records which databases it was started and stopped for.
#[derive(Default)]
pub struct MockEngine {
    started: Mutex<Vec<PathBuf>>,
    stopped: Mutex<Vec<PathBuf>>,
    replica_counts: Mutex<Vec<usize>>,
    fail_start: bool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine whose `start` always fails.
    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn started(&self) -> Vec<PathBuf> {
        self.started.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> Vec<PathBuf> {
        self.stopped.lock().unwrap().clone()
    }

    pub fn replica_counts(&self) -> Vec<usize> {
        self.replica_counts.lock().unwrap().clone()
    }
}

impl ReplicationEngineRef for MockEngine {
    fn start<'a>(&'a self, db: &'a Database) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if self.fail_start {
                return Err(ProviderError::Internal("replication refused to start".to_string()));
            }
            self.started.lock().unwrap().push(db.path().to_path_buf());
            self.replica_counts.lock().unwrap().push(db.replicas.len());
            Ok(())
        })
    }

    fn stop<'a>(&'a self, db: &'a Database) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.stopped.lock().unwrap().push(db.path().to_path_buf());
            Ok(())
        })
    }
}

/// Host that records subscriptions.
#[derive(Default)]
pub struct MockHost {
    listened: Mutex<Vec<String>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listened(&self) -> Vec<String> {
        self.listened.lock().unwrap().clone()
    }
}

impl HostRuntime for MockHost {
    fn listen_for_actor(&self, actor_id: &str) -> replica_provider::Result<()> {
        self.listened.lock().unwrap().push(actor_id.to_string());
        Ok(())
    }
}
