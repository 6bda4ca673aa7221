//! Scratch databases and request helpers.

use replica_provider::dispatch::codec;
use replica_provider::{Database, Dispatcher, ProviderResponse, RequestEnvelope};
use replica_provider::dispatch::Statement;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::oneshot;

/// An empty SQLite file in its own temp directory.
///
/// The directory is removed when this is dropped.
pub struct TempDb {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TempDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("app.db");
        std::fs::File::create(&path).expect("create db file");
        Self { dir, path }
    }

    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    /// Open the file and wrap it in a dispatcher.
    pub async fn dispatcher(&self) -> Dispatcher {
        let mut db = Database::new(&self.path);
        db.open().await.expect("open db");
        Dispatcher::new(Arc::new(db))
    }
}

/// Encode an Execute/Query payload.
pub fn statement(sql: &str) -> Vec<u8> {
    codec::encode_statement(&Statement {
        sql: sql.to_string(),
        database: "test".to_string(),
    })
    .expect("encode statement")
}

/// Build an envelope for `operation` with a statement payload.
pub fn request(operation: &str, sql: &str) -> (RequestEnvelope, oneshot::Receiver<ProviderResponse>) {
    RequestEnvelope::new(operation, statement(sql))
}

/// Link values with every required key present.
pub fn link_values(db_location: &str) -> HashMap<String, String> {
    [
        ("URL", "127.0.0.1:0"),
        ("AccessKeyID", "AKIATEST"),
        ("SecretAccessKey", "test-secret"),
        ("S3URL", "s3://test-bucket/app.db"),
        ("DBLocation", db_location),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}
