// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Actor request dispatch.
//!
//! The dispatch loop bridges host request envelopes to the local database:
//!
//! ```text
//! actions (mpsc) ──► run_dispatch_loop ──► tokio::spawn per envelope
//!                                              │
//!                          Dispatcher::handle(operation, payload)
//!                                              │
//!                               envelope.reply (oneshot) ◄── ProviderResponse
//! ```
//!
//! # Guarantees
//!
//! - Every accepted envelope gets exactly one response, including when the
//!   handler panics.
//! - The loop never waits on a request. Slow statements only hold their own task.
//! - After shutdown, envelopes still queued in the channel are answered with a
//!   shutdown error instead of being dropped.
//!
//! Responses to concurrent requests may complete in any order.

pub mod codec;
mod types;

pub use types::{
    ExecuteResult, Operation, ProviderResponse, QueryResult, RequestEnvelope, Statement,
};

use crate::database::Database;
use crate::error::{ErrorCategory, ProviderError, Result};
use crate::metrics;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument, Span};

/// How long shutdown waits for in-flight requests.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Routes requests to the database.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    db: Arc<Database>,
}

impl Dispatcher {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Handle one request and build its response.
    ///
    /// Never fails: errors become the response's `error` string.
    pub async fn handle(&self, operation: &str, payload: &[u8]) -> ProviderResponse {
        let Some(op) = Operation::from_tag(operation) else {
            warn!(operation, "Invalid SQLdb operation");
            metrics::record_error(ErrorCategory::Request);
            return ProviderResponse::failure(format!("Invalid SQLdb Operation: {}", operation));
        };

        let start = Instant::now();
        let result = match op {
            Operation::Ping => codec::encode_pong(),
            Operation::Execute => self.execute(payload).await,
            Operation::Query => self.query(payload).await,
        };
        let elapsed = start.elapsed();
        metrics::record_request(op.as_tag(), result.is_ok(), elapsed);

        match result {
            Ok(msg) => {
                debug!(latency_ms = elapsed.as_millis() as u64, "Request complete");
                ProviderResponse::success(msg)
            }
            Err(e) => {
                warn!(error = %e, category = e.category().as_str(), "Request failed");
                metrics::record_error(e.category());
                ProviderResponse::failure(e.to_string())
            }
        }
    }

    async fn execute(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let statement = decode(payload)?;
        let rows_affected = self.db.execute(&statement.sql).await?;
        codec::encode_execute_result(&ExecuteResult { rows_affected })
    }

    async fn query(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let statement = decode(payload)?;
        let output = self.db.query(&statement.sql).await?;
        debug!(columns = output.columns.len(), rows = output.rows.len(), "Query complete");
        codec::encode_query_output(&output)
    }
}

fn decode(payload: &[u8]) -> Result<Statement> {
    let statement = codec::decode_statement(payload)?;
    Span::current().record("database", statement.database.as_str());
    Ok(statement)
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Handle one envelope and send its reply.
async fn serve(dispatcher: Dispatcher, envelope: RequestEnvelope) {
    let RequestEnvelope {
        operation,
        payload,
        reply,
    } = envelope;

    let response = match AssertUnwindSafe(dispatcher.handle(&operation, &payload))
        .catch_unwind()
        .await
    {
        Ok(response) => response,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!(operation = %operation, panic = message, "Request handler panicked");
            metrics::record_request_panic(&operation);
            ProviderResponse::failure(format!("request handler panicked: {}", message))
        }
    };

    if reply.send(response).is_err() {
        debug!(operation = %operation, "Requester went away before the response was sent");
    }
}

/// Consume envelopes until the channel closes or shutdown is signalled.
///
/// Each envelope is served on its own task. Returns the number of envelopes
/// dispatched.
pub async fn run_dispatch_loop(
    mut actions: mpsc::Receiver<RequestEnvelope>,
    dispatcher: Dispatcher,
    mut shutdown_rx: watch::Receiver<bool>,
) -> u64 {
    // Mark initial shutdown value as seen so changed() only fires on actual changes
    let _ = shutdown_rx.borrow_and_update();
    let mut shutting_down = *shutdown_rx.borrow();

    let mut tasks = JoinSet::new();
    let mut dispatched = 0u64;

    info!("Dispatch loop started");

    while !shutting_down {
        tokio::select! {
            biased;

            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    info!("Shutdown signal received, no longer accepting requests");
                    shutting_down = true;
                }
            }

            envelope = actions.recv() => {
                let Some(envelope) = envelope else {
                    info!("Request channel closed");
                    break;
                };

                dispatched += 1;
                let span = info_span!(
                    "request",
                    operation = %envelope.operation,
                    database = tracing::field::Empty,
                    seq = dispatched,
                );
                tasks.spawn(serve(dispatcher.clone(), envelope).instrument(span));
            }

            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "Request task failed");
                }
            }
        }
    }

    if shutting_down {
        reject_queued(&mut actions);
    }

    drain(tasks).await;
    info!(dispatched, "Dispatch loop stopped");
    dispatched
}

/// Answer envelopes that were queued but never picked up.
fn reject_queued(actions: &mut mpsc::Receiver<RequestEnvelope>) {
    actions.close();
    let mut rejected = 0usize;
    while let Ok(envelope) = actions.try_recv() {
        let _ = envelope
            .reply
            .send(ProviderResponse::failure(ProviderError::Shutdown.to_string()));
        rejected += 1;
    }
    if rejected > 0 {
        info!(rejected, "Rejected queued requests during shutdown");
    }
}

async fn drain(mut tasks: JoinSet<()>) {
    let in_flight = tasks.len();
    if in_flight == 0 {
        return;
    }
    info!(in_flight, "Waiting for in-flight requests");

    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Request task failed during drain");
            }
        }
    })
    .await;

    if drained.is_err() {
        warn!(remaining = tasks.len(), "In-flight requests still running after drain timeout");
        // Detached tasks keep running and still reply.
        tasks.detach_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqlValue;
    use tempfile::TempDir;

    async fn dispatcher() -> (TempDir, Dispatcher) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        std::fs::File::create(&path).unwrap();
        let mut db = Database::new(&path);
        db.open().await.unwrap();
        (dir, Dispatcher::new(Arc::new(db)))
    }

    fn statement(sql: &str) -> Vec<u8> {
        codec::encode_statement(&Statement {
            sql: sql.to_string(),
            database: "main".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let (_dir, dispatcher) = dispatcher().await;
        let response = dispatcher.handle("SqlDb.Drop", &[]).await;
        assert_eq!(response.error.as_deref(), Some("Invalid SQLdb Operation: SqlDb.Drop"));
        assert!(response.msg.is_empty());
    }

    #[tokio::test]
    async fn test_ping_ignores_payload() {
        let (_dir, dispatcher) = dispatcher().await;
        let response = dispatcher.handle(Operation::PING, b"garbage").await;
        assert!(response.is_success());
        assert_eq!(codec::decode_pong(&response.msg).unwrap(), "pong");
    }

    #[tokio::test]
    async fn test_execute_then_query() {
        let (_dir, dispatcher) = dispatcher().await;

        let created = dispatcher
            .handle(Operation::EXECUTE, &statement("CREATE TABLE t (id INTEGER)"))
            .await;
        assert!(created.is_success(), "{:?}", created.error);

        let inserted = dispatcher
            .handle(Operation::EXECUTE, &statement("INSERT INTO t VALUES (1)"))
            .await;
        let result = codec::decode_execute_result(&inserted.msg).unwrap();
        assert_eq!(result.rows_affected, 1);

        let queried = dispatcher
            .handle(Operation::QUERY, &statement("SELECT id FROM t"))
            .await;
        let result = codec::decode_query_result(&queried.msg).unwrap();
        assert_eq!(result.num_rows, 1);
        assert_eq!(result.columns[0].name, "id");
        assert_eq!(result.columns[0].db_type, "integer");
        assert_eq!(codec::decode_rows(&result.rows).unwrap(), vec![vec![SqlValue::Integer(1)]]);
    }

    #[tokio::test]
    async fn test_decode_failure_does_not_execute() {
        let (_dir, dispatcher) = dispatcher().await;
        let response = dispatcher.handle(Operation::EXECUTE, &[0xc1]).await;
        assert!(response.error.unwrap().starts_with("Decode error"));
    }

    #[tokio::test]
    async fn test_sql_error_is_reported() {
        let (_dir, dispatcher) = dispatcher().await;
        let response = dispatcher
            .handle(Operation::QUERY, &statement("SELECT * FROM missing_table"))
            .await;
        assert!(response.error.unwrap().contains("missing_table"));
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn test_loop_ends_when_channel_closes() {
        let (_dir, dispatcher) = dispatcher().await;
        let (tx, rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let (envelope, reply) = RequestEnvelope::new(Operation::PING, Vec::new());
        tx.send(envelope).await.unwrap();
        drop(tx);

        let dispatched = run_dispatch_loop(rx, dispatcher, shutdown_rx).await;
        assert_eq!(dispatched, 1);
        assert!(reply.await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_queued_requests_rejected_after_shutdown() {
        let (_dir, dispatcher) = dispatcher().await;
        let (tx, rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(true);

        let (envelope, reply) = RequestEnvelope::new(Operation::PING, Vec::new());
        tx.send(envelope).await.unwrap();

        let dispatched = run_dispatch_loop(rx, dispatcher, shutdown_rx).await;
        assert_eq!(dispatched, 0);
        assert_eq!(
            reply.await.unwrap().error.as_deref(),
            Some("Shutdown in progress")
        );
    }
}
