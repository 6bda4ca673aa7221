// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Provider lifecycle tests driven through the host channels.
//!
//! Each test spawns `Provider::run` with recording mocks and plays the host's
//! side: deliver a link, send requests, signal shutdown.

mod common;

use common::{link_values, MockEngine, MockHost, TempDb};
use replica_provider::dispatch::codec;
use replica_provider::{
    HostChannels, LinkDefinition, Operation, Provider, ProviderError, ProviderState,
    RequestEnvelope,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

const STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Host side of a running provider.
struct Harness {
    shutdown_tx: watch::Sender<bool>,
    links_tx: mpsc::Sender<LinkDefinition>,
    actions_tx: mpsc::Sender<RequestEnvelope>,
    state_rx: watch::Receiver<ProviderState>,
    engine: Arc<MockEngine>,
    host: Arc<MockHost>,
    task: JoinHandle<(Provider<MockEngine, MockHost>, replica_provider::Result<()>)>,
}

fn spawn_provider(engine: MockEngine) -> Harness {
    let (shutdown_tx, shutdown) = watch::channel(false);
    let (links_tx, links) = mpsc::channel(4);
    let (actions_tx, actions) = mpsc::channel(16);

    let engine = Arc::new(engine);
    let host = Arc::new(MockHost::new());
    let mut provider = Provider::with_runtime(Arc::clone(&host), Arc::clone(&engine));
    let state_rx = provider.state_receiver();

    let task = tokio::spawn(async move {
        let result = provider
            .run(HostChannels {
                shutdown,
                links,
                actions,
            })
            .await;
        (provider, result)
    });

    Harness {
        shutdown_tx,
        links_tx,
        actions_tx,
        state_rx,
        engine,
        host,
        task,
    }
}

async fn wait_for_state(state_rx: &mut watch::Receiver<ProviderState>, wanted: ProviderState) {
    tokio::time::timeout(STEP_TIMEOUT, state_rx.wait_for(|s| *s == wanted || s.is_terminal()))
        .await
        .expect("state change in time")
        .expect("provider alive");
}

fn link(values: std::collections::HashMap<String, String>) -> LinkDefinition {
    LinkDefinition {
        actor_id: "actor-1".to_string(),
        values,
    }
}

#[tokio::test]
async fn test_valid_link_serves_requests_until_shutdown() {
    let db = TempDb::new();
    let mut h = spawn_provider(MockEngine::new());

    h.links_tx.send(link(link_values(&db.path_str()))).await.unwrap();
    wait_for_state(&mut h.state_rx, ProviderState::Running).await;
    assert_eq!(*h.state_rx.borrow(), ProviderState::Running);

    let (ping, reply) = RequestEnvelope::new(Operation::PING, Vec::new());
    h.actions_tx.send(ping).await.unwrap();
    let response = tokio::time::timeout(STEP_TIMEOUT, reply).await.unwrap().unwrap();
    assert!(response.is_success());
    assert_eq!(codec::decode_pong(&response.msg).unwrap(), "pong");

    h.shutdown_tx.send(true).unwrap();
    let (provider, result) = tokio::time::timeout(STEP_TIMEOUT, h.task).await.unwrap().unwrap();
    result.unwrap();

    assert_eq!(provider.state(), ProviderState::Stopped);
    assert!(provider.databases().is_empty());
    assert_eq!(h.host.listened(), vec!["actor-1".to_string()]);
    assert_eq!(h.engine.started(), vec![db.path.clone()]);
    assert_eq!(h.engine.stopped(), vec![db.path.clone()]);
    assert_eq!(h.engine.replica_counts(), vec![1]);
}

#[tokio::test]
async fn test_execute_and_query_through_provider() {
    let db = TempDb::new();
    let mut h = spawn_provider(MockEngine::new());

    h.links_tx.send(link(link_values(&db.path_str()))).await.unwrap();
    wait_for_state(&mut h.state_rx, ProviderState::Running).await;

    for sql in ["CREATE TABLE kv (k TEXT, v BLOB)", "INSERT INTO kv VALUES ('a', x'00ff')"] {
        let (envelope, reply) = common::request(Operation::EXECUTE, sql);
        h.actions_tx.send(envelope).await.unwrap();
        assert!(reply.await.unwrap().is_success());
    }

    let (query, reply) = common::request(Operation::QUERY, "SELECT k, v FROM kv");
    h.actions_tx.send(query).await.unwrap();
    let response = reply.await.unwrap();
    let result = codec::decode_query_result(&response.msg).unwrap();
    assert_eq!(result.num_rows, 1);
    let names: Vec<_> = result.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["k", "v"]);

    // Closing the request channel ends the provider like a shutdown signal
    drop(h.actions_tx);
    let (provider, result) = tokio::time::timeout(STEP_TIMEOUT, h.task).await.unwrap().unwrap();
    result.unwrap();
    assert_eq!(provider.state(), ProviderState::Stopped);
}

#[tokio::test]
async fn test_missing_link_key_fails_without_serving() {
    let db = TempDb::new();
    let h = spawn_provider(MockEngine::new());

    let mut values = link_values(&db.path_str());
    values.remove("S3URL");

    // Queued before the link; must never be served
    let (ping, reply) = RequestEnvelope::new(Operation::PING, Vec::new());
    h.actions_tx.send(ping).await.unwrap();
    h.links_tx.send(link(values)).await.unwrap();

    let (provider, result) = tokio::time::timeout(STEP_TIMEOUT, h.task).await.unwrap().unwrap();
    match result {
        Err(ProviderError::Config(msg)) => assert!(msg.contains("S3URL"), "{}", msg),
        other => panic!("expected Config error, got {:?}", other),
    }
    assert_eq!(provider.state(), ProviderState::Failed);
    assert!(h.host.listened().is_empty());
    assert!(h.engine.started().is_empty());

    // Provider dropped its receiver without answering
    drop(provider);
    assert!(reply.await.is_err());
}

#[tokio::test]
async fn test_missing_database_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.db");
    let h = spawn_provider(MockEngine::new());

    h.links_tx
        .send(link(link_values(&missing.to_string_lossy())))
        .await
        .unwrap();

    let (provider, result) = tokio::time::timeout(STEP_TIMEOUT, h.task).await.unwrap().unwrap();
    assert!(matches!(result, Err(ProviderError::DatabaseOpen { .. })));
    assert_eq!(provider.state(), ProviderState::Failed);
    assert!(!missing.exists());
    assert!(h.host.listened().is_empty());
}

#[tokio::test]
async fn test_failing_engine_fails_and_closes_database() {
    let db = TempDb::new();
    let h = spawn_provider(MockEngine::failing());

    h.links_tx.send(link(link_values(&db.path_str()))).await.unwrap();

    let (provider, result) = tokio::time::timeout(STEP_TIMEOUT, h.task).await.unwrap().unwrap();
    assert!(matches!(result, Err(ProviderError::Internal(_))));
    assert_eq!(provider.state(), ProviderState::Failed);
    assert!(provider.databases().is_empty());
    // The opened database is still handed back to the engine for stopping
    assert_eq!(h.engine.stopped(), vec![db.path.clone()]);
    assert!(h.host.listened().is_empty());
}

#[tokio::test]
async fn test_links_channel_closed_stops_provider() {
    let h = spawn_provider(MockEngine::new());
    drop(h.links_tx);

    let (provider, result) = tokio::time::timeout(STEP_TIMEOUT, h.task).await.unwrap().unwrap();
    result.unwrap();
    assert_eq!(provider.state(), ProviderState::Stopped);
    assert!(h.engine.started().is_empty());
}
