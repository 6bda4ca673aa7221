//! Shared test utilities for integration tests.
//!
//! This module provides:
//! - Scratch SQLite databases in temp directories
//! - Recording ReplicationEngineRef and HostRuntime mocks
//! - Request helpers for the dispatch loop

#![allow(dead_code)]

pub mod fixtures;
pub mod mock_runtime;

pub use fixtures::*;
pub use mock_runtime::*;
