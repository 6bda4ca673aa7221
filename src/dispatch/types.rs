// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Request and response types for the SQL database contract.
//!
//! Payloads are MessagePack maps with named fields:
//!
//! | Message | Fields |
//! |---------|--------|
//! | [`Statement`] | `sql`, `database` |
//! | [`ExecuteResult`] | `rowsAffected` |
//! | [`QueryResult`] | `columns: [{name, dbType}]`, `rows: bin`, `numRows` |
//!
//! `QueryResult::rows` is itself a MessagePack-encoded array of rows, each an
//! array of `nil | int | float | str | bin`.

use crate::database::ColumnInfo;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;

/// Operation tags accepted from actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Execute,
    Query,
    Ping,
}

impl Operation {
    pub const EXECUTE: &'static str = "SqlDb.Execute";
    pub const QUERY: &'static str = "SqlDb.Query";
    pub const PING: &'static str = "SqlDb.Ping";

    /// Parse an operation tag. Tags are case-sensitive.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            Self::EXECUTE => Some(Self::Execute),
            Self::QUERY => Some(Self::Query),
            Self::PING => Some(Self::Ping),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Execute => Self::EXECUTE,
            Self::Query => Self::QUERY,
            Self::Ping => Self::PING,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Response delivered back to the host for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderResponse {
    pub msg: Vec<u8>,
    pub error: Option<String>,
}

impl ProviderResponse {
    pub fn success(msg: Vec<u8>) -> Self {
        Self { msg, error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            msg: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// One inbound actor request.
///
/// The reply sender is consumed when the response is sent, so a request can
/// be answered at most once.
#[derive(Debug)]
pub struct RequestEnvelope {
    pub operation: String,
    pub payload: Vec<u8>,
    pub reply: oneshot::Sender<ProviderResponse>,
}

impl RequestEnvelope {
    /// Build an envelope and the receiver its response will arrive on.
    pub fn new(
        operation: impl Into<String>,
        payload: Vec<u8>,
    ) -> (Self, oneshot::Receiver<ProviderResponse>) {
        let (reply, rx) = oneshot::channel();
        (
            Self {
                operation: operation.into(),
                payload,
                reply,
            },
            rx,
        )
    }
}

/// Execute/Query request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    #[serde(default)]
    pub sql: String,
    /// Logical database name. Logged, not used for routing.
    #[serde(default)]
    pub database: String,
}

/// Execute response body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResult {
    pub rows_affected: u64,
}

/// Query response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub columns: Vec<ColumnInfo>,
    #[serde(with = "crate::database::serde_bin")]
    pub rows: Vec<u8>,
    pub num_rows: u64,
}
