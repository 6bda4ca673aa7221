// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! MessagePack encoding for request and response bodies.

use super::types::{ExecuteResult, QueryResult, Statement};
use crate::database::{QueryOutput, SqlValue};
use crate::error::Result;

/// Marker returned for `SqlDb.Ping`.
pub const PONG: &str = "pong";

pub fn decode_statement(payload: &[u8]) -> Result<Statement> {
    Ok(rmp_serde::from_slice(payload)?)
}

pub fn encode_statement(statement: &Statement) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(statement)?)
}

pub fn encode_execute_result(result: &ExecuteResult) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(result)?)
}

pub fn decode_execute_result(bytes: &[u8]) -> Result<ExecuteResult> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Encode a query result. Rows are packed into their own byte string first.
pub fn encode_query_output(output: &QueryOutput) -> Result<Vec<u8>> {
    let result = QueryResult {
        columns: output.columns.clone(),
        rows: rmp_serde::to_vec(&output.rows)?,
        num_rows: output.rows.len() as u64,
    };
    Ok(rmp_serde::to_vec_named(&result)?)
}

pub fn decode_query_result(bytes: &[u8]) -> Result<QueryResult> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Unpack the `rows` byte string of a [`QueryResult`].
pub fn decode_rows(rows: &[u8]) -> Result<Vec<Vec<SqlValue>>> {
    Ok(rmp_serde::from_slice(rows)?)
}

pub fn encode_pong() -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(PONG)?)
}

pub fn decode_pong(bytes: &[u8]) -> Result<String> {
    Ok(rmp_serde::from_slice(bytes)?)
}
