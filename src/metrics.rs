// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics for observability.
//!
//! Records provider-level metrics through the `metrics` facade:
//! - Requests served, by operation and outcome
//! - Request latency
//! - Databases opened and replicas attached
//! - SQLite busy retries
//! - Errors by category
//! - Provider lifecycle state
//!
//! Nothing is exported unless a recorder is installed (see [`crate::exporter`]).
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `replica_provider_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration)

use crate::error::ErrorCategory;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a completed request.
pub fn record_request(operation: &str, success: bool, duration: Duration) {
    let outcome = if success { "success" } else { "failure" };
    counter!(
        "replica_provider_requests_total",
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("replica_provider_request_duration_seconds", "operation" => operation.to_string())
        .record(duration.as_secs_f64());
}

/// Record a request whose handler panicked.
pub fn record_request_panic(operation: &str) {
    counter!("replica_provider_request_panics_total", "operation" => operation.to_string()).increment(1);
}

/// Record a successfully opened database.
pub fn record_database_opened() {
    counter!("replica_provider_databases_opened_total").increment(1);
}

/// Gauge for replicas attached to the served database.
pub fn set_replicas_attached(count: usize) {
    gauge!("replica_provider_replicas_attached").set(count as f64);
}

/// Record SQLite retry (for SQLITE_BUSY/SQLITE_LOCKED).
pub fn record_sqlite_retry(operation: &str) {
    counter!("replica_provider_sqlite_retries_total", "operation" => operation.to_string()).increment(1);
}

/// Record errors by category.
pub fn record_error(category: ErrorCategory) {
    counter!("replica_provider_errors_total", "category" => category.as_str()).increment(1);
}

/// Gauge for provider state.
pub fn set_provider_state(state: &str) {
    // Numeric for alerting
    let value = match state {
        "Created" => 0.0,
        "Configuring" => 1.0,
        "Running" => 2.0,
        "ShuttingDown" => 3.0,
        "Stopped" => 4.0,
        "Failed" => 5.0,
        _ => -1.0,
    };
    gauge!("replica_provider_state").set(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    // The facade is a no-op without a recorder; these only check nothing panics.

    #[test]
    fn test_record_request() {
        record_request("SqlDb.Execute", true, Duration::from_millis(3));
        record_request("SqlDb.Query", false, Duration::ZERO);
        record_request("", true, Duration::from_secs(1));
    }

    #[test]
    fn test_record_request_panic() {
        record_request_panic("SqlDb.Query");
    }

    #[test]
    fn test_database_metrics() {
        record_database_opened();
        set_replicas_attached(0);
        set_replicas_attached(3);
        record_sqlite_retry("checkpoint");
    }

    #[test]
    fn test_record_error_all_categories() {
        for category in [
            ErrorCategory::Configuration,
            ErrorCategory::ReplicaResolution,
            ErrorCategory::Assembly,
            ErrorCategory::Request,
            ErrorCategory::Internal,
        ] {
            record_error(category);
        }
    }

    #[test]
    fn test_set_provider_state() {
        for state in ["Created", "Configuring", "Running", "ShuttingDown", "Stopped", "Failed", "Unknown"] {
            set_provider_state(state);
        }
    }
}
