// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Log subscriber setup.
//!
//! Logs are JSON lines written to [`LogConfig::path`]. When that file cannot
//! be opened the subscriber writes to stderr instead. `RUST_LOG` overrides the
//! configured filter.

use crate::config::LogConfig;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Where log output ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    File(PathBuf),
    Stderr,
}

fn open_log_file(path: &str) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// A subscriber that is already installed is left in place.
pub fn init(config: &LogConfig) -> LogTarget {
    let builder = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter(config))
        .with_target(true)
        .with_current_span(true)
        .with_span_list(true);

    let (target, file_error, installed) = match config.path.as_deref() {
        Some(path) => match open_log_file(path) {
            Ok(file) => (
                LogTarget::File(PathBuf::from(path)),
                None,
                builder.with_writer(Mutex::new(file)).try_init(),
            ),
            Err(e) => (
                LogTarget::Stderr,
                Some(e),
                builder.with_writer(std::io::stderr).try_init(),
            ),
        },
        None => (
            LogTarget::Stderr,
            None,
            builder.with_writer(std::io::stderr).try_init(),
        ),
    };

    if let Some(e) = file_error {
        tracing::warn!(error = %e, "Failed to log to file, using stderr");
    }
    if installed.is_err() {
        tracing::debug!("Log subscriber already installed");
    }

    target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_falls_back_on_bad_directive() {
        let config = LogConfig {
            path: None,
            filter: "not a [valid filter".to_string(),
        };
        // Must not panic
        let _ = filter(&config);
    }

    #[test]
    fn test_init_unwritable_path_falls_back() {
        let config = LogConfig {
            path: Some("/nonexistent-dir/replica_provider.log".to_string()),
            filter: "debug".to_string(),
        };
        assert_eq!(init(&config), LogTarget::Stderr);
    }

    #[test]
    fn test_init_writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provider.log");
        let config = LogConfig {
            path: Some(path.to_string_lossy().to_string()),
            filter: "info".to_string(),
        };
        assert_eq!(init(&config), LogTarget::File(path.clone()));
        assert!(path.exists());
    }
}
