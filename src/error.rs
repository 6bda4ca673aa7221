// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the replica provider.
//!
//! Every fallible operation in the crate returns [`ProviderError`]. Variants
//! are grouped into categories that decide how far an error travels:
//!
//! | Category | Variants | Effect |
//! |----------|----------|--------|
//! | `Configuration` | `Config` | Fatal. The provider never starts serving. |
//! | `ReplicaResolution` | `UrlParse`, `MissingScheme`, `PathIsUrl`, `ConflictingSource`, `MissingBucket`, `MissingPath`, `UnknownReplicaType`, `InvalidDuration` | Aborts construction of the owning database. |
//! | `Assembly` | `HomeDirectoryUnavailable`, `DatabaseOpen`, `Io` | Aborts startup for that database. |
//! | `Request` | `Decode`, `Encode`, `Sql` | Local to one request; returned to the actor as a string. |
//! | `Internal` | `InvalidState`, `Shutdown`, `Internal` | Lifecycle misuse or bugs. |
//!
//! Use [`ProviderError::is_fatal()`] to decide whether startup must abort.

use crate::replica::url::ReplicaUrl;
use thiserror::Error;

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Coarse error category, used for logging and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    ReplicaResolution,
    Assembly,
    Request,
    Internal,
}

impl ErrorCategory {
    /// Label used in metrics and structured logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::ReplicaResolution => "replica_resolution",
            Self::Assembly => "assembly",
            Self::Request => "request",
            Self::Internal => "internal",
        }
    }
}

/// Errors that can occur while configuring the provider or serving requests.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Invalid or missing configuration.
    ///
    /// Raised for missing link-definition keys and bad bind addresses.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The replica URL could not be parsed at all.
    #[error("Invalid replica URL {url:?}: {reason}")]
    UrlParse { url: String, reason: String },

    /// The replica URL has no scheme.
    ///
    /// Carries whatever host/path could be recovered so callers can report it.
    #[error("Replica URL scheme required: {url}")]
    MissingScheme { url: String, partial: ReplicaUrl },

    /// A URL was supplied in the `path` field.
    #[error("Replica path cannot be a URL, please use the 'url' field instead: {0}")]
    PathIsUrl(String),

    /// Both the URL and an explicit field supply the same value.
    #[error("Cannot specify url & {field} for replica")]
    ConflictingSource { field: &'static str },

    /// Object-store replica resolved without a bucket.
    #[error("Bucket required for {kind} replica")]
    MissingBucket { kind: &'static str },

    /// File replica resolved without a path.
    #[error("Path required for file replica")]
    MissingPath,

    /// Replica type or URL scheme has no matching client.
    #[error("Unknown replica type in config: {0:?}")]
    UnknownReplicaType(String),

    /// A duration string could not be parsed.
    #[error("Invalid duration for {field}: {value:?}")]
    InvalidDuration { field: String, value: String },

    /// `~` expansion requested but no home directory is known.
    #[error("Cannot expand path {0}, no home directory available")]
    HomeDirectoryUnavailable(String),

    /// The local SQLite database could not be opened.
    #[error("Failed to open database {path}: {source}")]
    DatabaseOpen {
        path: String,
        #[source]
        source: sqlx::Error,
    },

    /// Filesystem error during path expansion or setup.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Response could not be encoded.
    #[error("Encode error: {0}")]
    Encode(String),

    /// Statement failed inside the SQL engine.
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Lifecycle method called in the wrong state.
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Shutdown in progress.
    #[error("Shutdown in progress")]
    Shutdown,

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// Create a URL parse error.
    pub fn url_parse(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UrlParse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Configuration,
            Self::UrlParse { .. }
            | Self::MissingScheme { .. }
            | Self::PathIsUrl(_)
            | Self::ConflictingSource { .. }
            | Self::MissingBucket { .. }
            | Self::MissingPath
            | Self::UnknownReplicaType(_)
            | Self::InvalidDuration { .. } => ErrorCategory::ReplicaResolution,
            Self::HomeDirectoryUnavailable(_) | Self::DatabaseOpen { .. } | Self::Io(_) => {
                ErrorCategory::Assembly
            }
            Self::Decode(_) | Self::Encode(_) | Self::Sql(_) => ErrorCategory::Request,
            Self::InvalidState { .. } | Self::Shutdown | Self::Internal(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Check if this error must stop the provider from serving.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Configuration | ErrorCategory::ReplicaResolution | ErrorCategory::Assembly
        )
    }
}

impl From<rmp_serde::decode::Error> for ProviderError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for ProviderError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Self::Encode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_fatal() {
        let err = ProviderError::Config("missing S3URL".to_string());
        assert!(err.is_fatal());
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.to_string().contains("S3URL"));
    }

    #[test]
    fn test_resolution_errors_are_fatal() {
        let errs = [
            ProviderError::PathIsUrl("s3://bucket/db".to_string()),
            ProviderError::ConflictingSource { field: "bucket" },
            ProviderError::MissingBucket { kind: "s3" },
            ProviderError::MissingPath,
            ProviderError::UnknownReplicaType("gcs".to_string()),
            ProviderError::url_parse("", "empty"),
        ];
        for err in errs {
            assert_eq!(err.category(), ErrorCategory::ReplicaResolution, "{err}");
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn test_request_errors_not_fatal() {
        let err = ProviderError::Decode("truncated".to_string());
        assert!(!err.is_fatal());
        assert_eq!(err.category().as_str(), "request");
    }

    #[test]
    fn test_missing_scheme_keeps_partial() {
        let err = ProviderError::MissingScheme {
            url: "bucket/db".to_string(),
            partial: ReplicaUrl {
                scheme: String::new(),
                host: String::new(),
                path: "bucket/db".to_string(),
            },
        };
        assert!(err.to_string().contains("scheme required"));
        if let ProviderError::MissingScheme { partial, .. } = err {
            assert_eq!(partial.path, "bucket/db");
        }
    }

    #[test]
    fn test_conflicting_source_formatting() {
        let err = ProviderError::ConflictingSource { field: "bucket" };
        assert_eq!(err.to_string(), "Cannot specify url & bucket for replica");
    }

    #[test]
    fn test_invalid_state_formatting() {
        let err = ProviderError::InvalidState {
            expected: "Created".to_string(),
            actual: "Serving".to_string(),
        };
        assert!(err.to_string().contains("Created"));
        assert!(err.to_string().contains("Serving"));
        assert_eq!(err.category(), ErrorCategory::Internal);
        assert!(!err.is_fatal());
    }
}
