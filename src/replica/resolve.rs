// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replica config resolution.
//!
//! Merges the explicit fields of a [`ReplicaConfigInput`] with whatever its
//! `url` encodes. The rules:
//!
//! - `path` is reserved for filesystem paths and may not hold a URL.
//! - `url` and an explicit `bucket` (or `path`) may not both be set: exactly
//!   one source owns each of those fields.
//! - `region` and `endpoint` are filled from the URL only when left empty.
//! - `force_path_style` is true when an endpoint is set explicitly. An explicit
//!   `force_path_style` always wins; otherwise the URL's host may also turn it on.
//! - The kind comes from the URL scheme, then `type`, then defaults to `file`.
//! - Object-store replicas need a bucket, file replicas need a path.

use super::host::HostDescriptor;
use super::url::{looks_like_url, ReplicaUrl};
use super::{Credentials, ReplicaConfig, ReplicaIntervals, ReplicaKind};
use crate::config::{parse_optional_duration, ReplicaConfigInput};
use crate::error::{ProviderError, Result};

/// Resolve one replica input into a client-ready config.
///
/// `global` supplies credentials for replicas that set none of their own.
pub fn resolve(input: &ReplicaConfigInput, global: &Credentials) -> Result<ReplicaConfig> {
    if looks_like_url(&input.path) {
        return Err(ProviderError::PathIsUrl(input.path.clone()));
    }

    let url = if input.url.is_empty() {
        None
    } else {
        if !input.bucket.is_empty() {
            return Err(ProviderError::ConflictingSource { field: "bucket" });
        }
        if !input.path.is_empty() {
            return Err(ProviderError::ConflictingSource { field: "path" });
        }
        Some(ReplicaUrl::parse(&input.url)?)
    };

    let kind = match &url {
        Some(url) => ReplicaKind::from_type(&url.scheme)?,
        None if !input.replica_type.is_empty() => ReplicaKind::from_type(&input.replica_type)?,
        None => ReplicaKind::File,
    };

    let mut path = input.path.clone();
    let mut bucket = input.bucket.clone();
    let mut region = input.region.clone();
    let mut endpoint = input.endpoint.clone();

    // Endpoints are only set for non-AWS services, which all need path style.
    let mut force_path_style = !endpoint.is_empty();

    if let Some(url) = &url {
        if path.is_empty() {
            path = url.path.clone();
        }

        if kind.is_remote() {
            let host = HostDescriptor::decode(&url.host);
            if bucket.is_empty() {
                bucket = host.bucket;
            }
            if region.is_empty() {
                region = host.region;
            }
            if endpoint.is_empty() {
                endpoint = host.endpoint;
            }
            force_path_style = force_path_style || host.force_path_style;
        }
    }

    if let Some(explicit) = input.force_path_style {
        force_path_style = explicit;
    }

    match kind {
        ReplicaKind::ObjectStore if bucket.is_empty() => {
            return Err(ProviderError::MissingBucket {
                kind: kind.as_str(),
            });
        }
        ReplicaKind::File if path.is_empty() => return Err(ProviderError::MissingPath),
        _ => {}
    }

    let credentials = Credentials {
        access_key_id: first_non_empty(&input.access_key_id, &global.access_key_id),
        secret_access_key: first_non_empty(&input.secret_access_key, &global.secret_access_key),
    };

    Ok(ReplicaConfig {
        kind,
        name: input.name.clone(),
        path,
        bucket,
        region,
        endpoint,
        force_path_style,
        credentials,
        skip_tls_verify: input.skip_verify,
        intervals: parse_intervals(input)?,
    })
}

fn parse_intervals(input: &ReplicaConfigInput) -> Result<ReplicaIntervals> {
    Ok(ReplicaIntervals {
        retention: parse_optional_duration("retention", input.retention.as_deref())?,
        retention_check: parse_optional_duration(
            "retention_check_interval",
            input.retention_check_interval.as_deref(),
        )?,
        sync: parse_optional_duration("sync_interval", input.sync_interval.as_deref())?,
        snapshot: parse_optional_duration("snapshot_interval", input.snapshot_interval.as_deref())?,
        validation: parse_optional_duration(
            "validation_interval",
            input.validation_interval.as_deref(),
        )?,
    })
}

fn first_non_empty(preferred: &str, fallback: &str) -> String {
    if preferred.is_empty() {
        fallback.to_string()
    } else {
        preferred.to_string()
    }
}
