// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Object-store host decoding.
//!
//! Object-store providers encode the bucket and region into the hostname in
//! different ways. [`HostDescriptor::decode`] recognizes the common forms:
//!
//! ```text
//! my-bucket.localhost:9000              → local MinIO-style, path style
//! my-bucket.s3.us-west-002.backblazeb2.com
//! my-bucket.s3.filebase.com
//! my-bucket.nyc3.digitaloceanspaces.com
//! my-bucket.us-east-1.linodeobjects.com
//! my-bucket.s3.eu-west-1.amazonaws.com  → AWS virtual-hosted style
//! my-bucket                             → AWS bucket shorthand
//! ```
//!
//! Anything else is treated as a custom endpoint addressed path style.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LOCALHOST: Regex = Regex::new(r"^(?:(.+)\.)?localhost$").expect("static regex");
    static ref BACKBLAZE: Regex =
        Regex::new(r"^(?:(.+)\.)?s3\.([^.]+)\.backblazeb2\.com$").expect("static regex");
    static ref FILEBASE: Regex = Regex::new(r"^(?:(.+)\.)?s3\.filebase\.com$").expect("static regex");
    static ref DIGITAL_OCEAN: Regex =
        Regex::new(r"^(?:(.+)\.)?([^.]+)\.digitaloceanspaces\.com$").expect("static regex");
    static ref LINODE: Regex = Regex::new(r"^(?:(.+)\.)?([^.]+)\.linodeobjects\.com$").expect("static regex");
    static ref AWS_VIRTUAL: Regex =
        Regex::new(r"^(.+)\.s3(?:[.-]([^.]+))?\.amazonaws\.com$").expect("static regex");
    static ref AWS_PATH: Regex = Regex::new(r"^s3(?:[.-]([^.]+))?\.amazonaws\.com$").expect("static regex");
    static ref BUCKET_NAME: Regex = Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("static regex");
}

/// Region reported for local endpoints, which ignore it.
const LOCAL_REGION: &str = "us-east-1";

/// Bucket, region and endpoint decoded from an object-store hostname.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostDescriptor {
    pub bucket: String,
    pub region: String,
    /// Empty when the provider default (AWS) applies.
    pub endpoint: String,
    pub force_path_style: bool,
}

impl HostDescriptor {
    /// Decode a hostname (optionally with `:port`).
    ///
    /// Never fails. Unrecognized hosts become a path-style custom endpoint.
    ///
    /// Only recognized providers get an `http://` or `https://` scheme on
    /// their endpoint. An unrecognized host such as `minio:9000` is returned
    /// verbatim, without a scheme, and most S3 clients reject an endpoint in
    /// that form. Set `endpoint` explicitly on the replica to choose one.
    pub fn decode(host: &str) -> Self {
        let (name, port) = split_host_port(host);

        let provider = |bucket: Option<&str>, region: &str, scheme: &str, endpoint: String| Self {
            bucket: bucket.unwrap_or_default().to_string(),
            region: region.to_string(),
            endpoint: with_scheme(scheme, &join_host_port(&endpoint, port)),
            force_path_style: true,
        };

        if let Some(c) = LOCALHOST.captures(name) {
            return provider(c.get(1).map(|m| m.as_str()), LOCAL_REGION, "http", "localhost".to_string());
        }
        if let Some(c) = BACKBLAZE.captures(name) {
            let region = &c[2];
            return provider(
                c.get(1).map(|m| m.as_str()),
                region,
                "https",
                format!("s3.{}.backblazeb2.com", region),
            );
        }
        if let Some(c) = FILEBASE.captures(name) {
            return provider(c.get(1).map(|m| m.as_str()), "", "https", "s3.filebase.com".to_string());
        }
        if let Some(c) = DIGITAL_OCEAN.captures(name) {
            let region = &c[2];
            return provider(
                c.get(1).map(|m| m.as_str()),
                region,
                "https",
                format!("{}.digitaloceanspaces.com", region),
            );
        }
        if let Some(c) = LINODE.captures(name) {
            let region = &c[2];
            return provider(
                c.get(1).map(|m| m.as_str()),
                region,
                "https",
                format!("{}.linodeobjects.com", region),
            );
        }

        // AWS itself: endpoint stays empty so the client uses its default.
        if port.is_none() {
            if let Some(c) = AWS_PATH.captures(name) {
                return Self {
                    bucket: String::new(),
                    region: c.get(1).map(|m| m.as_str()).unwrap_or_default().to_string(),
                    endpoint: String::new(),
                    force_path_style: true,
                };
            }
            if let Some(c) = AWS_VIRTUAL.captures(name) {
                return Self {
                    bucket: c[1].to_string(),
                    region: c.get(2).map(|m| m.as_str()).unwrap_or_default().to_string(),
                    endpoint: String::new(),
                    force_path_style: false,
                };
            }
            if BUCKET_NAME.is_match(name) {
                return Self {
                    bucket: name.to_string(),
                    region: String::new(),
                    endpoint: String::new(),
                    force_path_style: false,
                };
            }
        }

        Self {
            bucket: String::new(),
            region: String::new(),
            endpoint: host.to_string(),
            force_path_style: true,
        }
    }
}

/// Split an optional trailing `:port` (IPv6 literals in brackets are respected).
fn split_host_port(host: &str) -> (&str, Option<&str>) {
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.split_once("]:") {
            Some((name, port)) if is_port(port) => (name, Some(port)),
            _ => (rest.trim_end_matches(']'), None),
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if is_port(port) && !name.contains(':') => (name, Some(port)),
        _ => (host, None),
    }
}

fn is_port(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn join_host_port(host: &str, port: Option<&str>) -> String {
    match port {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn with_scheme(scheme: &str, endpoint: &str) -> String {
    format!("{}://{}", scheme, endpoint)
}
