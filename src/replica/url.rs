// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replica URL parsing.
//!
//! Splits a replica URL into `(scheme, host, path)`:
//!
//! ```text
//! s3://my-bucket.localhost:9000/backups/app.db
//! └┬┘  └──────────┬──────────┘ └──────┬──────┘
//! scheme         host           path (no leading '/')
//!
//! file:///var/lib/app/replica
//! └┬─┘    └────────┬────────┘
//! scheme   path (cleaned, host always empty)
//! ```
//!
//! Paths are cleaned lexically: repeated separators collapse, `.` segments
//! drop out and `..` consumes the previous segment.

use crate::error::{ProviderError, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref URL_PREFIX: Regex = Regex::new(r"^\w+://").expect("static regex");
}

/// Returns true if `s` starts with `<word>://`.
///
/// Used to reject URLs placed in fields reserved for filesystem paths.
pub fn looks_like_url(s: &str) -> bool {
    URL_PREFIX.is_match(s)
}

/// A parsed replica URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicaUrl {
    /// Lower-cased scheme, empty when the input had no `://`.
    pub scheme: String,
    /// Authority without userinfo. Always empty for `file`.
    pub host: String,
    /// Cleaned path. No leading separator unless the scheme is `file`.
    pub path: String,
}

impl ReplicaUrl {
    /// Parse a replica URL.
    ///
    /// A missing scheme is reported as [`ProviderError::MissingScheme`], which
    /// still carries the host and path recovered from the input.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(ProviderError::url_parse(raw, "empty URL"));
        }
        if raw.chars().any(|c| c.is_control()) {
            return Err(ProviderError::url_parse(raw, "invalid control character in URL"));
        }

        let Some((scheme, rest)) = raw.split_once("://") else {
            let partial = parse_schemeless(raw)?;
            return Err(ProviderError::MissingScheme {
                url: raw.to_string(),
                partial,
            });
        };

        validate_scheme(raw, scheme)?;
        let scheme = scheme.to_ascii_lowercase();
        let rest = strip_query(rest);

        if scheme == "file" {
            return Ok(Self {
                scheme,
                host: String::new(),
                path: clean_path(rest),
            });
        }

        let (authority, path) = split_authority(rest);
        let host = parse_host(raw, authority)?;
        let path = if path.is_empty() {
            String::new()
        } else {
            clean_path(path).trim_start_matches('/').to_string()
        };

        Ok(Self { scheme, host, path })
    }

    /// Check if the URL names the local filesystem.
    pub fn is_file(&self) -> bool {
        self.scheme == "file"
    }
}

fn validate_scheme(raw: &str, scheme: &str) -> Result<()> {
    let mut chars = scheme.chars();
    match chars.next() {
        None => return Err(ProviderError::url_parse(raw, "missing protocol scheme")),
        Some(c) if !c.is_ascii_alphabetic() => {
            return Err(ProviderError::url_parse(raw, "scheme must start with a letter"));
        }
        Some(_) => {}
    }
    if chars.any(|c| !(c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))) {
        return Err(ProviderError::url_parse(raw, "invalid character in scheme"));
    }
    Ok(())
}

/// Best-effort parse of a URL without a scheme.
fn parse_schemeless(raw: &str) -> Result<ReplicaUrl> {
    let rest = strip_query(raw);
    let (host, path) = match rest.strip_prefix("//") {
        Some(after) => {
            let (authority, path) = split_authority(after);
            (parse_host(raw, authority)?, path.to_string())
        }
        None => (String::new(), rest.to_string()),
    };
    Ok(ReplicaUrl {
        scheme: String::new(),
        host,
        path,
    })
}

fn strip_query(s: &str) -> &str {
    match s.find(['?', '#']) {
        Some(idx) => &s[..idx],
        None => s,
    }
}

/// Split `host/path` at the first `/`, keeping the `/` on the path.
fn split_authority(s: &str) -> (&str, &str) {
    match s.find('/') {
        Some(idx) => (&s[..idx], &s[idx..]),
        None => (s, ""),
    }
}

fn parse_host(raw: &str, authority: &str) -> Result<String> {
    let host = match authority.rfind('@') {
        Some(idx) => &authority[idx + 1..],
        None => authority,
    };
    if host.contains(char::is_whitespace) {
        return Err(ProviderError::url_parse(raw, "invalid character in host"));
    }
    Ok(host.to_string())
}

/// Lexically clean a slash-separated path.
///
/// Returns `"."` for an empty relative result and `"/"` for an empty rooted one.
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                // `..` at the root stays at the root
                _ if rooted => {}
                _ => parts.push(".."),
            },
            s => parts.push(s),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
