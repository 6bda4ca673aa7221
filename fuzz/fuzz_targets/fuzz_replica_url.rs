//! Fuzz target for replica URL parsing.
//!
//! Parsing must never panic. Successful parses must have a lower-cased
//! scheme, and file URLs never carry a host.

#![no_main]

use libfuzzer_sys::fuzz_target;
use replica_provider::ReplicaUrl;

fuzz_target!(|raw: &str| {
    if let Ok(url) = ReplicaUrl::parse(raw) {
        assert_eq!(url.scheme, url.scheme.to_ascii_lowercase());
        if url.is_file() {
            assert!(url.host.is_empty());
        } else {
            assert!(!url.path.starts_with('/'));
        }
    }
});
