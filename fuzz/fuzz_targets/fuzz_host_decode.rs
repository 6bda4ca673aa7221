//! Fuzz target for object-store host decoding.
//!
//! Decoding is total: any input yields a descriptor without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use replica_provider::HostDescriptor;

fuzz_target!(|host: &str| {
    let decoded = HostDescriptor::decode(host);

    // A custom endpoint is always addressed path style
    if !decoded.endpoint.is_empty() {
        assert!(decoded.force_path_style);
    }
});
