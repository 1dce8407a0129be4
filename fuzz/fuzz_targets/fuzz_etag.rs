//! Fuzz target for ETag normalization.
//!
//! `normalize_etag` and `etag_matches` must never panic, and a match
//! must never be reported against an empty digest.

#![no_main]

use libfuzzer_sys::fuzz_target;
use replication_verifier::digest::{etag_matches, normalize_etag};

fuzz_target!(|data: (&str, &str)| {
    let (etag, digest) = data;

    let normalized = normalize_etag(etag);
    assert!(normalized.len() <= etag.len());

    if etag_matches(etag, digest) {
        assert!(!normalized.is_empty());
    }
});
