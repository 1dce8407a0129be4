//! Fuzz target for Last-Modified parsing.
//!
//! Arbitrary header values must parse or be rejected, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use replication_verifier::checker::{parse_http_date, timestamp_is_current};
use std::time::Duration;

fuzz_target!(|data: (&str, u32)| {
    let (raw, grace_secs) = data;

    if let Some(remote) = parse_http_date(raw) {
        // Should never panic, whatever the grace window
        let _ = timestamp_is_current(remote, remote, Duration::from_secs(grace_secs as u64));
    }
});
