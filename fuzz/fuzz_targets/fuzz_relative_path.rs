//! Fuzz target for remote path derivation.
//!
//! Stripping the watched root from arbitrary paths must never panic and
//! must never produce a backslash.

#![no_main]

use libfuzzer_sys::fuzz_target;
use replication_verifier::event::{ChangeEvent, ChangeKind};
use std::path::Path;

fuzz_target!(|data: (&str, &str, &str)| {
    let (root, path, name) = data;

    let event = ChangeEvent::new(path, name, ChangeKind::Changed);
    let relative = event.relative_path(Some(Path::new(root)));
    assert!(!relative.contains('\\'));

    let renamed = ChangeEvent::renamed(path, name, name);
    let _ = renamed.previous_relative_path(Some(Path::new(root)));

    let moved = ChangeEvent::renamed_paths(name, path);
    if let Some(previous) = moved.previous_relative_path(Some(Path::new(root))) {
        assert!(!previous.contains('\\'));
    }
});
