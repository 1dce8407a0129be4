// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Filesystem adapter: turns `notify` events into [`ChangeEvent`]s.
//!
//! The engine does not depend on this module; any
//! `mpsc::Receiver<ChangeEvent>` can be attached instead. Coalescing and
//! ordering are whatever the OS backend delivers: duplicates are passed
//! through and each becomes its own batch.
//!
//! ```text
//! notify callback ──► std mpsc ──► bridge (spawn_blocking) ──► classify ──► tokio mpsc
//! ```

use crate::error::Result;
use crate::event::{ChangeEvent, ChangeKind};
use glob::Pattern;
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the classified event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Keeps the OS watcher alive; dropping it stops watching.
pub struct WatcherHandle {
    _watcher: RecommendedWatcher,
    _bridge: JoinHandle<()>,
    root: PathBuf,
}

impl WatcherHandle {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").field("root", &self.root).finish()
    }
}

/// Watch `root` recursively, yielding events whose file name matches `filter`.
///
/// Must be called from within a tokio runtime.
pub fn start_watcher(root: &Path, filter: Pattern) -> Result<(WatcherHandle, mpsc::Receiver<ChangeEvent>)> {
    let (std_tx, std_rx) = std::sync::mpsc::channel::<notify::Result<Event>>();

    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = std_tx.send(res);
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    info!(root = %root.display(), filter = %filter, "Watching source root");

    let bridge = tokio::task::spawn_blocking(move || {
        while let Ok(result) = std_rx.recv() {
            match result {
                Ok(event) => {
                    for change in classify(&event, &filter) {
                        debug!(
                            path = %change.source_path().display(),
                            kind = %change.kind(),
                            "Filesystem change"
                        );
                        if tx.blocking_send(change).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Watcher error"),
            }
        }
        debug!("Watcher bridge stopped");
    });

    Ok((
        WatcherHandle {
            _watcher: watcher,
            _bridge: bridge,
            root: root.to_path_buf(),
        },
        rx,
    ))
}

/// Map one `notify` event onto zero or more change events.
///
/// Directories, access events and metadata-only modifications are
/// dropped, as are files whose name does not match `filter`. Renames keep
/// both full paths so the old remote location can be derived later.
pub fn classify(event: &Event, filter: &Pattern) -> Vec<ChangeEvent> {
    let files = || event.paths.iter().filter(|p| !p.is_dir());

    let changes: Vec<ChangeEvent> = match &event.kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => Vec::new(),
        EventKind::Create(_) => files()
            .map(|p| ChangeEvent::from_path(p, ChangeKind::Created))
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .map(|p| ChangeEvent::from_path(p, ChangeKind::Deleted))
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to, ..] if !to.is_dir() => vec![ChangeEvent::renamed_paths(from, to)],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .map(|p| ChangeEvent::from_path(p, ChangeKind::Deleted))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => files()
            .map(|p| ChangeEvent::from_path(p, ChangeKind::Created))
            .collect(),
        // Backend could not tell which side of the rename this is.
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .filter(|p| !p.is_dir())
            .map(|p| {
                let kind = if p.exists() { ChangeKind::Created } else { ChangeKind::Deleted };
                ChangeEvent::from_path(p, kind)
            })
            .collect(),
        EventKind::Modify(_) => files()
            .map(|p| ChangeEvent::from_path(p, ChangeKind::Changed))
            .collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    };

    changes
        .into_iter()
        .filter(|c| filter.matches(c.logical_name()))
        .collect()
}
