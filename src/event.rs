// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! File change events delivered by the filesystem watcher.
//!
//! A [`ChangeEvent`] is an immutable value: it is created once by the
//! notification source and consumed once by the scheduler. The remote
//! location of the file is derived from it with [`ChangeEvent::relative_path()`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kind of filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
    Renamed,
}

impl ChangeKind {
    /// Whether the expected terminal state on the servers is absence.
    pub fn expects_absence(&self) -> bool {
        matches!(self, ChangeKind::Deleted)
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Created => write!(f, "Created"),
            ChangeKind::Changed => write!(f, "Changed"),
            ChangeKind::Deleted => write!(f, "Deleted"),
            ChangeKind::Renamed => write!(f, "Renamed"),
        }
    }
}

/// One change notification for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    source_path: PathBuf,
    logical_name: String,
    kind: ChangeKind,
    previous_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_path: Option<PathBuf>,
}

impl ChangeEvent {
    /// Build an event for a created, changed or deleted file.
    ///
    /// Use [`renamed()`](Self::renamed) for renames so the previous name
    /// is always present exactly when the kind is `Renamed`.
    pub fn new(source_path: impl Into<PathBuf>, logical_name: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            source_path: source_path.into(),
            logical_name: logical_name.into(),
            kind,
            previous_name: None,
            previous_path: None,
        }
    }

    /// Build an event from a path alone, using its file name as the logical name.
    pub fn from_path(source_path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        let source_path = source_path.into();
        let logical_name = file_name_of(&source_path);
        Self::new(source_path, logical_name, kind)
    }

    pub fn created(source_path: impl Into<PathBuf>, logical_name: impl Into<String>) -> Self {
        Self::new(source_path, logical_name, ChangeKind::Created)
    }

    pub fn changed(source_path: impl Into<PathBuf>, logical_name: impl Into<String>) -> Self {
        Self::new(source_path, logical_name, ChangeKind::Changed)
    }

    pub fn deleted(source_path: impl Into<PathBuf>, logical_name: impl Into<String>) -> Self {
        Self::new(source_path, logical_name, ChangeKind::Deleted)
    }

    pub fn renamed(
        source_path: impl Into<PathBuf>,
        logical_name: impl Into<String>,
        previous_name: impl Into<String>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            logical_name: logical_name.into(),
            kind: ChangeKind::Renamed,
            previous_name: Some(previous_name.into()),
            previous_path: None,
        }
    }

    /// Build a rename from both full paths, as a watcher reports them.
    ///
    /// The old path is kept, so a move across directories resolves to
    /// where the file really was.
    pub fn renamed_paths(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        let from = from.into();
        let to = to.into();
        Self {
            logical_name: file_name_of(&to),
            source_path: to,
            kind: ChangeKind::Renamed,
            previous_name: Some(file_name_of(&from)),
            previous_path: Some(from),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    /// Previous file name; only set for `Renamed`.
    pub fn previous_name(&self) -> Option<&str> {
        self.previous_name.as_deref()
    }

    /// Full source path before the rename, when the watcher supplied it.
    pub fn previous_path(&self) -> Option<&Path> {
        self.previous_path.as_deref()
    }

    /// Remote path of this file relative to a server base URL.
    ///
    /// With a watched `root`, the root prefix is stripped from the source
    /// path so directory structure is preserved, and `\` separators become
    /// `/`. Without a root, or when the source path is not under it, the
    /// logical name is used.
    pub fn relative_path(&self, root: Option<&Path>) -> String {
        root.and_then(|root| strip_root(&self.source_path, root))
            .unwrap_or_else(|| to_url_path(&self.logical_name))
    }

    /// Remote path the file had before a rename, if this is a rename.
    ///
    /// A known previous path under `root` is used as is. Otherwise a bare
    /// previous name is taken to live in the same directory as the new one.
    pub fn previous_relative_path(&self, root: Option<&Path>) -> Option<String> {
        let previous = self.previous_name.as_deref()?;
        if let (Some(from), Some(root)) = (self.previous_path.as_deref(), root) {
            if let Some(rest) = strip_root(from, root) {
                return Some(rest);
            }
        }
        let current = self.relative_path(root);
        let previous = to_url_path(previous);
        // Watchers sometimes report the previous name with its directory already attached.
        if previous.contains('/') {
            return Some(previous);
        }
        match current.rsplit_once('/') {
            Some((dir, _)) => Some(format!("{}/{}", dir, previous)),
            None => Some(previous),
        }
    }
}

/// File name component of `path` as a string, tolerating `\` separators.
pub(crate) fn file_name_of(path: &Path) -> String {
    let lossy = path.to_string_lossy();
    lossy
        .rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn to_url_path(raw: &str) -> String {
    raw.replace('\\', "/").trim_start_matches('/').to_string()
}

/// Strip `root` from `path`, comparing on `/`-normalized strings so UNC and
/// Windows-style paths behave the same on every platform.
fn strip_root(path: &Path, root: &Path) -> Option<String> {
    if let Ok(rest) = path.strip_prefix(root) {
        let rest = to_url_path(&rest.to_string_lossy());
        if !rest.is_empty() {
            return Some(rest);
        }
    }

    let path = path.to_string_lossy().replace('\\', "/");
    let root = root.to_string_lossy().replace('\\', "/");
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        return None;
    }
    let rest = path.strip_prefix(root)?;
    if !rest.starts_with('/') {
        // "/srv/site2/x" is not under "/srv/site"
        return None;
    }
    let rest = rest.trim_start_matches('/');
    (!rest.is_empty()).then(|| rest.to_string())
}
