// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Remote web server targets.

use crate::error::{Result, VerifyError};
use serde::{Deserialize, Serialize};

/// A server base URL, normalized to carry no trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ServerTarget {
    base_url: String,
}

impl ServerTarget {
    /// Create a target without validating the URL.
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            base_url: base_url.as_ref().trim().trim_end_matches('/').to_string(),
        }
    }

    /// Create a target, rejecting anything that is not an absolute http(s) URL.
    pub fn parse(base_url: impl AsRef<str>) -> Result<Self> {
        let target = Self::new(base_url);
        let url = reqwest::Url::parse(&target.base_url)
            .map_err(|e| VerifyError::Config(format!("invalid server URL '{}': {}", target.base_url, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(target),
            other => Err(VerifyError::Config(format!(
                "unsupported scheme '{}' in server URL '{}'",
                other, target.base_url
            ))),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Compose `base_url + "/" + relative_path`.
    ///
    /// Each `/`-separated segment is percent-encoded, so names holding `#`,
    /// `?`, `%` or spaces address the file itself. A base URL that does not
    /// parse is joined verbatim.
    pub fn uri_for(&self, relative_path: &str) -> String {
        let segments = relative_path.split('/').filter(|segment| !segment.is_empty());
        let Ok(mut url) = reqwest::Url::parse(&self.base_url) else {
            return format!("{}/{}", self.base_url, relative_path.trim_start_matches('/'));
        };
        match url.path_segments_mut() {
            Ok(mut path) => {
                path.pop_if_empty().extend(segments);
            }
            Err(()) => return format!("{}/{}", self.base_url, relative_path.trim_start_matches('/')),
        }
        url.into()
    }
}

impl std::fmt::Display for ServerTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base_url)
    }
}

impl From<String> for ServerTarget {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for ServerTarget {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<ServerTarget> for String {
    fn from(value: ServerTarget) -> Self {
        value.base_url
    }
}
