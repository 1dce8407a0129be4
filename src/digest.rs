// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Content digests and ETag normalization.
//!
//! Digests are rendered as lowercase hex so they can be compared directly
//! against ETag values published by servers that expose a content hash.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Digest algorithm used for the ETag and content-hash tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    #[serde(alias = "SHA256", alias = "sha-256", alias = "SHA-256")]
    Sha256,
    #[serde(alias = "SHA384", alias = "sha-384", alias = "SHA-384")]
    Sha384,
    #[serde(alias = "SHA512", alias = "sha-512", alias = "SHA-512")]
    Sha512,
}

impl DigestAlgorithm {
    /// Hex digest of an in-memory buffer.
    pub fn digest_bytes(&self, data: &[u8]) -> String {
        match self {
            Self::Sha256 => hex::encode(Sha256::digest(data)),
            Self::Sha384 => hex::encode(Sha384::digest(data)),
            Self::Sha512 => hex::encode(Sha512::digest(data)),
        }
    }

    /// Hex digest of a file, read in a streaming fashion on the blocking pool.
    pub async fn digest_file(&self, path: &Path) -> std::io::Result<String> {
        let algorithm = *self;
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(&path)?;
            match algorithm {
                Self::Sha256 => hash_reader::<Sha256>(file),
                Self::Sha384 => hash_reader::<Sha384>(file),
                Self::Sha512 => hash_reader::<Sha512>(file),
            }
        })
        .await
        .map_err(std::io::Error::other)?
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sha256 => write!(f, "SHA-256"),
            Self::Sha384 => write!(f, "SHA-384"),
            Self::Sha512 => write!(f, "SHA-512"),
        }
    }
}

impl std::str::FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(format!("unknown digest algorithm '{}'", s)),
        }
    }
}

fn hash_reader<D: Digest>(mut reader: impl Read) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Strip surrounding whitespace, a leading weak-validator marker (`W/`) and
/// surrounding quotes from an ETag header value.
pub fn normalize_etag(raw: &str) -> &str {
    let value = raw.trim();
    let value = value
        .strip_prefix("W/")
        .or_else(|| value.strip_prefix("w/"))
        .unwrap_or(value);
    value.trim_matches('"')
}

/// Compare an ETag header value against a hex digest.
pub fn etag_matches(raw_etag: &str, digest_hex: &str) -> bool {
    let etag = normalize_etag(raw_etag);
    !etag.is_empty() && etag.eq_ignore_ascii_case(digest_hex)
}
