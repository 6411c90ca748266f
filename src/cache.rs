//! Ingestion cache file.
//!
//! The cache is a versioned JSON document of tagged records:
//!
//! ```json
//! { "format_version": 1, "created_at": "...", "records": [ { "kind": "chunk", ... } ] }
//! ```
//!
//! A reader refuses any other `format_version`, so a cache written by an
//! incompatible build is never half-decoded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::Chunk;

pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache file not found at {0}")]
    NotFound(PathBuf),
    #[error("Error reading cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Error reading cache file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Cache file {path} has format version {found}, expected {expected}")]
    Version {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    format_version: u32,
    created_at: DateTime<Utc>,
    records: Vec<CacheRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum CacheRecord {
    Chunk(Chunk),
}

/// Read all chunk records from the cache at `path`.
pub fn read_cache(path: &Path) -> Result<Vec<Chunk>, CacheError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CacheError::NotFound(path.to_path_buf())
        } else {
            CacheError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let file: CacheFile = serde_json::from_str(&raw).map_err(|e| CacheError::Malformed {
        path: path.to_path_buf(),
        source: e,
    })?;

    if file.format_version != CACHE_FORMAT_VERSION {
        return Err(CacheError::Version {
            path: path.to_path_buf(),
            found: file.format_version,
            expected: CACHE_FORMAT_VERSION,
        });
    }

    Ok(file
        .records
        .into_iter()
        .map(|r| match r {
            CacheRecord::Chunk(c) => c,
        })
        .collect())
}

/// Write `chunks` to the cache at `path`, creating parent directories.
///
/// The file is written to a sibling temp file and renamed into place.
pub fn write_cache(path: &Path, chunks: &[Chunk]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = CacheFile {
        format_version: CACHE_FORMAT_VERSION,
        created_at: Utc::now(),
        records: chunks.iter().cloned().map(CacheRecord::Chunk).collect(),
    };

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec(&file)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
