//! Locating and reading the catalog file at startup.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Checked in order when no explicit path is configured.
pub const CANDIDATE_PATHS: [&str; 4] = [
    "app/data/shl_catalogue.json",
    "data/shl_catalogue.json",
    "shl_catalogue.json",
    "app/data/catalog.json",
];

#[derive(Debug, Error)]
pub enum CatalogSourceError {
    #[error("failed to read catalog file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("catalog file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Returns the explicit path when given (even if missing, so the caller can
/// report it), otherwise the first existing candidate under `base`.
pub fn resolve_catalog_path(explicit: Option<&Path>, base: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    CANDIDATE_PATHS.iter().map(|rel| base.join(rel)).find(|path| {
        let exists = path.is_file();
        debug!(path = %path.display(), exists, "catalog candidate");
        exists
    })
}

pub fn load_catalog(path: &Path) -> Result<Value, CatalogSourceError> {
    let contents = std::fs::read(path).map_err(|source| CatalogSourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&contents).map_err(|source| CatalogSourceError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
