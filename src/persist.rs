//! JSON snapshot persistence
//!
//! A configuration snapshot round-trips to a pretty-printed JSON document,
//! field for field, with the serial-port list order preserved.

use std::fs;
use std::path::Path;

use crate::data::PdsConfig;
use crate::error::{SnapshotError, SnapshotResult};

/// Write a configuration snapshot to `path`.
pub fn save_snapshot(path: &Path, config: &PdsConfig) -> SnapshotResult<()> {
    let document = serde_json::to_string_pretty(config).map_err(|e| SnapshotError::FormatError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    fs::write(path, document).map_err(|error| SnapshotError::FileError {
        path: path.display().to_string(),
        error,
    })
}

/// Load a configuration snapshot from `path`.
pub fn load_snapshot(path: &Path) -> SnapshotResult<PdsConfig> {
    let document = fs::read_to_string(path).map_err(|error| SnapshotError::FileError {
        path: path.display().to_string(),
        error,
    })?;
    serde_json::from_str(&document).map_err(|e| SnapshotError::FormatError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
