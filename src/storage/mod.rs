//! JSON-file persistence for user presets and saved tutors.

pub mod presets;
pub mod tutors;

pub use presets::{
    PresetExport, PresetStore, PresetSummary, StoredPreset, Suggestion, EXPORT_VERSION,
    MAX_SUGGESTIONS,
};
pub use tutors::{TutorRecord, TutorStore};

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Read a JSON document, or `T::default()` when the file does not exist yet.
pub(crate) fn read_json<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        debug!(path = %path.display(), "Store file missing, starting empty");
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| Error::IoRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }

    serde_json::from_str(&content).map_err(|e| Error::StorageCorrupted {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Write a JSON document through a temporary file and rename.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }

    let content = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content).map_err(|e| Error::IoWrite {
        path: tmp.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp, path).map_err(|e| Error::IoWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    debug!(path = %path.display(), "Store file written");
    Ok(())
}
