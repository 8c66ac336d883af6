//! Reference material uploads.
//!
//! Turns uploaded bytes into text the prompt compiler can include, enforcing
//! the file type, per-file size and per-tutor count limits.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LimitSettings;
use crate::error::{Error, Result};

/// Extensions whose text is extracted.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];
/// Accepted by the upload form but without a text extractor.
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];
const TEXT_MIME_TYPES: &[&str] = &["text/plain", "text/markdown", "text/x-markdown"];

/// Text extracted from one uploaded file. Read-only once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceMaterial {
    pub filename: String,
    pub extracted_text: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Upload limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_file_size_bytes: u64,
    pub max_files: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 10 * 1024 * 1024,
            max_files: 5,
        }
    }
}

impl From<&LimitSettings> for UploadLimits {
    fn from(limits: &LimitSettings) -> Self {
        Self {
            max_file_size_bytes: limits.max_file_size_bytes(),
            max_files: limits.max_files_per_tutor,
        }
    }
}

impl UploadLimits {
    /// Check that one more file may be attached.
    pub fn check_count(&self, filename: &str, existing: usize) -> Result<()> {
        if existing >= self.max_files {
            return Err(Error::material_rejected(
                filename,
                format!("a tutor can hold at most {} files", self.max_files),
            ));
        }
        Ok(())
    }
}

impl ReferenceMaterial {
    /// Build a material from uploaded bytes and the declared MIME type.
    pub fn from_upload(
        filename: &str,
        bytes: &[u8],
        mime: Option<&str>,
        limits: &UploadLimits,
    ) -> Result<Self> {
        let size_bytes = bytes.len() as u64;
        if size_bytes > limits.max_file_size_bytes {
            return Err(Error::material_rejected(
                filename,
                format!(
                    "{} bytes exceeds the limit of {} bytes",
                    size_bytes, limits.max_file_size_bytes
                ),
            ));
        }

        check_type(filename, mime)?;

        let extracted_text = match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(e) => {
                warn!(
                    filename,
                    valid_up_to = e.valid_up_to(),
                    "Upload is not valid UTF-8, replacing invalid bytes"
                );
                String::from_utf8_lossy(bytes).into_owned()
            }
        };
        let extracted_text = extracted_text.trim_start_matches('\u{feff}').to_string();

        if extracted_text.trim().is_empty() {
            return Err(Error::material_rejected(filename, "file contains no text"));
        }

        debug!(
            filename,
            size_bytes,
            chars = extracted_text.chars().count(),
            "Reference material extracted"
        );

        Ok(Self {
            filename: filename.to_string(),
            extracted_text,
            size_bytes,
            uploaded_at: Utc::now(),
        })
    }

    /// Read a local file as an upload.
    pub fn from_path(path: &Path, limits: &UploadLimits) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let metadata = fs::metadata(path).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        if metadata.len() > limits.max_file_size_bytes {
            return Err(Error::material_rejected(
                filename,
                format!(
                    "{} bytes exceeds the limit of {} bytes",
                    metadata.len(),
                    limits.max_file_size_bytes
                ),
            ));
        }

        let bytes = fs::read(path).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_upload(&filename, &bytes, None, limits)
    }
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn check_type(filename: &str, mime: Option<&str>) -> Result<()> {
    let ext = extension(filename);
    let ext = ext.as_deref();
    let mime = mime.map(|m| m.split(';').next().unwrap_or(m).trim().to_ascii_lowercase());

    let text_ext = ext.is_some_and(|e| TEXT_EXTENSIONS.contains(&e));
    let text_mime = mime
        .as_deref()
        .is_some_and(|m| TEXT_MIME_TYPES.contains(&m));

    if text_ext || text_mime {
        return Ok(());
    }

    if ext.is_some_and(|e| DOCUMENT_EXTENSIONS.contains(&e)) {
        return Err(Error::material_rejected(
            filename,
            "text extraction from PDF and Word documents is not supported; upload a .txt or .md export",
        ));
    }

    Err(Error::material_rejected(
        filename,
        format!(
            "unsupported file type{}; allowed: {}",
            mime.map(|m| format!(" '{}'", m)).unwrap_or_default(),
            TEXT_EXTENSIONS.join(", ")
        ),
    ))
}
