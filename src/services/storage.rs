//! Shared storage area for uploads and generated documents.
//!
//! The directory is flat and shared by every request: a file's name
//! (`YYYYMMDD_HHMMSS_<sanitized original name>`) is its only identity and its
//! presence on disk is the only record that it exists. Nothing here locks;
//! the cleanup sweeper may remove a file between a caller's check and read.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{FileKind, UploadedFile};

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const FALLBACK_NAME: &str = "upload";
const OUTPUT_ID_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Open the storage area, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        info!(path = %root.display(), "Storage area ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write an upload under a timestamped, sanitized name and return its path.
    pub fn save_file(&self, upload: &UploadedFile) -> AppResult<PathBuf> {
        let name = format!("{}_{}", timestamp(), sanitize_filename(&upload.name));
        let path = self.root.join(&name);

        self.write_atomic(&path, |file| file.write_all(&upload.content))?;

        debug!(
            original_name = %upload.name,
            stored_name = %name,
            size = upload.size,
            "Saved upload"
        );
        Ok(path)
    }

    /// Remove a file; missing files are not an error.
    pub fn delete_file(&self, path: &Path) -> AppResult<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Destination path for a pipeline output. The name must already be a safe plain filename.
    pub fn output_path(&self, output_name: &str) -> AppResult<PathBuf> {
        if output_name.is_empty() || sanitize_filename(output_name) != output_name {
            return Err(AppError::invalid_input(format!(
                "output name '{}' is not a plain filename",
                output_name
            )));
        }
        Ok(self.root.join(output_name))
    }

    /// Re-validate a client-supplied name for download.
    pub fn resolve(&self, requested: &str) -> AppResult<PathBuf> {
        let name = sanitize_filename(requested);
        let path = self.root.join(&name);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(AppError::not_found(name)),
        }
    }

    /// Write through a temporary file in the storage area, then rename into place.
    pub fn write_atomic<F>(&self, path: &Path, write: F) -> AppResult<()>
    where
        F: FnOnce(&mut NamedTempFile) -> io::Result<()>,
    {
        let mut file = NamedTempFile::new_in(&self.root)?;
        write(&mut file)?;
        file.as_file().sync_all()?;
        file.persist(path)?;
        Ok(())
    }
}

/// Whether `filename` carries an extension accepted for `kind`.
pub fn allowed_file(filename: &str, kind: FileKind) -> bool {
    match filename.rsplit_once('.') {
        Some((_, extension)) => kind.allows(extension),
        None => false,
    }
}

/// Output name of the form `{prefix}_{YYYYMMDD_HHMMSS}_{8 hex}.pdf`.
///
/// The random suffix keeps two outputs finished in the same second apart.
pub fn output_name(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}.pdf", prefix, timestamp(), &id[..OUTPUT_ID_LEN])
}

/// Reduce a client filename to a safe single path component.
///
/// Separators and whitespace become `_`, anything outside ASCII
/// alphanumerics and `_.-` is dropped, dot runs collapse, and leading or
/// trailing dots and underscores are trimmed. An empty result becomes
/// `upload`.
pub fn sanitize_filename(filename: &str) -> String {
    let spaced: String = filename
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    let mut sanitized = String::with_capacity(joined.len());
    for c in joined.chars() {
        if !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
            continue;
        }
        if c == '.' && sanitized.ends_with('.') {
            continue;
        }
        sanitized.push(c);
    }

    let trimmed = sanitized.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}
