//! Local staging area helpers
//!
//! Downloads are materialized into a staging directory before upload. Names
//! are sanitized and made unique with a numeric suffix. The existence check
//! and the later write are not atomic: two writers racing on the same base
//! name in one directory can pick the same name. Only one downloader is
//! expected to write to a staging directory at a time.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

pub const MAX_FILE_NAME_CHARS: usize = 200;

/// Base name used when sanitizing leaves nothing behind
const FALLBACK_BASE_NAME: &str = "video";

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("path exists and is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to inspect {path}: {source}")]
    Inspect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, StagingError>;

fn is_forbidden(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control()
}

/// Strip characters illegal on common filesystems, turn whitespace runs into
/// a single `_`, squash repeated dots and cap the length at 200 characters.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;

    for c in name.chars().filter(|c| !is_forbidden(*c)) {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;

        if c == '.' && out.ends_with('.') {
            continue;
        }
        out.push(c);
    }

    out.chars().take(MAX_FILE_NAME_CHARS).collect()
}

/// Pick `base.ext`, or `base_1.ext`, `base_2.ext`, ... for the first name not
/// present in `dir`.
pub async fn generate_unique_file_name(dir: &Path, base_name: &str, extension: &str) -> Result<String> {
    let mut sanitized = sanitize_file_name(base_name);
    if sanitized.is_empty() {
        sanitized = FALLBACK_BASE_NAME.to_string();
    }

    let mut file_name = format!("{}.{}", sanitized, extension);
    let mut counter = 1u32;

    while exists(&dir.join(&file_name)).await? {
        file_name = format!("{}_{}.{}", sanitized, counter, extension);
        counter += 1;
    }

    debug!(dir = %dir.display(), file_name = %file_name, "Picked staging file name");
    Ok(file_name)
}

async fn exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|source| StagingError::Inspect {
            path: path.to_path_buf(),
            source,
        })
}

/// Create `path` and its parents unless it is already a directory
pub async fn ensure_dir(path: &Path) -> Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(_) => return Err(StagingError::NotADirectory(path.to_path_buf())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(StagingError::Inspect {
                path: path.to_path_buf(),
                source,
            });
        }
    }

    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| StagingError::CreateDir {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(path = %path.display(), "Created staging directory");
    Ok(())
}

/// Size in bytes, 0 when the file is missing or unreadable
pub async fn file_size(path: &Path) -> u64 {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.len())
        .unwrap_or(0)
}

/// Best-effort removal. Returns whether the file was deleted.
pub async fn delete_file(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Deleted staged file");
            true
        }
        Err(err) => {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %err, "Failed to delete staged file");
            }
            false
        }
    }
}

/// Staged output plus yt-dlp's `.part` sibling, removed on drop unless kept.
///
/// Covers attempts that are cancelled mid-fetch, where no async cleanup runs.
pub struct StagedOutput {
    path: PathBuf,
    keep: bool,
}

impl StagedOutput {
    pub fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file is complete; leave it for the caller
    pub fn keep(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.path)
    }

    fn partial_path(&self) -> PathBuf {
        let mut partial = self.path.as_os_str().to_owned();
        partial.push(".part");
        PathBuf::from(partial)
    }
}

impl Drop for StagedOutput {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        for path in [self.path.clone(), self.partial_path()] {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Discarded partial download"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Failed to discard partial download")
                }
            }
        }
    }
}
