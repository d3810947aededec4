//! Scoped file removal used for best-effort cleanup of partial downloads

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Deletes files on behalf of the progress monitor
///
/// Called synchronously from inside a retrieval operation's progress
/// callback, so implementations must not block for long. Callers treat every
/// error as non-fatal.
pub trait FileRemover: Send + Sync {
    /// Delete `path` if it is an existing regular file the remover may touch
    fn remove(&self, path: &Path) -> Result<()>;
}

/// Remover that only deletes regular files inside a set of base directories
///
/// Both the target and the base directories are canonicalized before the
/// containment check, so `..` components and symlinks cannot escape.
#[derive(Debug, Clone)]
pub struct ScopedRemover {
    allowed_base_dirs: Vec<PathBuf>,
}

impl ScopedRemover {
    /// Create a remover restricted to `allowed_base_dirs`
    pub fn new(allowed_base_dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            allowed_base_dirs: allowed_base_dirs.into_iter().collect(),
        }
    }

    /// Allowed base directories as configured
    pub fn allowed_base_dirs(&self) -> &[PathBuf] {
        &self.allowed_base_dirs
    }

    /// Resolve `path` and make sure it lies inside an allowed directory
    pub fn ensure_within_allowed(&self, path: &Path) -> Result<PathBuf> {
        let resolved = path.canonicalize()?;
        // Bases are resolved on every call: they may be created after the remover.
        let allowed = self
            .allowed_base_dirs
            .iter()
            .filter_map(|base| base.canonicalize().ok())
            .any(|base| resolved.starts_with(&base));

        if allowed {
            Ok(resolved)
        } else {
            Err(Error::PathNotAllowed(path.to_path_buf()))
        }
    }
}

impl FileRemover for ScopedRemover {
    fn remove(&self, path: &Path) -> Result<()> {
        if std::fs::symlink_metadata(path).is_err() {
            return Ok(());
        }

        let resolved = self.ensure_within_allowed(path)?;
        if resolved.is_file() {
            std::fs::remove_file(&resolved)?;
            tracing::debug!(path = ?resolved, "removed partial file");
        }
        Ok(())
    }
}
