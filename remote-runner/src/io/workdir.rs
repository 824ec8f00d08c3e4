//! Scoped ownership of the process working directory.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, error};

/// Restores the working directory captured at construction when dropped.
///
/// Restoration happens on every exit path, including early `?` returns and
/// unwinding panics.
#[derive(Debug)]
#[must_use = "the directory is restored when the guard is dropped"]
pub struct CwdGuard {
    original: PathBuf,
}

impl CwdGuard {
    /// Remember the current directory without changing it.
    pub fn capture() -> Result<Self> {
        let original = env::current_dir().context("read current directory")?;
        debug!(dir = %original.display(), "captured working directory");
        Ok(Self { original })
    }

    /// Directory that will be restored on drop.
    pub fn original(&self) -> &Path {
        &self.original
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        match env::set_current_dir(&self.original) {
            Ok(()) => debug!(dir = %self.original.display(), "restored working directory"),
            Err(e) => error!(
                err = %e,
                dir = %self.original.display(),
                "failed to restore working directory"
            ),
        }
    }
}
