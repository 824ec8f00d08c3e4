//! Git adapter for the sync stage.
//!
//! Clones a repository into a named directory under the base directory, or
//! pulls when that directory already exists. Every git call goes through a
//! [`ProcessRunner`] with its own working directory; the parent process never
//! changes directory.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::io::process::{ProcessRequest, ProcessRunner, run_checked};
use crate::io::settings::RunnerSettings;

/// Which git operation `sync` performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Cloned,
    Updated,
}

/// Wrapper for executing git commands relative to a base directory.
pub struct Git<'a, R: ProcessRunner + ?Sized> {
    runner: &'a R,
    settings: &'a RunnerSettings,
    base: PathBuf,
}

impl<'a, R: ProcessRunner + ?Sized> Git<'a, R> {
    pub fn new(runner: &'a R, settings: &'a RunnerSettings, base: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            settings,
            base: base.into(),
        }
    }

    /// Path of an existing checkout named `local_name`, if there is one.
    ///
    /// An empty name never matches: it would resolve to the base directory itself.
    pub fn existing_checkout(&self, local_name: &str) -> Option<PathBuf> {
        if local_name.is_empty() {
            return None;
        }
        let path = self.base.join(local_name);
        path.is_dir().then_some(path)
    }

    /// Clone `source` into `local_name`, or pull if `local_name` already exists.
    ///
    /// A failing git call aborts the sync. Nothing is retried and a partial
    /// clone is left as git left it.
    #[instrument(level = "debug", skip_all, fields(repo = %local_name))]
    pub fn sync(&self, source: &str, local_name: &str) -> Result<SyncAction> {
        match self.existing_checkout(local_name) {
            Some(checkout) => {
                info!("Updating repository {local_name}");
                self.pull(&checkout)?;
                Ok(SyncAction::Updated)
            }
            None => {
                info!("Cloning repository {local_name}");
                self.clone_into(source, local_name)?;
                Ok(SyncAction::Cloned)
            }
        }
    }

    /// `git clone <source> <dest>`, run from the base directory.
    pub fn clone_into(&self, source: &str, dest: &str) -> Result<()> {
        let request = self.request(&self.base).arg("clone").arg(source).arg(dest);
        debug!(command = %request.command_line(), "cloning");
        run_checked(self.runner, &request)?;
        Ok(())
    }

    /// `git pull`, run inside `checkout` against its configured upstream.
    pub fn pull(&self, checkout: &Path) -> Result<()> {
        let request = self.request(checkout).arg("pull");
        debug!(workdir = %checkout.display(), "pulling");
        run_checked(self.runner, &request)?;
        Ok(())
    }

    fn request(&self, workdir: &Path) -> ProcessRequest {
        self.settings.request(&self.settings.git_program, workdir)
    }
}
