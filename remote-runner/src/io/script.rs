//! Script stage: run `<interpreter> <script_name>` inside the synced clone.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{error, info, instrument};

use crate::io::process::{CommandFailed, ProcessRunner, run_checked};
use crate::io::settings::RunnerSettings;

/// Logged when a failed script left nothing on stderr.
pub const NO_DETAILS: &str = "No additional error details available.";

pub struct ScriptRunner<'a, R: ProcessRunner + ?Sized> {
    runner: &'a R,
    settings: &'a RunnerSettings,
    base: PathBuf,
}

impl<'a, R: ProcessRunner + ?Sized> ScriptRunner<'a, R> {
    pub fn new(runner: &'a R, settings: &'a RunnerSettings, base: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            settings,
            base: base.into(),
        }
    }

    /// Directory the script runs in: `base/repo_name/script_dir`.
    pub fn target_dir(&self, repo_name: &str, script_dir: &str) -> PathBuf {
        self.base.join(repo_name).join(script_dir)
    }

    /// Run `script_name` from `repo_name/script_dir` and wait for it.
    ///
    /// A non-zero exit is logged with the script's stderr and returned as a
    /// [`CommandFailed`] error. Spawn failures (missing directory, missing
    /// interpreter) propagate unlogged for the caller to report.
    #[instrument(level = "debug", skip_all, fields(repo = %repo_name))]
    pub fn run(&self, repo_name: &str, script_dir: &str, script_name: &str) -> Result<()> {
        let dir = self.target_dir(repo_name, script_dir);
        let shown = Path::new(repo_name).join(script_dir).join(script_name);
        info!("Executing script: {}", shown.display());

        let request = self
            .settings
            .request(&self.settings.interpreter, dir)
            .arg(script_name);

        if let Err(err) = run_checked(self.runner, &request) {
            if let Some(failed) = err.downcast_ref::<CommandFailed>() {
                error!("Script Execution Failed:");
                error!("{}", failed.diagnostic.as_deref().unwrap_or(NO_DETAILS));
            }
            return Err(err);
        }
        Ok(())
    }
}
