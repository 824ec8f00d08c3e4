//! Fallback stage: run the built-in template handler when configuration is incomplete.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, instrument};

use crate::io::process::{ProcessOutcome, ProcessRunner, run_checked};
use crate::io::settings::RunnerSettings;

/// Handler run when required variables are missing. Not configurable.
pub const FALLBACK_HANDLER: &str = "/src/handler.py";

pub struct FallbackHandler<'a, R: ProcessRunner + ?Sized> {
    runner: &'a R,
    settings: &'a RunnerSettings,
    handler: PathBuf,
    base: PathBuf,
}

impl<'a, R: ProcessRunner + ?Sized> FallbackHandler<'a, R> {
    pub fn new(
        runner: &'a R,
        settings: &'a RunnerSettings,
        handler: impl Into<PathBuf>,
        base: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            settings,
            handler: handler.into(),
            base: base.into(),
        }
    }

    /// Run the handler with no arguments. A non-zero exit is an error.
    #[instrument(level = "debug", skip_all, fields(handler = %self.handler.display()))]
    pub fn run(&self) -> Result<ProcessOutcome> {
        info!("Fallback to template handler!");
        let request = self
            .settings
            .request(&self.settings.interpreter, &self.base)
            .arg(&self.handler);
        let outcome = run_checked(self.runner, &request)?;
        info!(
            "Fallback handler `{}` finished with exit status {}",
            request.command_line(),
            outcome.code.unwrap_or_default()
        );
        Ok(outcome)
    }
}
