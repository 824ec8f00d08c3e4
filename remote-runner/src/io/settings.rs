//! Tool settings, read from an optional `remote-runner.toml`.
//!
//! Settings only choose *how* the pipeline runs (which git, which
//! interpreter, timeouts). The repository and script always come from the
//! environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::io::process::{DEFAULT_DIAGNOSTIC_LIMIT_BYTES, ProcessRequest};

/// Settings file looked up in the current directory when `--config` is not given.
pub const DEFAULT_SETTINGS_FILE: &str = "remote-runner.toml";

/// What to do after the fallback handler ran successfully.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Keep going with whatever configuration is available. Sync and script
    /// usually fail afterwards on the blank values.
    #[default]
    Continue,
    /// Finish successfully right after the handler.
    Stop,
}

/// Runner settings (TOML). Missing fields take their defaults.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerSettings {
    /// Version-control executable used for `clone` and `pull`.
    pub git_program: String,

    /// Program that runs the target script and the fallback handler.
    pub interpreter: String,

    /// Kill any child running longer than this. Unset means wait forever.
    pub command_timeout_secs: Option<u64>,

    /// Bytes of child stderr kept for failure reports.
    pub diagnostic_limit_bytes: usize,

    pub fallback_policy: FallbackPolicy,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            git_program: "git".to_string(),
            interpreter: "python3".to_string(),
            command_timeout_secs: None,
            diagnostic_limit_bytes: DEFAULT_DIAGNOSTIC_LIMIT_BYTES,
            fallback_policy: FallbackPolicy::Continue,
        }
    }
}

impl RunnerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.git_program.trim().is_empty() {
            return Err(anyhow!("git_program must be non-empty"));
        }
        if self.interpreter.trim().is_empty() {
            return Err(anyhow!("interpreter must be non-empty"));
        }
        if self.command_timeout_secs == Some(0) {
            return Err(anyhow!("command_timeout_secs must be > 0 when set"));
        }
        if self.diagnostic_limit_bytes == 0 {
            return Err(anyhow!("diagnostic_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    /// Start a request for `program` in `workdir` with timeout and capture limit applied.
    pub fn request(&self, program: &str, workdir: impl Into<PathBuf>) -> ProcessRequest {
        ProcessRequest::new(program, workdir)
            .timeout(self.command_timeout())
            .diagnostic_limit(self.diagnostic_limit_bytes)
    }
}

/// Command-line values that take precedence over the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub git_program: Option<String>,
    pub interpreter: Option<String>,
    pub command_timeout_secs: Option<u64>,
}

impl SettingsOverrides {
    pub fn apply(&self, mut base: RunnerSettings) -> Result<RunnerSettings> {
        if let Some(git) = &self.git_program {
            base.git_program = git.clone();
        }
        if let Some(interpreter) = &self.interpreter {
            base.interpreter = interpreter.clone();
        }
        if let Some(secs) = self.command_timeout_secs {
            base.command_timeout_secs = Some(secs);
        }
        base.validate()?;
        Ok(base)
    }
}

/// Load settings from a TOML file.
///
/// If the file is missing, returns `RunnerSettings::default()`.
pub fn load_settings(path: &Path) -> Result<RunnerSettings> {
    if !path.exists() {
        let settings = RunnerSettings::default();
        settings.validate()?;
        return Ok(settings);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: RunnerSettings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings.validate()?;
    Ok(settings)
}
