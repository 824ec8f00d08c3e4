//! Clone or update a repository named by the environment, then run a script in it.
//!
//! Reads `REPO_URL`, `REPO_NAME`, `SCRIPT_DIR` and `SCRIPT_NAME`. When any of
//! them is missing the built-in fallback handler runs first.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use remote_runner::exit_codes;
use remote_runner::io::env::resolve_from_env;
use remote_runner::io::process::SystemProcessRunner;
use remote_runner::io::settings::{
    DEFAULT_SETTINGS_FILE, RunnerSettings, SettingsOverrides, load_settings,
};
use remote_runner::logging;
use remote_runner::pipeline::Pipeline;

#[derive(Parser)]
#[command(
    name = "remote-runner",
    version,
    about = "Clone or pull a repository, then run a script inside it"
)]
struct Cli {
    /// Settings file (TOML). Ignored when absent.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,

    /// Version-control executable used for clone and pull.
    #[arg(long, value_name = "PROGRAM")]
    git: Option<String>,

    /// Interpreter for the target script and the fallback handler.
    #[arg(long, value_name = "PROGRAM")]
    interpreter: Option<String>,

    /// Kill any child process running longer than this many seconds.
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            git_program: self.git.clone(),
            interpreter: self.interpreter.clone(),
            command_timeout_secs: self.timeout_secs,
        }
    }
}

fn main() {
    logging::init();
    let cli = Cli::parse();

    let settings = match resolve_settings(&cli) {
        Ok(settings) => settings,
        Err(err) => {
            error!("Unexpected error: {err:#}");
            std::process::exit(exit_codes::FAILURE);
        }
    };

    let report = Pipeline::new(&SystemProcessRunner, &settings).run(resolve_from_env());
    std::process::exit(report.exit_code);
}

fn resolve_settings(cli: &Cli) -> Result<RunnerSettings> {
    let base = load_settings(&cli.config).context("load settings")?;
    cli.overrides().apply(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults() {
        let cli = Cli::parse_from(["remote-runner"]);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_SETTINGS_FILE));
        assert_eq!(cli.overrides(), SettingsOverrides::default());
    }

    #[test]
    fn parse_overrides() {
        let cli = Cli::parse_from([
            "remote-runner",
            "--interpreter",
            "python3.11",
            "--git",
            "/usr/bin/git",
            "--timeout-secs",
            "120",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.interpreter.as_deref(), Some("python3.11"));
        assert_eq!(overrides.git_program.as_deref(), Some("/usr/bin/git"));
        assert_eq!(overrides.command_timeout_secs, Some(120));
    }
}
