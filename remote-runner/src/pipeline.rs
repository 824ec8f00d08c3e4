//! Orchestration: resolve → (fallback) → sync → script, mapped to an exit code.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, error, info, instrument, warn};

use crate::core::remote::Resolution;
use crate::core::stage::Stage;
use crate::io::fallback::{FALLBACK_HANDLER, FallbackHandler};
use crate::io::git::{Git, SyncAction};
use crate::io::process::{CommandFailed, ProcessRunner};
use crate::io::script::ScriptRunner;
use crate::io::settings::{FallbackPolicy, RunnerSettings};
use crate::io::workdir::CwdGuard;

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Terminal stage: `Done` or `Error`.
    pub stage: Stage,
    /// Stage that was current when the run failed.
    pub failed_at: Option<Stage>,
    /// Whether the fallback handler was invoked.
    pub fallback_ran: bool,
    /// What the sync stage did, if it completed.
    pub sync: Option<SyncAction>,
    pub exit_code: i32,
}

impl PipelineReport {
    fn started() -> Self {
        Self {
            stage: Stage::Start,
            failed_at: None,
            fallback_ran: false,
            sync: None,
            exit_code: Stage::Start.exit_code(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.stage == Stage::Done
    }
}

/// Sequences the pipeline stages over a single [`ProcessRunner`].
pub struct Pipeline<'a, R: ProcessRunner + ?Sized> {
    runner: &'a R,
    settings: &'a RunnerSettings,
    fallback_handler: PathBuf,
    base_dir: Option<PathBuf>,
}

impl<'a, R: ProcessRunner + ?Sized> Pipeline<'a, R> {
    pub fn new(runner: &'a R, settings: &'a RunnerSettings) -> Self {
        Self {
            runner,
            settings,
            fallback_handler: PathBuf::from(FALLBACK_HANDLER),
            base_dir: None,
        }
    }

    /// Replace the built-in fallback handler path.
    pub fn with_fallback_handler(mut self, handler: impl Into<PathBuf>) -> Self {
        self.fallback_handler = handler.into();
        self
    }

    /// Resolve the clone and script paths against `dir` instead of the
    /// current directory.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Run every stage and report where the run ended.
    ///
    /// Never panics on stage failures; every error is logged and turned into
    /// `Stage::Error` with exit code 1. The working directory at return equals
    /// the working directory at entry.
    pub fn run(&self, resolution: Resolution) -> PipelineReport {
        let mut report = PipelineReport::started();

        if let Err(err) = self.drive(resolution, &mut report) {
            report.failed_at = Some(report.stage);
            report.stage = report.stage.fail();
            log_failure(&err);
        }

        report.exit_code = report.stage.exit_code();
        debug!(stage = %report.stage, exit_code = report.exit_code, "pipeline finished");
        report
    }

    #[instrument(level = "debug", skip_all)]
    fn drive(&self, resolution: Resolution, report: &mut PipelineReport) -> Result<()> {
        let cwd = CwdGuard::capture()?;
        let base = match &self.base_dir {
            Some(dir) => dir.clone(),
            None => cwd.original().to_path_buf(),
        };

        if !resolution.is_complete() {
            error!("Error: Missing required environment variables");
            warn!("Configuration {resolution}");
            report.fallback_ran = true;
            FallbackHandler::new(
                self.runner,
                self.settings,
                &self.fallback_handler,
                &base,
            )
            .run()?;

            // Continue is the documented default: sync and script still run on
            // whatever values are present.
            if self.settings.fallback_policy == FallbackPolicy::Stop {
                info!("Stopping after fallback handler");
                report.stage = Stage::Done;
                return Ok(());
            }
        }
        report.stage = report.stage.advance();

        let cfg = resolution.into_config();
        let action =
            Git::new(self.runner, self.settings, &base).sync(&cfg.repo_url, &cfg.repo_name)?;
        report.sync = Some(action);
        report.stage = report.stage.advance();

        ScriptRunner::new(self.runner, self.settings, &base).run(
            &cfg.repo_name,
            &cfg.script_dir,
            &cfg.script_name,
        )?;
        report.stage = report.stage.advance();

        report.stage = report.stage.advance();
        Ok(())
    }
}

fn log_failure(err: &anyhow::Error) {
    match err.downcast_ref::<CommandFailed>() {
        Some(failed) => error!("Error executing command: {failed}"),
        None => error!("Unexpected error: {err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;
    use crate::core::remote::{REPO_URL, RemoteConfig};
    use crate::exit_codes;
    use crate::test_support::{ScriptedProcessRunner, ScriptedReply, remote_config, sh_settings};

    fn complete(cfg: RemoteConfig) -> Resolution {
        Resolution::Complete(cfg)
    }

    #[test]
    fn clone_then_script_reaches_done() {
        let runner = ScriptedProcessRunner::default();
        let settings = sh_settings();
        let before = env::current_dir().expect("cwd");

        let report = Pipeline::new(&runner, &settings)
            .run(complete(remote_config("url", "definitely-absent-repo-dir", "run.sh")));

        assert_eq!(report.stage, Stage::Done);
        assert_eq!(report.exit_code, exit_codes::OK);
        assert_eq!(report.sync, Some(SyncAction::Cloned));
        assert!(!report.fallback_ran);
        assert_eq!(
            runner.command_lines(),
            vec![
                "git clone url definitely-absent-repo-dir".to_string(),
                "sh run.sh".to_string()
            ]
        );
        assert_eq!(env::current_dir().expect("cwd"), before);
    }

    #[test]
    fn sync_failure_skips_script() {
        let runner = ScriptedProcessRunner::new(vec![ScriptedReply::exit(128, "fatal")]);
        let settings = sh_settings();

        let report = Pipeline::new(&runner, &settings)
            .run(complete(remote_config("url", "definitely-absent-repo-dir", "run.sh")));

        assert_eq!(report.stage, Stage::Error);
        assert_eq!(report.failed_at, Some(Stage::ConfigChecked));
        assert_eq!(report.exit_code, exit_codes::FAILURE);
        assert_eq!(runner.requests().len(), 1, "script must not run");
    }

    #[test]
    fn script_failure_exits_with_failure() {
        let runner = ScriptedProcessRunner::new(vec![
            ScriptedReply::ok(),
            ScriptedReply::exit(1, "boom"),
        ]);
        let settings = sh_settings();

        let report = Pipeline::new(&runner, &settings)
            .run(complete(remote_config("url", "definitely-absent-repo-dir", "run.sh")));

        assert_eq!(report.stage, Stage::Error);
        assert_eq!(report.failed_at, Some(Stage::Synced));
        assert_eq!(report.exit_code, exit_codes::FAILURE);
    }

    #[test]
    fn spawn_error_is_unexpected_failure() {
        let runner = ScriptedProcessRunner::new(vec![ScriptedReply::SpawnError(
            "git not installed".to_string(),
        )]);
        let settings = sh_settings();

        let report = Pipeline::new(&runner, &settings)
            .run(complete(remote_config("url", "definitely-absent-repo-dir", "run.sh")));

        assert_eq!(report.exit_code, exit_codes::FAILURE);
        assert_eq!(report.sync, None);
    }

    #[test]
    fn incomplete_config_runs_fallback_once_then_continues() {
        let runner = ScriptedProcessRunner::new(vec![
            ScriptedReply::ok(),
            ScriptedReply::exit(128, "fatal: repository '' does not exist"),
        ]);
        let settings = sh_settings();
        let partial = remote_config("", "definitely-absent-repo-dir", "run.sh");

        let report = Pipeline::new(&runner, &settings)
            .with_fallback_handler("/opt/handler.sh")
            .run(Resolution::Incomplete {
                partial,
                missing: vec![REPO_URL],
            });

        assert!(report.fallback_ran);
        assert_eq!(report.exit_code, exit_codes::FAILURE);
        assert_eq!(
            runner.command_lines(),
            vec![
                "sh /opt/handler.sh".to_string(),
                "git clone  definitely-absent-repo-dir".to_string()
            ]
        );
    }

    #[test]
    fn stop_policy_finishes_after_fallback() {
        let runner = ScriptedProcessRunner::default();
        let settings = RunnerSettings {
            fallback_policy: FallbackPolicy::Stop,
            ..sh_settings()
        };

        let report = Pipeline::new(&runner, &settings)
            .with_fallback_handler("/opt/handler.sh")
            .run(Resolution::Incomplete {
                partial: RemoteConfig::default(),
                missing: vec![REPO_URL],
            });

        assert_eq!(report.stage, Stage::Done);
        assert_eq!(report.exit_code, exit_codes::OK);
        assert_eq!(runner.command_lines(), vec!["sh /opt/handler.sh".to_string()]);
    }

    #[test]
    fn failing_fallback_handler_stops_pipeline() {
        let runner = ScriptedProcessRunner::new(vec![ScriptedReply::exit(2, "no such file")]);
        let settings = sh_settings();

        let report = Pipeline::new(&runner, &settings)
            .with_fallback_handler("/opt/handler.sh")
            .run(Resolution::Incomplete {
                partial: RemoteConfig::default(),
                missing: vec![REPO_URL],
            });

        assert_eq!(report.stage, Stage::Error);
        assert_eq!(report.failed_at, Some(Stage::Start));
        assert_eq!(runner.requests().len(), 1);
    }
}
