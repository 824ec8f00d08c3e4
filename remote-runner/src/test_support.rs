//! Test-only helpers: scripted process runners and a local git remote.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};

use crate::core::remote::RemoteConfig;
use crate::io::process::{ProcessOutcome, ProcessRequest, ProcessRunner};
use crate::io::settings::RunnerSettings;

/// Canned reply for one [`ScriptedProcessRunner`] call.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// The child ran and exited with this outcome.
    Exit(ProcessOutcome),
    /// The child could not be spawned.
    SpawnError(String),
}

impl ScriptedReply {
    pub fn ok() -> Self {
        ScriptedReply::Exit(ProcessOutcome::succeeded())
    }

    pub fn exit(code: i32, stderr: &str) -> Self {
        ScriptedReply::Exit(ProcessOutcome::exited(code, stderr))
    }
}

/// Process runner that records requests and replays queued replies.
///
/// Once the queue is empty, every further call succeeds.
#[derive(Debug, Default)]
pub struct ScriptedProcessRunner {
    replies: RefCell<VecDeque<ScriptedReply>>,
    requests: RefCell<Vec<ProcessRequest>>,
}

impl ScriptedProcessRunner {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Every request seen so far, in call order.
    pub fn requests(&self) -> Vec<ProcessRequest> {
        self.requests.borrow().clone()
    }

    /// Command lines of every request seen so far.
    pub fn command_lines(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(ProcessRequest::command_line)
            .collect()
    }
}

impl ProcessRunner for ScriptedProcessRunner {
    fn run(&self, request: &ProcessRequest) -> Result<ProcessOutcome> {
        self.requests.borrow_mut().push(request.clone());
        match self.replies.borrow_mut().pop_front() {
            None => Ok(ProcessOutcome::succeeded()),
            Some(ScriptedReply::Exit(outcome)) => Ok(outcome),
            Some(ScriptedReply::SpawnError(msg)) => Err(anyhow!(msg)),
        }
    }
}

/// Settings that run scripts with `sh`, so fixtures need no Python.
pub fn sh_settings() -> RunnerSettings {
    RunnerSettings {
        interpreter: "sh".to_string(),
        ..RunnerSettings::default()
    }
}

/// Remote config pointing at `url` with the script `scripts/<script_name>`.
pub fn remote_config(url: &str, repo_name: &str, script_name: &str) -> RemoteConfig {
    RemoteConfig {
        repo_url: url.to_string(),
        repo_name: repo_name.to_string(),
        script_dir: "scripts".to_string(),
        script_name: script_name.to_string(),
    }
}

/// A git repository on local disk that can be cloned by path.
pub struct LocalRemote {
    _temp: tempfile::TempDir,
    root: PathBuf,
}

impl LocalRemote {
    /// Create a repository with one commit containing `scripts/<name>` per entry.
    pub fn with_scripts(scripts: &[(&str, &str)]) -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp dir")?;
        let root = temp.path().join("remote");
        fs::create_dir_all(root.join("scripts")).context("create scripts dir")?;

        run_git(&root, &["init"])?;
        run_git(&root, &["config", "user.name", "Remote Runner Tests"])?;
        run_git(
            &root,
            &["config", "user.email", "remote-runner@local.invalid"],
        )?;

        for (name, body) in scripts {
            fs::write(root.join("scripts").join(name), body)
                .with_context(|| format!("write script {name}"))?;
        }
        fs::write(root.join("README.txt"), "fixture\n").context("write readme")?;
        run_git(&root, &["add", "."])?;
        run_git(&root, &["commit", "-m", "chore: seed fixture"])?;

        Ok(Self { _temp: temp, root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Clone location as accepted by `git clone`.
    pub fn url(&self) -> String {
        self.root.display().to_string()
    }

    /// Commit a file at `rel` so a later `git pull` has something to fetch.
    pub fn commit_file(&self, rel: &str, body: &str) -> Result<()> {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
        run_git(&self.root, &["add", "."])?;
        run_git(&self.root, &["commit", "-m", &format!("chore: update {rel}")])?;
        Ok(())
    }
}

fn run_git(root: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .with_context(|| format!("run git {:?}", args))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {:?} failed: {}", args, stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
