//! Resolution of the four required pipeline inputs.

use std::fmt;

pub const REPO_URL: &str = "REPO_URL";
pub const REPO_NAME: &str = "REPO_NAME";
pub const SCRIPT_DIR: &str = "SCRIPT_DIR";
pub const SCRIPT_NAME: &str = "SCRIPT_NAME";

/// Variable names in the order they are checked and reported.
pub const REQUIRED_VARS: [&str; 4] = [REPO_URL, REPO_NAME, SCRIPT_DIR, SCRIPT_NAME];

/// Where to clone from and which script to run once synced.
///
/// Read once at startup, never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Remote location handed to `git clone`.
    pub repo_url: String,
    /// Local directory name of the clone, relative to the base directory.
    pub repo_name: String,
    /// Directory inside the clone that holds the script.
    pub script_dir: String,
    /// Script filename, passed to the interpreter as its only argument.
    pub script_name: String,
}

/// Outcome of reading the required variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// All four values present and non-empty.
    Complete(RemoteConfig),
    /// At least one value missing or empty. Missing values are blank in `partial`.
    Incomplete {
        partial: RemoteConfig,
        missing: Vec<&'static str>,
    },
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        matches!(self, Resolution::Complete(_))
    }

    pub fn into_config(self) -> RemoteConfig {
        match self {
            Resolution::Complete(cfg) => cfg,
            Resolution::Incomplete { partial, .. } => partial,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Complete(_) => write!(f, "complete"),
            Resolution::Incomplete { missing, .. } => {
                write!(f, "missing {}", missing.join(", "))
            }
        }
    }
}

/// Resolve the required variables through `lookup`.
///
/// A variable counts as missing when `lookup` returns `None` or an empty string.
/// Nothing beyond presence is checked: URLs and paths are taken verbatim.
pub fn resolve_with<F>(mut lookup: F) -> Resolution
where
    F: FnMut(&str) -> Option<String>,
{
    let mut missing = Vec::new();
    let mut fetch = |name: &'static str| match lookup(name) {
        Some(value) if !value.is_empty() => value,
        _ => {
            missing.push(name);
            String::new()
        }
    };

    let cfg = RemoteConfig {
        repo_url: fetch(REPO_URL),
        repo_name: fetch(REPO_NAME),
        script_dir: fetch(SCRIPT_DIR),
        script_name: fetch(SCRIPT_NAME),
    };

    if missing.is_empty() {
        Resolution::Complete(cfg)
    } else {
        Resolution::Incomplete {
            partial: cfg,
            missing,
        }
    }
}
