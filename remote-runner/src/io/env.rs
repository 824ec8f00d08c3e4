//! Read the required variables from the process environment.

use std::env;

use crate::core::remote::{Resolution, resolve_with};

/// Resolve `REPO_URL`, `REPO_NAME`, `SCRIPT_DIR` and `SCRIPT_NAME`.
///
/// Values that are not valid Unicode count as missing.
pub fn resolve_from_env() -> Resolution {
    resolve_with(|name| env::var(name).ok())
}
