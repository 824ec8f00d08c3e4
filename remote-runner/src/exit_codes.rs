//! Stable exit codes for the `remote-runner` binary.

/// Repository synced and script finished successfully.
pub const OK: i32 = 0;
/// Sync failed, script failed, fallback handler failed, or any unexpected error.
pub const FAILURE: i32 = 1;
