//! I/O helpers for the pipeline stages.

pub mod env;
pub mod fallback;
pub mod git;
pub mod process;
pub mod script;
pub mod settings;
pub mod workdir;
