//! Clone-or-pull a remote repository, then run a script inside it.
//!
//! The crate keeps a strict split between pure logic and side effects:
//!
//! - **[`core`]**: Environment resolution and pipeline stage bookkeeping.
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (child processes, git, the working
//!   directory guard, settings on disk). Process spawning sits behind the
//!   [`io::process::ProcessRunner`] trait so tests can script outcomes.
//!
//! [`pipeline`] sequences both halves and maps the result to an exit code.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
