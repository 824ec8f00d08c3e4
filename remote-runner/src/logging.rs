//! Plain-text logging to stdout.
//!
//! Every pipeline message is a `tracing` event. The subscriber prints only the
//! message (plus any structured fields), one line per event, without
//! timestamps, levels, or targets, so the output reads like a build log.

use std::io::IsTerminal;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `info` if unset.
///
/// # Example
/// ```bash
/// RUST_LOG=remote_runner=debug remote-runner
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(std::io::stdout().is_terminal())
                .without_time()
                .with_level(false)
                .with_target(false),
        )
        .init();
}
