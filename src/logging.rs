//! Logging setup for the `warpflow` binary.
//!
//! Output goes to stderr so command output on stdout stays machine-readable.
//! The filter comes from `WARPFLOW_LOG` (EnvFilter directive syntax) and
//! defaults to `info`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV_VAR: &str = "WARPFLOW_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(false);

    // A subscriber may already be installed (tests, embedding callers).
    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(filter)
        .try_init();
}
