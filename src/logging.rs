use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Filter used when `RUST_LOG` is not set: `level` for this crate, `warn`
/// for dependencies. Unknown levels fall back to `info`.
pub fn default_directives(level: &str) -> String {
    let level = level.trim().to_lowercase();
    let level = if LEVELS.contains(&level.as_str()) { level.as_str() } else { "info" };
    format!("warn,drive_organizer={}", level)
}

/// Install the global subscriber. Logs go to stderr so they do not mix
/// with the interactive prompt on stdout.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .try_init();

    if installed.is_ok() {
        tracing::debug!(level, "Logging initialized");
    }
}
