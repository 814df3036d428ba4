use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_DIR: &str = "logs";

/// Initializes the logging system with both console and file output.
///
/// Console output goes to stderr so snapshots printed on stdout stay
/// machine-readable.
pub fn init_logging() {
    let _ = fs::create_dir_all(LOG_DIR);

    // Daily-rotated JSON file log
    let file_appender = tracing_appender::rolling::daily(LOG_DIR, "dashboard.log");
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    let console_layer = fmt::layer().with_writer(std::io::stderr);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dashboard_unifier=info"));

    // A second call (e.g. from tests) leaves the first subscriber in place.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    // Keep the guard alive so buffered lines are flushed on exit
    std::mem::forget(_guard);
}
