// Observability: logging and metrics

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{init, render};
