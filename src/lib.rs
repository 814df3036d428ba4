pub mod apis;
pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Layered boundaries: ports and use cases, then their adapters
pub mod app;
pub mod infra;

// Domain data shapes shared across layers
pub mod domain;

pub mod observability;
pub mod pipeline;

pub use app::{DashboardExtractor, ExtractionRequest, InteractiveStateMerger};
pub use domain::{AuthType, Component, Source, UnifiedDashboard};
pub use error::{DashboardError, Result};
