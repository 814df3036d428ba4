//! Metrics for extraction, cleaning and interaction.
//!
//! Recording functions are plain `metrics` macros; they are no-ops until
//! `init()` installs the Prometheus recorder.

use std::fmt;
use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Extraction
    ExtractionsSuccess,
    ExtractionsFailed,
    ExtractionDuration,
    ComponentsUnified,

    // Cleaning
    CleanRowsDropped,
    CleanCellsFilled,
    CleanTablesProcessed,

    // Interaction
    Interactions,
    InteractionsRejected,

    // OCR
    OcrFailures,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ExtractionsSuccess => "dashboard_extractions_success_total",
            MetricName::ExtractionsFailed => "dashboard_extractions_failed_total",
            MetricName::ExtractionDuration => "dashboard_extraction_duration_seconds",
            MetricName::ComponentsUnified => "dashboard_components_unified_total",
            MetricName::CleanRowsDropped => "dashboard_clean_rows_dropped_total",
            MetricName::CleanCellsFilled => "dashboard_clean_cells_filled_total",
            MetricName::CleanTablesProcessed => "dashboard_clean_tables_processed_total",
            MetricName::Interactions => "dashboard_interactions_total",
            MetricName::InteractionsRejected => "dashboard_interactions_rejected_total",
            MetricName::OcrFailures => "dashboard_ocr_failures_total",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            ExtractionsSuccess,
            ExtractionsFailed,
            ExtractionDuration,
            ComponentsUnified,
            CleanRowsDropped,
            CleanCellsFilled,
            CleanTablesProcessed,
            Interactions,
            InteractionsRejected,
            OcrFailures,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it twice is an error from the
/// exporter and is reported as such.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Prometheus text exposition of everything recorded so far.
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

// ============================================================================
// Extraction Metrics
// ============================================================================

pub mod extraction {
    use super::MetricName;

    pub fn success(source: &'static str) {
        ::metrics::counter!(MetricName::ExtractionsSuccess.as_str(), "source" => source).increment(1);
    }

    pub fn failed(source: &'static str, kind: &'static str) {
        ::metrics::counter!(
            MetricName::ExtractionsFailed.as_str(),
            "source" => source,
            "error" => kind
        )
        .increment(1);
    }

    pub fn duration(source: &'static str, secs: f64) {
        ::metrics::histogram!(MetricName::ExtractionDuration.as_str(), "source" => source).record(secs);
    }

    pub fn components_unified(count: usize) {
        ::metrics::counter!(MetricName::ComponentsUnified.as_str()).increment(count as u64);
    }

    pub fn ocr_failure() {
        ::metrics::counter!(MetricName::OcrFailures.as_str()).increment(1);
    }
}

// ============================================================================
// Cleaning Metrics
// ============================================================================

pub mod cleaning {
    use super::MetricName;

    pub fn table_processed() {
        ::metrics::counter!(MetricName::CleanTablesProcessed.as_str()).increment(1);
    }

    pub fn rows_dropped(count: usize) {
        if count > 0 {
            ::metrics::counter!(MetricName::CleanRowsDropped.as_str()).increment(count as u64);
        }
    }

    pub fn cells_filled(count: usize) {
        if count > 0 {
            ::metrics::counter!(MetricName::CleanCellsFilled.as_str()).increment(count as u64);
        }
    }
}

// ============================================================================
// Interaction Metrics
// ============================================================================

pub mod interaction {
    use super::MetricName;

    pub fn applied(action: &'static str) {
        ::metrics::counter!(MetricName::Interactions.as_str(), "action" => action).increment(1);
    }

    pub fn rejected(action: &'static str, kind: &'static str) {
        ::metrics::counter!(
            MetricName::InteractionsRejected.as_str(),
            "action" => action,
            "error" => kind
        )
        .increment(1);
    }
}
