use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{DrillState, Status};

/// What an adapter hands back before unification.
///
/// Containers are kept as raw JSON because adapters disagree on their shape:
/// the vendor API variant emits objects keyed by name, the HTML variants emit
/// sequences. The unifier normalizes both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawExtraction {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub tables: Value,
    #[serde(default)]
    pub kpis: Value,
    #[serde(default)]
    pub filters: Value,
    #[serde(default)]
    pub slicers: Value,
    #[serde(default)]
    pub visuals: Value,
    #[serde(default)]
    pub layout: Value,
    #[serde(default)]
    pub components: Value,
    #[serde(default)]
    pub html_text: Option<String>,
    #[serde(default)]
    pub drill_state: Option<DrillState>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl RawExtraction {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn failed(error: Value) -> Self {
        Self {
            status: Status::Failed,
            error: Some(error),
            ..Self::default()
        }
    }
}

/// Connection parameters supplied by the caller. Which fields matter depends
/// on the source and auth type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionParams {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub report_id: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub view_id: Option<String>,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
    #[serde(default = "default_use_ocr")]
    pub use_ocr: bool,
}

fn default_use_ocr() -> bool {
    true
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            url: None,
            report_id: None,
            workspace_id: None,
            view_id: None,
            site_id: None,
            server_url: None,
            access_token: None,
            use_ocr: true,
        }
    }
}

impl ConnectionParams {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

/// Result of running OCR over a dashboard image or page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub status: Status,
    #[serde(default)]
    pub numbers: Vec<f64>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl OcrResult {
    pub fn success(text: String, numbers: Vec<f64>) -> Self {
        Self {
            status: Status::Success,
            numbers,
            text,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            numbers: Vec::new(),
            text: String::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}
