//! Per-vendor adapters. Each turns a live connection into a
//! [`RawExtraction`](crate::types::RawExtraction) in its own native shape.

pub mod html;
pub mod powerbi;
pub mod tableau;

use std::collections::BTreeMap;

use reqwest::Url;
use serde_json::{json, Value};
use tracing::warn;

use crate::app::ports::{HttpGetResult, OcrPort};
use crate::error::{DashboardError, Result};
use crate::observability::metrics;
use crate::types::OcrResult;

/// Appends query parameters to `url`, keeping any it already has.
pub fn with_query_params(url: &str, params: &[(String, String)]) -> Result<String> {
    let mut parsed =
        Url::parse(url).map_err(|e| DashboardError::Connection(format!("invalid url '{}': {}", url, e)))?;
    if !params.is_empty() {
        let mut pairs = parsed.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    Ok(parsed.to_string())
}

/// Flat text form of a selection, as query strings want it.
pub fn selection_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(selection_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

fn odata_literal(value: &Value) -> String {
    match value {
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", selection_text(other).replace('\'', "''")),
    }
}

/// Power BI URL filter syntax: `Table/Field eq 'value'` clauses joined with
/// `and`. Array selections become `in (...)`.
pub fn powerbi_filter_expression(selections: &BTreeMap<String, Value>) -> Option<String> {
    let clauses: Vec<String> = selections
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(name, value)| match value {
            Value::Array(items) => format!(
                "{} in ({})",
                name,
                items.iter().map(odata_literal).collect::<Vec<_>>().join(", ")
            ),
            other => format!("{} eq {}", name, odata_literal(other)),
        })
        .collect();
    (!clauses.is_empty()).then(|| clauses.join(" and "))
}

/// Maps a non-2xx vendor response to an error. Auth rejections count as
/// connection failures, anything else as an extraction failure.
pub fn ensure_success(response: &HttpGetResult, what: &str) -> Result<()> {
    match response.status {
        s if (200..300).contains(&s) => Ok(()),
        401 | 403 => Err(DashboardError::Connection(format!(
            "{} rejected credentials (HTTP {})",
            what, response.status
        ))),
        s => Err(DashboardError::Extraction(format!("{} returned HTTP {}", what, s))),
    }
}

/// Placeholder component standing in for KPIs that OCR could not read.
pub fn ocr_error_component(message: &str) -> Value {
    json!({
        "type": "unknown",
        "original_type": "error",
        "name": "ocr_error",
        "message": message,
    })
}

/// Runs OCR over the page at `url`. Failures are logged and counted but
/// never abort the extraction.
pub async fn run_ocr(ocr: &dyn OcrPort, url: &str) -> OcrResult {
    let result = ocr.extract_from_url(url).await;
    if !result.is_success() {
        warn!(url, error = ?result.error, "OCR failed, continuing without KPIs");
        metrics::extraction::ocr_failure();
    }
    result
}
