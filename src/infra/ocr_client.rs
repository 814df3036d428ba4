use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::apis::with_query_params;
use crate::app::ports::{HttpClientPort, OcrPort};
use crate::types::OcrResult;

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-+]?\d[\d,]*\.?\d*").unwrap());

/// Every number in `text`, thousands separators removed.
pub fn extract_numbers(text: &str) -> Vec<f64> {
    NUMBER
        .find_iter(text)
        .filter_map(|m| m.as_str().replace(',', "").parse::<f64>().ok())
        .collect()
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    text: String,
}

/// Client for an OCR service exposing `GET {endpoint}?url=..&lang=..`
/// that answers `{"text": "..."}`.
pub struct HttpOcrClient {
    http: Arc<dyn HttpClientPort>,
    endpoint: String,
    lang: String,
}

impl HttpOcrClient {
    pub fn new(http: Arc<dyn HttpClientPort>, endpoint: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            lang: lang.into(),
        }
    }
}

#[async_trait]
impl OcrPort for HttpOcrClient {
    async fn extract_from_url(&self, url: &str) -> OcrResult {
        let query = [
            ("url".to_string(), url.to_string()),
            ("lang".to_string(), self.lang.clone()),
        ];
        let request_url = match with_query_params(&self.endpoint, &query) {
            Ok(u) => u,
            Err(e) => return OcrResult::failed(e.message()),
        };
        let response = match self.http.get(&request_url, &[]).await {
            Ok(r) => r,
            Err(e) => return OcrResult::failed(e.to_string()),
        };
        if !response.is_success() {
            return OcrResult::failed(format!("OCR service returned HTTP {}", response.status));
        }
        match serde_json::from_slice::<OcrResponse>(&response.bytes) {
            Ok(body) => {
                let numbers = extract_numbers(&body.text);
                debug!(numbers = numbers.len(), "OCR read");
                OcrResult::success(body.text, numbers)
            }
            Err(e) => OcrResult::failed(format!("malformed OCR response: {}", e)),
        }
    }
}

/// Used when no OCR endpoint is configured.
pub struct DisabledOcr;

#[async_trait]
impl OcrPort for DisabledOcr {
    async fn extract_from_url(&self, _url: &str) -> OcrResult {
        OcrResult::failed("OCR is not configured")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::HttpGetResult;
    use crate::error::Result;

    struct CannedHttp {
        status: u16,
        body: &'static str,
    }

    #[async_trait]
    impl HttpClientPort for CannedHttp {
        async fn get(&self, _url: &str, _headers: &[(String, String)]) -> Result<HttpGetResult> {
            Ok(HttpGetResult {
                status: self.status,
                bytes: self.body.as_bytes().to_vec(),
                content_type: "application/json".into(),
            })
        }
    }

    #[test]
    fn test_extract_numbers() {
        assert_eq!(extract_numbers("Revenue 1,200.50 down -3 from +7."), vec![1200.5, -3.0, 7.0]);
        assert!(extract_numbers("no digits").is_empty());
    }

    #[tokio::test]
    async fn test_http_ocr_success() {
        let http = Arc::new(CannedHttp {
            status: 200,
            body: r#"{"text": "Total 42 of 1,000"}"#,
        });
        let client = HttpOcrClient::new(http, "http://localhost:8884/ocr", "eng");
        let result = client.extract_from_url("https://example.test/dash").await;
        assert!(result.is_success());
        assert_eq!(result.numbers, vec![42.0, 1000.0]);
    }

    #[tokio::test]
    async fn test_http_ocr_failure_is_reported_not_raised() {
        let http = Arc::new(CannedHttp { status: 503, body: "" });
        let client = HttpOcrClient::new(http, "http://localhost:8884/ocr", "eng");
        let result = client.extract_from_url("https://example.test/dash").await;
        assert!(!result.is_success());
        assert!(result.error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_disabled_ocr_always_fails() {
        let result = DisabledOcr.extract_from_url("https://example.test").await;
        assert!(!result.is_success());
    }
}
