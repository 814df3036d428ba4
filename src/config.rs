use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::constants::{
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_OCR_LANG, DEFAULT_POWERBI_API_BASE, DEFAULT_TABLEAU_API_VERSION,
    DEFAULT_USER_AGENT,
};
use crate::error::{DashboardError, Result};
use crate::pipeline::processing::CleaningConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub cleaning: CleaningConfig,
    pub ocr: OcrConfig,
    pub powerbi: PowerBiConfig,
    pub tableau: TableauConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_HTTP_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// OCR service settings. Without an endpoint OCR is disabled and requests
/// for it degrade to a placeholder component.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub endpoint: Option<String>,
    pub lang: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            lang: DEFAULT_OCR_LANG.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PowerBiConfig {
    pub api_base: String,
}

impl Default for PowerBiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_POWERBI_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TableauConfig {
    pub api_version: String,
}

impl Default for TableauConfig {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_TABLEAU_API_VERSION.to_string(),
        }
    }
}

impl Config {
    /// Loads the config at `path`. A missing file yields the defaults; an
    /// unreadable or malformed one is a configuration error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            DashboardError::Configuration(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DashboardError::Configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.http.timeout_seconds, 10);
        assert_eq!(config.cleaning.missing_value_strategy, "drop");
        assert!(config.ocr.endpoint.is_none());
        assert_eq!(config.tableau.api_version, "3.21");
    }

    #[test]
    fn test_partial_file_overrides_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[http]
timeout_seconds = 3

[cleaning]
missing_value_strategy = "fill_constant"
fill_constant = "unknown"

[cleaning.synonym_map]
y = "affirmative"

[ocr]
endpoint = "http://localhost:8884/ocr"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.http.timeout_seconds, 3);
        assert_eq!(config.http.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.cleaning.fill_constant, serde_json::json!("unknown"));
        assert_eq!(config.cleaning.synonym_map.get("y").map(String::as_str), Some("affirmative"));
        assert!(config.cleaning.semantic_map.contains_key("revenue_usd"));
        assert_eq!(config.ocr.lang, "eng");
    }

    #[test]
    fn test_malformed_file_is_configuration_error() {
        let err = Config::from_toml("[http\ntimeout_seconds = ").unwrap_err();
        assert!(matches!(err, DashboardError::Configuration(_)));
    }
}
