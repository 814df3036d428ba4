use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Unsupported source/auth combination: {0}")]
    UnsupportedSource(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    EmptyState(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DashboardError {
    pub fn not_found(what: &str, name: &str) -> Self {
        DashboardError::NotFound(format!("{} '{}' not found", what, name))
    }

    pub fn empty_drill_state(visual: &str) -> Self {
        DashboardError::EmptyState(format!("drill state for '{}' is empty", visual))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DashboardError::Connection(_) | DashboardError::Http(_) | DashboardError::Io(_) => {
                ErrorKind::Connection
            }
            DashboardError::UnsupportedSource(_) => ErrorKind::UnsupportedSource,
            DashboardError::NotFound(_) => ErrorKind::NotFound,
            DashboardError::EmptyState(_) => ErrorKind::EmptyState,
            DashboardError::Configuration(_) | DashboardError::Toml(_) => ErrorKind::Configuration,
            DashboardError::Extraction(_) | DashboardError::Json(_) | DashboardError::Csv(_) => {
                ErrorKind::Extraction
            }
        }
    }

    /// The bare message, without the variant prefix used by `Display`.
    pub fn message(&self) -> String {
        match self {
            DashboardError::Connection(m)
            | DashboardError::UnsupportedSource(m)
            | DashboardError::NotFound(m)
            | DashboardError::EmptyState(m)
            | DashboardError::Configuration(m)
            | DashboardError::Extraction(m) => m.clone(),
            other => other.to_string(),
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind(),
            message: self.message(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;

/// Error taxonomy as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connection,
    UnsupportedSource,
    NotFound,
    EmptyState,
    Configuration,
    Extraction,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::UnsupportedSource => "unsupported_source",
            ErrorKind::NotFound => "not_found",
            ErrorKind::EmptyState => "empty_state",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Extraction => "extraction",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "connection" => Some(ErrorKind::Connection),
            "unsupported_source" => Some(ErrorKind::UnsupportedSource),
            "not_found" => Some(ErrorKind::NotFound),
            "empty_state" => Some(ErrorKind::EmptyState),
            "configuration" => Some(ErrorKind::Configuration),
            "extraction" => Some(ErrorKind::Extraction),
            _ => None,
        }
    }
}

/// Structured error embedded in a failed dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Builds a payload from whatever an adapter put in its `error` slot:
    /// a bare string, a `{type, message}` object, or anything else.
    pub fn from_adapter_value(value: &Value) -> Self {
        match value {
            Value::String(s) => ErrorPayload::new(ErrorKind::Extraction, s.clone()),
            Value::Object(map) => {
                let kind = map
                    .get("type")
                    .and_then(|t| t.as_str())
                    .and_then(ErrorKind::parse)
                    .unwrap_or(ErrorKind::Extraction);
                let message = map
                    .get("message")
                    .map(|m| match m {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .unwrap_or_else(|| value.to_string());
                ErrorPayload::new(kind, message)
            }
            Value::Null => ErrorPayload::new(ErrorKind::Extraction, "adapter reported failure"),
            other => ErrorPayload::new(ErrorKind::Extraction, other.to_string()),
        }
    }
}

impl From<&DashboardError> for ErrorPayload {
    fn from(err: &DashboardError) -> Self {
        err.to_payload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connection_payload_keeps_bare_message() {
        let err = DashboardError::Connection("auth expired".to_string());
        let payload = err.to_payload();
        assert_eq!(payload.kind, ErrorKind::Connection);
        assert_eq!(payload.message, "auth expired");
        assert_eq!(err.to_string(), "Connection failed: auth expired");
    }

    #[test]
    fn test_payload_from_adapter_object() {
        let payload = ErrorPayload::from_adapter_value(&json!({
            "type": "connection",
            "message": "token rejected"
        }));
        assert_eq!(payload.kind, ErrorKind::Connection);
        assert_eq!(payload.message, "token rejected");

        let payload = ErrorPayload::from_adapter_value(&json!({"type": "exception", "message": "boom"}));
        assert_eq!(payload.kind, ErrorKind::Extraction);
    }

    #[test]
    fn test_payload_serializes_type_field() {
        let payload = ErrorPayload::new(ErrorKind::NotFound, "filter 'Region' not found");
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value, json!({"type": "not_found", "message": "filter 'Region' not found"}));
    }
}
