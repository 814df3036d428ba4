//! The unified dashboard schema shared by every layer.

pub mod component;
pub mod state;
pub mod table;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants;
use crate::error::{DashboardError, ErrorPayload, Result};

pub use component::{Component, ComponentKind, ComponentMeta, Highlights};
pub use state::InteractiveState;
pub use table::{CellValue, ColumnType, Table};

/// Component/visual name → ordered stack of applied hierarchy levels.
pub type DrillState = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Success,
    Failed,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "powerbi")]
    PowerBi,
    #[serde(rename = "tableau")]
    Tableau,
}

static POWERBI_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"/powerbi/|/reports/").unwrap());
static TABLEAU_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"/tableau/|/views/").unwrap());

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::PowerBi => constants::POWERBI,
            Source::Tableau => constants::TABLEAU,
        }
    }

    /// Guess the vendor from a dashboard URL.
    pub fn detect_from_url(url: &str) -> Result<Self> {
        let lower = url.to_lowercase();
        if lower.contains("powerbi.com") || POWERBI_PATH.is_match(&lower) {
            return Ok(Source::PowerBi);
        }
        if lower.contains("tableau.com") || TABLEAU_PATH.is_match(&lower) {
            return Ok(Source::Tableau);
        }
        Err(DashboardError::UnsupportedSource(format!(
            "could not detect BI source from URL: {}",
            url
        )))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            constants::POWERBI | "power_bi" | "power-bi" => Ok(Source::PowerBi),
            constants::TABLEAU => Ok(Source::Tableau),
            other => Err(DashboardError::UnsupportedSource(format!(
                "unsupported source '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    Public,
    Private,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::Public => "public",
            AuthType::Private => "private",
        }
    }

    /// Pattern-only check for publish-to-web style URLs.
    pub fn infer_from_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        let public_powerbi = lower.contains("app.powerbi.com")
            && (lower.contains("/public/report") || lower.contains("/view?r="));
        if lower.contains("public.tableau.com") || public_powerbi {
            AuthType::Public
        } else {
            AuthType::Private
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthType {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "public" => Ok(AuthType::Public),
            "private" => Ok(AuthType::Private),
            other => Err(DashboardError::UnsupportedSource(format!(
                "unsupported auth_type '{}'",
                other
            ))),
        }
    }
}

/// Names are matched trimmed and case-insensitively, since cleaning lowercases values.
pub fn names_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// A loosely-typed record (KPI, filter, slicer or visual). Its shape varies by
/// adapter; only `name` and `selected` carry meaning for the state merger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(|v| v.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn selected(&self) -> Option<&Value> {
        self.0.get("selected").filter(|v| !v.is_null())
    }

    pub fn set_selected(&mut self, value: Value) {
        self.0.insert("selected".to_string(), value);
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name().map(|n| names_match(n, name)).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default)]
    pub sections: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Layout {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => {
                let mut extra = map.clone();
                let sections = match extra.remove("sections") {
                    Some(Value::Array(items)) => items,
                    Some(Value::Null) | None => Vec::new(),
                    Some(other) => vec![other],
                };
                Layout { sections, extra }
            }
            _ => Layout::default(),
        }
    }
}

/// The canonical cross-vendor snapshot. Every field is always present; absent
/// data is an empty container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedDashboard {
    pub status: Status,
    pub source: Source,
    pub auth_type: AuthType,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub kpis: Vec<Record>,
    #[serde(default)]
    pub filters: Vec<Record>,
    #[serde(default)]
    pub slicers: Vec<Record>,
    #[serde(default)]
    pub visuals: Vec<Record>,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub html_text: String,
    #[serde(default)]
    pub drill_state: DrillState,
    #[serde(default)]
    pub error: Option<ErrorPayload>,
}

impl UnifiedDashboard {
    /// An empty successful snapshot for the given source.
    pub fn empty(source: Source, auth_type: AuthType) -> Self {
        Self {
            status: Status::Success,
            source,
            auth_type,
            tables: Vec::new(),
            kpis: Vec::new(),
            filters: Vec::new(),
            slicers: Vec::new(),
            visuals: Vec::new(),
            layout: Layout::default(),
            components: Vec::new(),
            html_text: String::new(),
            drill_state: DrillState::new(),
            error: None,
        }
    }

    /// A fully-shaped failed snapshot: all containers empty, error set.
    pub fn failed(source: Source, auth_type: AuthType, error: ErrorPayload) -> Self {
        Self {
            status: Status::Failed,
            error: Some(error),
            ..Self::empty(source, auth_type)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn find_filter(&self, name: &str) -> Option<&Record> {
        self.filters.iter().find(|f| f.is_named(name))
    }

    pub fn find_slicer(&self, name: &str) -> Option<&Record> {
        self.slicers.iter().find(|s| s.is_named(name))
    }

    pub fn find_component(&self, name: &str) -> Option<&Component> {
        self.components
            .iter()
            .find(|c| c.name().map(|n| names_match(n, name)).unwrap_or(false))
    }
}
