use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::table::{CellValue, ColumnType, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Table,
    Kpi,
    Filter,
    Visual,
    Layout,
    Unknown,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Table => "table",
            ComponentKind::Kpi => "kpi",
            ComponentKind::Filter => "filter",
            ComponentKind::Visual => "visual",
            ComponentKind::Layout => "layout",
            ComponentKind::Unknown => "unknown",
        }
    }

    /// Maps a declared `type` tag onto a variant, accepting the vendor spellings
    /// seen in adapter output.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "table" | "matrix" => Some(ComponentKind::Table),
            "kpi" | "metric" | "card" => Some(ComponentKind::Kpi),
            "filter" | "slicer" | "dropdown" => Some(ComponentKind::Filter),
            "visual" | "chart" => Some(ComponentKind::Visual),
            "layout" => Some(ComponentKind::Layout),
            "unknown" => Some(ComponentKind::Unknown),
            _ => None,
        }
    }

    /// Name-based guess for entries that arrive without a `type`.
    pub fn infer_from_name(name: &str) -> Self {
        let lname = name.to_lowercase();
        if lname.contains("kpi") || lname.contains("metric") {
            ComponentKind::Kpi
        } else if lname.contains("chart") {
            ComponentKind::Visual
        } else if lname.contains("table") {
            ComponentKind::Table
        } else if lname.contains("filter") {
            ComponentKind::Filter
        } else {
            ComponentKind::Unknown
        }
    }

    /// Kinds whose attributes go through record cleaning.
    pub fn is_structured(&self) -> bool {
        matches!(
            self,
            ComponentKind::Table | ComponentKind::Kpi | ComponentKind::Filter | ComponentKind::Visual
        )
    }
}

/// Highlighted data points of a component. Inserting a point that is already
/// present is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Value>", into = "Vec<Value>")]
pub struct Highlights(Vec<Value>);

impl Highlights {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Returns false when the point was already highlighted.
    pub fn insert(&mut self, point: Value) -> bool {
        if self.0.contains(&point) {
            return false;
        }
        self.0.push(point);
        true
    }

    pub fn extend(&mut self, other: &Highlights) {
        for point in other.iter() {
            self.insert(point.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Value>> for Highlights {
    fn from(points: Vec<Value>) -> Self {
        let mut highlights = Highlights::new();
        for point in points {
            highlights.insert(point);
        }
        highlights
    }
}

impl From<Highlights> for Vec<Value> {
    fn from(h: Highlights) -> Self {
        h.0
    }
}

/// Attributes every component carries regardless of variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComponentMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub highlights: Highlights,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drill_state: Option<Vec<String>>,
}

impl ComponentMeta {
    fn take_from(map: &mut Map<String, Value>) -> Self {
        let name = take_string(map, "name");
        let highlights = match map.remove("highlights") {
            Some(Value::Array(points)) => Highlights::from(points),
            Some(Value::Null) | None => Highlights::new(),
            Some(other) => Highlights::from(vec![other]),
        };
        let drill_state = match map.remove("drill_state") {
            Some(Value::Array(levels)) => Some(levels.iter().filter_map(value_to_string).collect()),
            _ => None,
        };
        Self {
            name,
            highlights,
            drill_state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableComponent {
    #[serde(flatten)]
    pub meta: ComponentMeta,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub column_types: Vec<ColumnType>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TableComponent {
    pub fn to_table(&self) -> Table {
        Table {
            name: self.meta.name.clone(),
            headers: self.headers.clone(),
            rows: self.rows.clone(),
            column_types: self.column_types.clone(),
        }
    }

    pub fn set_table(&mut self, table: Table) {
        self.headers = table.headers;
        self.rows = table.rows;
        self.column_types = table.column_types;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiComponent {
    #[serde(flatten)]
    pub meta: ComponentMeta,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterComponent {
    #[serde(flatten)]
    pub meta: ComponentMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualComponent {
    #[serde(flatten)]
    pub meta: ComponentMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutComponent {
    #[serde(flatten)]
    pub meta: ComponentMeta,
    pub sections: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Anything the adapters produced that is not one of the known variants,
/// including per-component failure placeholders (`original_type: "error"`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnknownComponent {
    #[serde(flatten)]
    pub meta: ComponentMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A dashboard component, discriminated by its `type` tag.
///
/// Deserialization is tolerant: any JSON value converts, falling back to
/// `Unknown`, and a missing `highlights` list becomes an empty one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", from = "Value")]
pub enum Component {
    Table(TableComponent),
    Kpi(KpiComponent),
    Filter(FilterComponent),
    Visual(VisualComponent),
    Layout(LayoutComponent),
    Unknown(UnknownComponent),
}

impl From<Value> for Component {
    fn from(value: Value) -> Self {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        let declared = take_string(&mut map, "type");
        let meta = ComponentMeta::take_from(&mut map);
        let (kind, original_type) = match declared {
            Some(tag) => match ComponentKind::parse(&tag) {
                Some(kind) => (kind, None),
                None => (ComponentKind::Unknown, Some(tag)),
            },
            None => (
                meta.name
                    .as_deref()
                    .map(ComponentKind::infer_from_name)
                    .unwrap_or(ComponentKind::Unknown),
                None,
            ),
        };
        Component::build(kind, meta, map, original_type)
    }
}

impl Component {
    fn build(
        kind: ComponentKind,
        meta: ComponentMeta,
        mut map: Map<String, Value>,
        original_type: Option<String>,
    ) -> Self {
        match kind {
            ComponentKind::Table => {
                let headers = match map.remove("headers").or_else(|| map.remove("fields")) {
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(|h| value_to_string(h).unwrap_or_default())
                        .collect(),
                    _ => Vec::new(),
                };
                let rows = match map.remove("rows") {
                    Some(Value::Array(rows)) => Table::from_json_rows(None, Vec::new(), &rows).rows,
                    _ => Vec::new(),
                };
                let column_types = map
                    .remove("column_types")
                    .and_then(|v| serde_json::from_value(v).ok())
                    .unwrap_or_default();
                Component::Table(TableComponent {
                    meta,
                    headers,
                    rows,
                    column_types,
                    extra: map,
                })
            }
            ComponentKind::Kpi => Component::Kpi(KpiComponent {
                meta,
                value: map.remove("value").unwrap_or(Value::Null),
                description: take_string(&mut map, "description"),
                extra: map,
            }),
            ComponentKind::Filter => Component::Filter(FilterComponent {
                meta,
                filter_type: take_string(&mut map, "filter_type"),
                options: match map.remove("options") {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                },
                value: map.remove("value"),
                selected: map.remove("selected").filter(|v| !v.is_null()),
                extra: map,
            }),
            ComponentKind::Visual => Component::Visual(VisualComponent {
                meta,
                visual_type: take_string(&mut map, "visual_type"),
                extra: map,
            }),
            ComponentKind::Layout => Component::Layout(LayoutComponent {
                meta,
                sections: match map.remove("sections") {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                },
                extra: map,
            }),
            ComponentKind::Unknown => {
                let original_type = original_type.or_else(|| take_string(&mut map, "original_type"));
                Component::Unknown(UnknownComponent {
                    meta,
                    original_type,
                    extra: map,
                })
            }
        }
    }

    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Table(_) => ComponentKind::Table,
            Component::Kpi(_) => ComponentKind::Kpi,
            Component::Filter(_) => ComponentKind::Filter,
            Component::Visual(_) => ComponentKind::Visual,
            Component::Layout(_) => ComponentKind::Layout,
            Component::Unknown(_) => ComponentKind::Unknown,
        }
    }

    pub fn meta(&self) -> &ComponentMeta {
        match self {
            Component::Table(c) => &c.meta,
            Component::Kpi(c) => &c.meta,
            Component::Filter(c) => &c.meta,
            Component::Visual(c) => &c.meta,
            Component::Layout(c) => &c.meta,
            Component::Unknown(c) => &c.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut ComponentMeta {
        match self {
            Component::Table(c) => &mut c.meta,
            Component::Kpi(c) => &mut c.meta,
            Component::Filter(c) => &mut c.meta,
            Component::Visual(c) => &mut c.meta,
            Component::Layout(c) => &mut c.meta,
            Component::Unknown(c) => &mut c.meta,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.meta().name.as_deref()
    }

    pub fn highlights(&self) -> &Highlights {
        &self.meta().highlights
    }

    /// Type-specific attributes as a flat map, without the `type` tag and the
    /// overlay state (`highlights`, `drill_state`).
    pub fn attributes(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => {
                map.remove("type");
                map.remove("highlights");
                map.remove("drill_state");
                map
            }
            _ => Map::new(),
        }
    }

    /// Rebuilds a component of `kind` from attributes, re-attaching the overlay state.
    pub fn from_attributes(
        kind: ComponentKind,
        attributes: Map<String, Value>,
        highlights: Highlights,
        drill_state: Option<Vec<String>>,
    ) -> Self {
        let mut map = attributes;
        map.remove("highlights");
        map.remove("drill_state");
        let meta = ComponentMeta {
            name: take_string(&mut map, "name"),
            highlights,
            drill_state,
        };
        let original_type = match kind {
            ComponentKind::Unknown => take_string(&mut map, "original_type"),
            _ => None,
        };
        map.remove("type");
        Component::build(kind, meta, map, original_type)
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    map.remove(key).as_ref().and_then(value_to_string)
}
