use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single typed cell. Serialized untagged so tables read naturally as JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Date(NaiveDateTime),
    Text(String),
}

impl CellValue {
    /// Scalars map one-to-one; arrays and objects are kept as their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => CellValue::Null,
            Value::Bool(b) => CellValue::Bool(*b),
            Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Null),
            Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Null => Value::Null,
            CellValue::Bool(b) => Value::Bool(*b),
            CellValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CellValue::Date(d) => Value::String(d.format("%Y-%m-%dT%H:%M:%S").to_string()),
            CellValue::Text(s) => Value::String(s.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// String form used for pattern matching during type inference.
    pub fn render(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::Date(d) => Some(d.format("%Y-%m-%d %H:%M:%S").to_string()),
            CellValue::Text(s) => Some(s.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Date,
    Categorical,
    Mixed,
}

impl ColumnType {
    /// Infers a column type from its non-null cells. An all-null column is categorical.
    pub fn infer<'a>(cells: impl IntoIterator<Item = &'a CellValue>) -> Self {
        let mut numbers = 0usize;
        let mut dates = 0usize;
        let mut others = 0usize;
        for cell in cells {
            match cell {
                CellValue::Null => {}
                CellValue::Number(_) => numbers += 1,
                CellValue::Date(_) => dates += 1,
                CellValue::Bool(_) | CellValue::Text(_) => others += 1,
            }
        }
        match (numbers, dates, others) {
            (n, 0, 0) if n > 0 => ColumnType::Numeric,
            (0, d, 0) if d > 0 => ColumnType::Date,
            (0, 0, _) => ColumnType::Categorical,
            _ => ColumnType::Mixed,
        }
    }
}

/// Tabular component data. After cleaning, `headers.len()` equals every row's
/// arity and `column_types` has one entry per header.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<CellValue>>,
    #[serde(default)]
    pub column_types: Vec<ColumnType>,
}

impl Table {
    pub fn new(name: Option<String>, headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let mut table = Self {
            name,
            headers,
            rows,
            column_types: Vec::new(),
        };
        table.refresh_column_types();
        table
    }

    /// Builds a table from adapter JSON rows. Non-array rows become single-cell rows.
    pub fn from_json_rows(name: Option<String>, headers: Vec<String>, rows: &[Value]) -> Self {
        let rows = rows
            .iter()
            .map(|row| match row {
                Value::Array(cells) => cells.iter().map(CellValue::from_json).collect(),
                other => vec![CellValue::from_json(other)],
            })
            .collect();
        Self::new(name, headers, rows)
    }

    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.len())
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    pub fn column(&self, index: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    pub fn null_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| r.iter())
            .filter(|c| c.is_null())
            .count()
    }

    pub fn refresh_column_types(&mut self) {
        let width = self.width();
        self.column_types = (0..width)
            .map(|i| ColumnType::infer(self.column(i)))
            .collect();
    }
}
