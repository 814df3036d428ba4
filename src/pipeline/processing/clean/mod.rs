//! Record cleaning: column normalization, type conversion, missing values,
//! scalar normalization, categorical synonyms and date re-parsing, applied in
//! that order.

pub mod columns;
pub mod dashboard;
pub mod values;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::constants::{default_semantic_map, default_synonym_map};
use crate::domain::{CellValue, ColumnType, Table};
use crate::error::{DashboardError, Result};
use crate::observability::metrics;

pub use columns::{deduplicate, slugify, ColumnNormalizer};
pub use values::{normalize_scalar, parse_date, parse_date_loose};

/// Record fields the interaction layer addresses by exact value.
const IDENTIFIER_FIELDS: &[&str] = &["name", "selected"];

fn is_cleanable(key: &str, value: &Value) -> bool {
    !value.is_array() && !value.is_object() && !IDENTIFIER_FIELDS.contains(&key)
}

/// Cleaning options, as read from the `[cleaning]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub missing_value_strategy: String,
    pub fill_constant: Value,
    /// Canonical column name → aliases.
    pub semantic_map: BTreeMap<String, Vec<String>>,
    /// Categorical value → canonical value.
    pub synonym_map: BTreeMap<String, String>,
    pub lowercase_categories: bool,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            missing_value_strategy: "drop".to_string(),
            fill_constant: Value::from(0),
            semantic_map: default_semantic_map()
                .into_iter()
                .map(|(canonical, aliases)| {
                    (
                        canonical.to_string(),
                        aliases.into_iter().map(String::from).collect(),
                    )
                })
                .collect(),
            synonym_map: default_synonym_map()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            lowercase_categories: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MissingValueStrategy {
    Drop,
    FillMean,
    FillConstant(CellValue),
}

impl MissingValueStrategy {
    pub fn from_config(name: &str, constant: &Value) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "drop" => Ok(MissingValueStrategy::Drop),
            "fill_mean" => Ok(MissingValueStrategy::FillMean),
            "fill_constant" => Ok(MissingValueStrategy::FillConstant(CellValue::from_json(constant))),
            other => Err(DashboardError::Configuration(format!(
                "unsupported missing value strategy '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub column_type: ColumnType,
    pub unique: usize,
    pub nulls: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub rows: usize,
    pub columns: Vec<ColumnSummary>,
}

static NULL_CELL: CellValue = CellValue::Null;

pub struct DataCleaner {
    columns: ColumnNormalizer,
    strategy: MissingValueStrategy,
    synonyms: HashMap<String, String>,
    lowercase: bool,
}

impl DataCleaner {
    /// Fails with a configuration error when the missing-value strategy is
    /// not one of `drop`, `fill_mean` or `fill_constant`.
    pub fn new(config: &CleaningConfig) -> Result<Self> {
        let strategy =
            MissingValueStrategy::from_config(&config.missing_value_strategy, &config.fill_constant)?;
        let synonyms = config
            .synonym_map
            .iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v.clone()))
            .collect();
        Ok(Self {
            columns: ColumnNormalizer::new(&config.semantic_map),
            strategy,
            synonyms,
            lowercase: config.lowercase_categories,
        })
    }

    pub fn with_defaults() -> Self {
        Self {
            columns: ColumnNormalizer::new(&CleaningConfig::default().semantic_map),
            strategy: MissingValueStrategy::Drop,
            synonyms: CleaningConfig::default()
                .synonym_map
                .into_iter()
                .collect(),
            lowercase: true,
        }
    }

    pub fn strategy(&self) -> &MissingValueStrategy {
        &self.strategy
    }

    pub fn normalize_headers(&self, headers: &[String]) -> Vec<String> {
        self.columns.normalize(headers)
    }

    /// Cleans a table. The result has unique normalized headers, one cell per
    /// header in every row, and refreshed column types.
    pub fn clean_table(&self, table: &Table) -> Table {
        let width = table.width();
        let mut raw_headers = table.headers.clone();
        raw_headers.resize(width, String::new());
        let headers = self.columns.normalize(&raw_headers);

        let mut columns: Vec<Vec<CellValue>> = (0..width)
            .map(|i| {
                table
                    .rows
                    .iter()
                    .map(|row| row.get(i).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
        let row_count = table.rows.len();

        let conversions: Vec<values::Conversion> =
            columns.iter_mut().map(|c| values::convert_column(c)).collect();

        let (kept_rows, filled) = self.handle_missing(&mut columns, &conversions, row_count);
        metrics::cleaning::rows_dropped(row_count - kept_rows);
        metrics::cleaning::cells_filled(filled);

        for (column, conversion) in columns.iter_mut().zip(&conversions) {
            if *conversion == values::Conversion::Unchanged {
                values::normalize_text_column(column);
            }
            self.standardize_categories(column);
            values::reparse_dates(column);
        }

        let rows: Vec<Vec<CellValue>> = (0..kept_rows)
            .map(|r| columns.iter().map(|c| c[r].clone()).collect())
            .collect();

        debug!(
            table = table.name.as_deref().unwrap_or("-"),
            rows_in = row_count,
            rows_out = rows.len(),
            columns = width,
            "Cleaned table"
        );
        metrics::cleaning::table_processed();
        Table::new(table.name.clone(), headers, rows)
    }

    /// Cleans a loosely-typed record as a one-row table. Keys are normalized
    /// together; arrays and objects pass through under their normalized key.
    /// Identifier fields keep their key and value byte for byte. Under
    /// `drop`, null fields are removed rather than the record.
    pub fn clean_record(&self, record: &Map<String, Value>) -> Map<String, Value> {
        let keys: Vec<String> = record.keys().cloned().collect();
        let normalized = self.columns.normalize(&keys);

        let row: Vec<CellValue> = record
            .iter()
            .filter(|(key, value)| is_cleanable(key.as_str(), value))
            .map(|(_, value)| CellValue::from_json(value))
            .collect();
        let mut cleaned_scalars = self.clean_single_row(row.len(), row).into_iter();

        let mut out = Map::new();
        for (normalized_key, (key, value)) in normalized.iter().zip(record.iter()) {
            if IDENTIFIER_FIELDS.contains(&key.as_str()) {
                out.insert(key.clone(), value.clone());
            } else if is_cleanable(key, value) {
                let cell = cleaned_scalars.next().unwrap_or_default();
                if cell.is_null() && self.strategy == MissingValueStrategy::Drop {
                    continue;
                }
                out.insert(normalized_key.clone(), cell.to_json());
            } else {
                out.insert(normalized_key.clone(), value.clone());
            }
        }
        out
    }

    fn clean_single_row(&self, width: usize, row: Vec<CellValue>) -> Vec<CellValue> {
        let mut columns: Vec<Vec<CellValue>> = row.into_iter().map(|c| vec![c]).collect();
        columns.resize(width, vec![CellValue::Null]);
        for column in columns.iter_mut() {
            let conversion = values::convert_column(column);
            if let MissingValueStrategy::FillConstant(constant) = &self.strategy {
                if column[0].is_null() {
                    column[0] = constant.clone();
                }
            }
            if conversion == values::Conversion::Unchanged {
                values::normalize_text_column(column);
            }
            self.standardize_categories(column);
            values::reparse_dates(column);
        }
        columns.into_iter().map(|mut c| c.remove(0)).collect()
    }

    /// Applies the missing-value strategy. Returns the number of rows kept
    /// and the number of cells filled.
    fn handle_missing(
        &self,
        columns: &mut [Vec<CellValue>],
        conversions: &[values::Conversion],
        row_count: usize,
    ) -> (usize, usize) {
        match &self.strategy {
            MissingValueStrategy::Drop => {
                let keep: Vec<bool> = (0..row_count)
                    .map(|r| columns.iter().all(|c| !c[r].is_null()))
                    .collect();
                for column in columns.iter_mut() {
                    let mut r = 0;
                    column.retain(|_| {
                        let k = keep[r];
                        r += 1;
                        k
                    });
                }
                (keep.iter().filter(|k| **k).count(), 0)
            }
            MissingValueStrategy::FillConstant(constant) => {
                let mut filled = 0;
                for cell in columns.iter_mut().flat_map(|c| c.iter_mut()) {
                    if cell.is_null() {
                        *cell = constant.clone();
                        filled += 1;
                    }
                }
                (row_count, filled)
            }
            MissingValueStrategy::FillMean => {
                let mut filled = 0;
                for (column, conversion) in columns.iter_mut().zip(conversions) {
                    let fill = match conversion {
                        values::Conversion::Numeric => column_mean(column),
                        values::Conversion::Date => None,
                        values::Conversion::Unchanged => column_mode(column),
                    };
                    if let Some(fill) = fill {
                        for cell in column.iter_mut().filter(|c| c.is_null()) {
                            *cell = fill.clone();
                            filled += 1;
                        }
                    }
                }
                (row_count, filled)
            }
        }
    }

    fn standardize_categories(&self, column: &mut [CellValue]) {
        for cell in column.iter_mut() {
            if let CellValue::Text(s) = cell {
                let key = s.trim().to_lowercase();
                *s = match self.synonyms.get(&key) {
                    Some(canonical) => canonical.clone(),
                    None if self.lowercase => key,
                    None => s.trim().to_string(),
                };
            }
        }
    }

    /// Per-column profile of a table.
    pub fn summarize(&self, table: &Table) -> TableSummary {
        let width = table.width();
        let columns = (0..width)
            .map(|i| {
                let cells: Vec<&CellValue> = table.rows.iter().map(|r| r.get(i).unwrap_or(&NULL_CELL)).collect();
                let column_type = table
                    .column_types
                    .get(i)
                    .copied()
                    .unwrap_or_else(|| ColumnType::infer(cells.iter().copied()));
                let mut seen: Vec<String> = Vec::new();
                for rendered in cells.iter().filter_map(|c| c.render()) {
                    if !seen.contains(&rendered) {
                        seen.push(rendered);
                    }
                }
                let (min, max) = match column_type {
                    ColumnType::Numeric => {
                        let nums: Vec<f64> = cells.iter().filter_map(|c| c.as_number()).collect();
                        (
                            nums.iter().copied().reduce(f64::min).map(Value::from),
                            nums.iter().copied().reduce(f64::max).map(Value::from),
                        )
                    }
                    ColumnType::Date => {
                        let dates: Vec<_> = cells
                            .iter()
                            .filter_map(|c| match c {
                                CellValue::Date(d) => Some(*d),
                                _ => None,
                            })
                            .collect();
                        (
                            dates.iter().min().map(|d| CellValue::Date(*d).to_json()),
                            dates.iter().max().map(|d| CellValue::Date(*d).to_json()),
                        )
                    }
                    _ => (None, None),
                };
                ColumnSummary {
                    name: table.headers.get(i).cloned().unwrap_or_else(|| format!("column_{}", i + 1)),
                    column_type,
                    unique: seen.len(),
                    nulls: cells.iter().filter(|c| c.is_null()).count(),
                    min,
                    max,
                }
            })
            .collect();
        TableSummary {
            rows: table.rows.len(),
            columns,
        }
    }
}

fn column_mean(column: &[CellValue]) -> Option<CellValue> {
    let nums: Vec<f64> = column.iter().filter_map(|c| c.as_number()).collect();
    if nums.is_empty() {
        return None;
    }
    Some(CellValue::Number(nums.iter().sum::<f64>() / nums.len() as f64))
}

/// Most frequent non-null value; ties go to the value seen first.
fn column_mode(column: &[CellValue]) -> Option<CellValue> {
    let mut counts: Vec<(&CellValue, usize)> = Vec::new();
    for cell in column.iter().filter(|c| !c.is_null()) {
        match counts.iter_mut().find(|(v, _)| *v == cell) {
            Some((_, n)) => *n += 1,
            None => counts.push((cell, 1)),
        }
    }
    let mut best: Option<(&CellValue, usize)> = None;
    for (value, n) in counts {
        if best.map(|(_, b)| n > b).unwrap_or(true) {
            best = Some((value, n));
        }
    }
    best.map(|(v, _)| v.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn cleaner(strategy: &str, constant: Value) -> DataCleaner {
        let config = CleaningConfig {
            missing_value_strategy: strategy.to_string(),
            fill_constant: constant,
            ..CleaningConfig::default()
        };
        DataCleaner::new(&config).unwrap()
    }

    fn sample_table() -> Table {
        Table::new(
            Some("orders".into()),
            vec!["Order Date".into(), "Sales".into(), "Region".into()],
            vec![
                vec![text("2025-01-01"), text("100"), text("East")],
                vec![text("2025-01-02"), CellValue::Null, text("West")],
                vec![text("2025-01-03"), text("300"), CellValue::Null],
                vec![text("2025-01-04"), text("200"), text("East")],
            ],
        )
    }

    #[test]
    fn test_date_and_sales_columns_are_typed() {
        let table = Table::new(
            None,
            vec!["Date".into(), "Sales".into()],
            vec![
                vec![text("2025-01-01"), text("100")],
                vec![text("2025-01-02"), text("150")],
            ],
        );
        let cleaned = DataCleaner::with_defaults().clean_table(&table);
        assert_eq!(cleaned.headers, vec!["date".to_string(), "sales".to_string()]);
        assert_eq!(cleaned.column_types, vec![ColumnType::Date, ColumnType::Numeric]);
        let sales: Vec<f64> = cleaned.column(1).filter_map(|c| c.as_number()).collect();
        assert_eq!(sales, vec![100.0, 150.0]);
    }

    #[test]
    fn test_drop_removes_rows_with_nulls() {
        let input = sample_table();
        let cleaned = cleaner("drop", json!(0)).clean_table(&input);
        assert!(cleaned.rows.len() <= input.rows.len());
        assert_eq!(cleaned.rows.len(), 2);
        assert_eq!(cleaned.null_count(), 0);
        assert_eq!(cleaned.headers[0], "date");
    }

    #[test]
    fn test_fill_constant_leaves_no_nulls() {
        let cleaned = cleaner("fill_constant", json!(0)).clean_table(&sample_table());
        assert_eq!(cleaned.rows.len(), 4);
        assert_eq!(cleaned.null_count(), 0);
        assert_eq!(cleaned.rows[1][1], CellValue::Number(0.0));
    }

    #[test]
    fn test_fill_mean_uses_mean_and_mode() {
        let cleaned = cleaner("fill_mean", json!(null)).clean_table(&sample_table());
        assert_eq!(cleaned.rows[1][1], CellValue::Number(200.0));
        assert_eq!(cleaned.rows[2][2], text("east"));
    }

    #[test]
    fn test_unsupported_strategy_is_configuration_error() {
        let config = CleaningConfig {
            missing_value_strategy: "interpolate".into(),
            ..CleaningConfig::default()
        };
        let err = DataCleaner::new(&config).err().unwrap();
        assert!(matches!(err, DashboardError::Configuration(_)));
    }

    #[test]
    fn test_currency_and_percent_values() {
        let table = Table::new(
            None,
            vec!["Revenue".into(), "Margin".into()],
            vec![vec![text("$1,200"), text("45%")], vec![text("$800"), text("12%")]],
        );
        let cleaned = DataCleaner::with_defaults().clean_table(&table);
        assert_eq!(cleaned.rows[0][0], CellValue::Number(1200.0));
        assert_eq!(cleaned.rows[0][1], CellValue::Number(0.45));
        assert_eq!(cleaned.column_types[1], ColumnType::Numeric);
    }

    #[test]
    fn test_synonyms_and_lowercasing() {
        let table = Table::new(
            None,
            vec!["Active".into()],
            vec![vec![text(" Yes ")], vec![text("N/A")], vec![text("Maybe")]],
        );
        let cleaned = DataCleaner::with_defaults().clean_table(&table);
        assert_eq!(cleaned.rows[0][0], text("affirmative"));
        assert_eq!(cleaned.rows[1][0], text("not_applicable"));
        assert_eq!(cleaned.rows[2][0], text("maybe"));
    }

    #[test]
    fn test_ragged_rows_are_padded() {
        let table = Table::new(
            None,
            vec!["a".into()],
            vec![vec![text("x"), text("1")], vec![text("y")]],
        );
        let cleaned = cleaner("fill_constant", json!("none")).clean_table(&table);
        assert_eq!(cleaned.headers, vec!["a".to_string(), "column_2".to_string()]);
        assert!(cleaned.rows.iter().all(|r| r.len() == 2));
    }

    #[test]
    fn test_clean_record_keeps_nested_values() {
        let record = json!({
            "Label": "Total Sales",
            "Value": "$1,200",
            "Options": ["A", "B"],
            "Note": null
        });
        let cleaned = DataCleaner::with_defaults().clean_record(record.as_object().unwrap());
        assert_eq!(cleaned.get("label"), Some(&json!("total sales")));
        assert_eq!(cleaned.get("value"), Some(&json!(1200.0)));
        assert_eq!(cleaned.get("options"), Some(&json!(["A", "B"])));
        assert!(cleaned.get("note").is_none());
    }

    #[test]
    fn test_clean_record_keeps_identifiers_verbatim() {
        let cleaner = DataCleaner::with_defaults();
        let slicer = json!({"name": "2024", "selected": "45%", "value": "45%"});
        let cleaned = cleaner.clean_record(slicer.as_object().unwrap());
        assert_eq!(cleaned.get("name"), Some(&json!("2024")));
        assert_eq!(cleaned.get("selected"), Some(&json!("45%")));
        assert_eq!(cleaned.get("value"), Some(&json!(0.45)));

        let visual = json!({"name": "No", "selected": "West", "visual_type": "Bar"});
        let cleaned = cleaner.clean_record(visual.as_object().unwrap());
        assert_eq!(cleaned.get("name"), Some(&json!("No")));
        assert_eq!(cleaned.get("selected"), Some(&json!("West")));
        assert_eq!(cleaned.get("visual_type"), Some(&json!("bar")));

        let unselected = json!({"name": "Region", "selected": null});
        let cleaned = cleaner.clean_record(unselected.as_object().unwrap());
        assert_eq!(cleaned.get("selected"), Some(&Value::Null));
    }

    #[test]
    fn test_summarize_reports_ranges() {
        let cleaned = cleaner("fill_constant", json!(0)).clean_table(&sample_table());
        let summary = DataCleaner::with_defaults().summarize(&cleaned);
        assert_eq!(summary.rows, 4);
        let sales = &summary.columns[1];
        assert_eq!(sales.column_type, ColumnType::Numeric);
        assert_eq!(sales.min, Some(json!(0.0)));
        assert_eq!(sales.max, Some(json!(300.0)));
        assert_eq!(summary.columns[0].column_type, ColumnType::Date);
    }
}
