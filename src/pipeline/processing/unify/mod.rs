//! Folds adapter-native results into the unified dashboard schema.

use std::fmt;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::{
    names_match, AuthType, Component, DrillState, InteractiveState, Layout, Record, Source, Status,
    Table, UnifiedDashboard,
};
use crate::error::ErrorPayload;
use crate::observability::metrics;
use crate::types::RawExtraction;

/// Lifecycle of one extraction attempt. `Failed` is terminal and reachable
/// from every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPhase {
    Connecting,
    Extracting,
    Unifying,
    Done,
    Failed,
}

impl ExtractionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionPhase::Connecting => "connecting",
            ExtractionPhase::Extracting => "extracting",
            ExtractionPhase::Unifying => "unifying",
            ExtractionPhase::Done => "done",
            ExtractionPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExtractionPhase::Done | ExtractionPhase::Failed)
    }

    /// The next phase on success. Terminal phases stay where they are.
    pub fn advance(self) -> Self {
        match self {
            ExtractionPhase::Connecting => ExtractionPhase::Extracting,
            ExtractionPhase::Extracting => ExtractionPhase::Unifying,
            ExtractionPhase::Unifying => ExtractionPhase::Done,
            terminal => terminal,
        }
    }
}

impl fmt::Display for ExtractionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalizes an adapter container into an ordered sequence of entries.
///
/// Sequences pass through. An object whose values are all objects is treated
/// as a name-keyed map: entries come out in key order and an entry without a
/// `name` takes its key. Any other object is a single entry.
pub fn entries(container: &Value) -> Vec<Value> {
    match container {
        Value::Null => Vec::new(),
        Value::Array(items) => items.clone(),
        Value::Object(map) if !map.is_empty() && map.values().all(|v| v.is_object()) => map
            .iter()
            .map(|(key, entry)| {
                let mut entry = entry.clone();
                if let Value::Object(fields) = &mut entry {
                    if !fields.contains_key("name") {
                        fields.insert("name".to_string(), Value::String(key.clone()));
                    }
                }
                entry
            })
            .collect(),
        Value::Object(map) if map.is_empty() => Vec::new(),
        other => vec![other.clone()],
    }
}

fn as_record(entry: Value) -> Record {
    match entry {
        Value::Object(map) => Record::from_map(map),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            Record::from_map(map)
        }
    }
}

fn as_table(entry: &Value) -> Option<Table> {
    let fields = entry.as_object()?;
    let name = fields.get("name").and_then(|n| n.as_str()).map(String::from);
    let headers: Vec<String> = fields
        .get("headers")
        .or_else(|| fields.get("fields"))
        .and_then(|h| h.as_array())
        .map(|h| {
            h.iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    let rows = fields.get("rows").and_then(|r| r.as_array());
    if headers.is_empty() && rows.is_none() {
        return None;
    }
    let rows = rows.map(|r| r.as_slice()).unwrap_or(&[]);
    Some(Table::from_json_rows(name, headers, rows))
}

fn as_layout(container: &Value) -> Layout {
    match container {
        Value::Array(sections) => Layout {
            sections: sections.clone(),
            extra: Map::new(),
        },
        other => Layout::from_value(other),
    }
}

fn overlay_selection(records: &mut [Record], selections: &std::collections::BTreeMap<String, Value>) {
    for record in records.iter_mut() {
        let Some(name) = record.name().map(String::from) else {
            continue;
        };
        if let Some((_, value)) = selections.iter().find(|(k, _)| names_match(k, &name)) {
            record.set_selected(value.clone());
        }
    }
}

fn lookup<'a, V>(map: &'a std::collections::BTreeMap<String, V>, name: &str) -> Option<&'a V> {
    map.iter().find(|(k, _)| names_match(k, name)).map(|(_, v)| v)
}

/// Stateless: every call is a pure function of the raw result and the
/// caller's prior interactive state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentUnifier;

impl ComponentUnifier {
    pub fn new() -> Self {
        Self
    }

    pub fn unify(
        &self,
        source: Source,
        auth_type: AuthType,
        raw: RawExtraction,
        prior: &InteractiveState,
    ) -> UnifiedDashboard {
        if raw.status != Status::Success {
            let payload = ErrorPayload::from_adapter_value(raw.error.as_ref().unwrap_or(&Value::Null));
            warn!(%source, %auth_type, error = %payload.message, "Adapter reported failure");
            return UnifiedDashboard::failed(source, auth_type, payload);
        }

        let mut dashboard = UnifiedDashboard::empty(source, auth_type);

        for entry in entries(&raw.tables) {
            match as_table(&entry) {
                Some(table) => dashboard.tables.push(table),
                None => warn!(%source, "Skipping table entry without headers or rows"),
            }
        }
        dashboard.kpis = entries(&raw.kpis).into_iter().map(as_record).collect();
        dashboard.filters = entries(&raw.filters).into_iter().map(as_record).collect();
        dashboard.slicers = entries(&raw.slicers).into_iter().map(as_record).collect();
        dashboard.visuals = entries(&raw.visuals).into_iter().map(as_record).collect();
        dashboard.layout = as_layout(&raw.layout);
        dashboard.components = entries(&raw.components)
            .into_iter()
            .map(Component::from)
            .collect();
        dashboard.html_text = raw.html_text.unwrap_or_default();
        dashboard.drill_state = merge_drill_state(prior, raw.drill_state);

        self.overlay(&mut dashboard, prior);

        metrics::extraction::components_unified(dashboard.components.len());
        debug!(
            %source,
            %auth_type,
            tables = dashboard.tables.len(),
            components = dashboard.components.len(),
            "Unified dashboard"
        );
        dashboard
    }

    /// Re-applies the caller's selections, drill levels and highlights.
    fn overlay(&self, dashboard: &mut UnifiedDashboard, prior: &InteractiveState) {
        overlay_selection(&mut dashboard.filters, &prior.filters);
        overlay_selection(&mut dashboard.slicers, &prior.slicers);

        let drill_state = dashboard.drill_state.clone();
        for component in dashboard.components.iter_mut() {
            let Some(name) = component.name().map(String::from) else {
                continue;
            };
            if let Component::Filter(filter) = &mut *component {
                if let Some(value) = lookup(&prior.filters, &name) {
                    filter.selected = Some(value.clone());
                }
            }
            if let Some(levels) = lookup(&drill_state, &name) {
                component.meta_mut().drill_state = Some(levels.clone());
            }
            if let Some(points) = lookup(&prior.highlights, &name) {
                component.meta_mut().highlights.extend(points);
            }
        }
    }
}

/// The caller's drill state replaces the adapter's whenever it has entries.
fn merge_drill_state(prior: &InteractiveState, adapter: Option<DrillState>) -> DrillState {
    if !prior.drill_state.is_empty() {
        return prior.drill_state.clone();
    }
    adapter.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ComponentKind;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn raw(value: Value) -> RawExtraction {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_failed_adapter_result_is_fully_shaped() {
        let dash = ComponentUnifier::new().unify(
            Source::PowerBi,
            AuthType::Private,
            RawExtraction::failed(json!("auth expired")),
            &InteractiveState::new(),
        );
        assert_eq!(dash.status, Status::Failed);
        assert_eq!(dash.source, Source::PowerBi);
        assert_eq!(dash.auth_type, AuthType::Private);
        let error = dash.error.unwrap();
        assert_eq!(error.message, "auth expired");
        assert_eq!(error.kind, ErrorKind::Extraction);
        assert!(dash.tables.is_empty() && dash.kpis.is_empty() && dash.filters.is_empty());
        assert!(dash.visuals.is_empty() && dash.components.is_empty());
    }

    #[test]
    fn test_map_shaped_components_become_sequence() {
        let dash = ComponentUnifier::new().unify(
            Source::PowerBi,
            AuthType::Private,
            raw(json!({
                "components": {
                    "revenue_card": {"type": "kpi", "value": 10},
                    "orders": {"type": "table", "headers": ["a"], "rows": [[1]]}
                },
                "tables": {
                    "orders": {"headers": ["a"], "rows": [[1], [2]]}
                }
            })),
            &InteractiveState::new(),
        );
        assert_eq!(dash.components.len(), 2);
        assert!(dash.components.iter().all(|c| c.highlights().is_empty()));
        assert_eq!(dash.find_component("revenue_card").map(|c| c.kind()), Some(ComponentKind::Kpi));
        assert_eq!(dash.tables[0].name.as_deref(), Some("orders"));
        assert_eq!(dash.tables[0].rows.len(), 2);
        assert!(dash.error.is_none());
    }

    #[test]
    fn test_every_component_exposes_highlights() {
        let dash = ComponentUnifier::new().unify(
            Source::Tableau,
            AuthType::Public,
            raw(json!({
                "components": [
                    {"type": "layout", "sections": ["main"]},
                    {"id": "w1", "text": "Sales 42"},
                    {"type": "unknown", "original_type": "error", "message": "OCR failed"}
                ]
            })),
            &InteractiveState::new(),
        );
        let value = serde_json::to_value(&dash).unwrap();
        for component in value["components"].as_array().unwrap() {
            assert_eq!(component["highlights"], json!([]));
        }
    }

    #[test]
    fn test_prior_drill_state_overrides_adapter() {
        let mut prior = InteractiveState::new();
        prior.drill_down("map", "state");
        let dash = ComponentUnifier::new().unify(
            Source::Tableau,
            AuthType::Public,
            raw(json!({
                "drill_state": {"map": ["country", "state"]},
                "components": [{"type": "visual", "name": "Map"}]
            })),
            &prior,
        );
        assert_eq!(dash.drill_state.get("map"), Some(&vec!["state".to_string()]));
        assert_eq!(
            dash.components[0].meta().drill_state,
            Some(vec!["state".to_string()])
        );

        let dash = ComponentUnifier::new().unify(
            Source::Tableau,
            AuthType::Public,
            raw(json!({"drill_state": {"map": ["country"]}})),
            &InteractiveState::new(),
        );
        assert_eq!(dash.drill_state.get("map"), Some(&vec!["country".to_string()]));
    }

    #[test]
    fn test_prior_selections_and_highlights_are_overlaid() {
        let mut prior = InteractiveState::new();
        prior.select_filter("Region", json!("West"));
        prior.highlight("Sales Chart", json!("Q1"));
        let dash = ComponentUnifier::new().unify(
            Source::PowerBi,
            AuthType::Public,
            raw(json!({
                "filters": [{"name": "region", "options": ["East", "West"]}],
                "components": [
                    {"type": "visual", "name": "Sales Chart", "highlights": ["Q1"]},
                    {"type": "filter", "name": "Region"}
                ]
            })),
            &prior,
        );
        assert_eq!(dash.filters[0].selected(), Some(&json!("West")));
        assert_eq!(dash.components[0].highlights().len(), 1);
        match &dash.components[1] {
            Component::Filter(f) => assert_eq!(f.selected, Some(json!("West"))),
            other => panic!("expected filter, got {:?}", other),
        }
    }

    #[test]
    fn test_entries_shapes() {
        assert!(entries(&Value::Null).is_empty());
        assert_eq!(entries(&json!({"headers": ["a"], "rows": []})).len(), 1);
        let keyed = entries(&json!({"b": {"v": 1}, "a": {"name": "alpha"}}));
        assert_eq!(keyed[0]["name"], json!("b"));
        assert_eq!(keyed[1]["name"], json!("alpha"));
    }

    #[test]
    fn test_phase_transitions() {
        let mut phase = ExtractionPhase::Connecting;
        let mut seen = vec![phase];
        while !phase.is_terminal() {
            phase = phase.advance();
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                ExtractionPhase::Connecting,
                ExtractionPhase::Extracting,
                ExtractionPhase::Unifying,
                ExtractionPhase::Done
            ]
        );
        assert_eq!(ExtractionPhase::Failed.advance(), ExtractionPhase::Failed);
    }
}
