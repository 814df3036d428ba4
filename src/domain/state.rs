use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::component::Highlights;
use super::{names_match, DrillState, UnifiedDashboard};
use crate::error::{DashboardError, Result};

/// Caller-held interactive state threaded through every extraction.
///
/// Nothing here is cached between calls: the merger rebuilds it from the last
/// snapshot, patches it, and hands it to the next extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractiveState {
    /// Filter name → selected value. Null selections are never stored.
    #[serde(default)]
    pub filters: BTreeMap<String, Value>,
    #[serde(default)]
    pub slicers: BTreeMap<String, Value>,
    #[serde(default)]
    pub drill_state: DrillState,
    #[serde(default)]
    pub highlights: BTreeMap<String, Highlights>,
}

fn find_key<V>(map: &BTreeMap<String, V>, name: &str) -> Option<String> {
    map.keys().find(|k| names_match(k, name)).cloned()
}

fn set_selection(map: &mut BTreeMap<String, Value>, name: &str, value: Value) {
    let key = find_key(map, name).unwrap_or_else(|| name.to_string());
    if value.is_null() {
        map.remove(&key);
    } else {
        map.insert(key, value);
    }
}

impl InteractiveState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstitutes the interactive state carried by a snapshot.
    pub fn from_snapshot(dashboard: &UnifiedDashboard) -> Self {
        let mut state = InteractiveState::new();

        for filter in &dashboard.filters {
            if let (Some(name), Some(selected)) = (filter.name(), filter.selected()) {
                state.filters.insert(name.to_string(), selected.clone());
            }
        }
        for slicer in &dashboard.slicers {
            if let (Some(name), Some(selected)) = (slicer.name(), slicer.selected()) {
                state.slicers.insert(name.to_string(), selected.clone());
            }
        }

        for (name, levels) in &dashboard.drill_state {
            if !levels.is_empty() {
                state.drill_state.insert(name.clone(), levels.clone());
            }
        }

        for component in &dashboard.components {
            let Some(name) = component.name() else {
                continue;
            };
            let meta = component.meta();
            if let Some(levels) = meta.drill_state.as_ref().filter(|l| !l.is_empty()) {
                if find_key(&state.drill_state, name).is_none() {
                    state.drill_state.insert(name.to_string(), levels.clone());
                }
            }
            if let Some(filter) = component_selection(component) {
                if find_key(&state.filters, name).is_none() {
                    state.filters.insert(name.to_string(), filter);
                }
            }
            if !meta.highlights.is_empty() {
                state
                    .highlights
                    .entry(name.to_string())
                    .or_default()
                    .extend(&meta.highlights);
            }
        }

        state
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
            && self.slicers.is_empty()
            && self.drill_state.is_empty()
            && self.highlights.is_empty()
    }

    pub fn select_filter(&mut self, name: &str, value: Value) {
        set_selection(&mut self.filters, name, value);
    }

    pub fn select_slicer(&mut self, name: &str, value: Value) {
        set_selection(&mut self.slicers, name, value);
    }

    pub fn filter_selection(&self, name: &str) -> Option<&Value> {
        find_key(&self.filters, name).and_then(|k| self.filters.get(&k))
    }

    pub fn slicer_selection(&self, name: &str) -> Option<&Value> {
        find_key(&self.slicers, name).and_then(|k| self.slicers.get(&k))
    }

    /// Filter and slicer selections together, filters winning on a name clash.
    pub fn selections(&self) -> BTreeMap<String, Value> {
        let mut all = self.slicers.clone();
        for (name, value) in &self.filters {
            all.insert(name.clone(), value.clone());
        }
        all
    }

    pub fn drill_levels(&self, visual: &str) -> Option<&Vec<String>> {
        find_key(&self.drill_state, visual).and_then(|k| self.drill_state.get(&k))
    }

    pub fn drill_down(&mut self, visual: &str, level: &str) {
        let key = find_key(&self.drill_state, visual).unwrap_or_else(|| visual.to_string());
        self.drill_state
            .entry(key)
            .or_default()
            .push(level.to_string());
    }

    /// Pops the last drill level. An emptied stack is removed so that a
    /// drill-down followed by a drill-up leaves the state as it was.
    pub fn drill_up(&mut self, visual: &str) -> Result<String> {
        let key = find_key(&self.drill_state, visual)
            .ok_or_else(|| DashboardError::empty_drill_state(visual))?;
        let levels = self
            .drill_state
            .get_mut(&key)
            .ok_or_else(|| DashboardError::empty_drill_state(visual))?;
        let popped = levels
            .pop()
            .ok_or_else(|| DashboardError::empty_drill_state(visual))?;
        if levels.is_empty() {
            self.drill_state.remove(&key);
        }
        Ok(popped)
    }

    /// Returns false when the point was already highlighted.
    pub fn highlight(&mut self, component: &str, point: Value) -> bool {
        let key = find_key(&self.highlights, component).unwrap_or_else(|| component.to_string());
        self.highlights.entry(key).or_default().insert(point)
    }

    pub fn highlights_for(&self, component: &str) -> Option<&Highlights> {
        find_key(&self.highlights, component).and_then(|k| self.highlights.get(&k))
    }

    /// Clears the named filter and slicer selection, or every selection when
    /// no name is given. Returns whether anything was cleared.
    pub fn clear_filter(&mut self, name: Option<&str>) -> bool {
        match name {
            Some(name) => {
                let mut cleared = false;
                if let Some(key) = find_key(&self.filters, name) {
                    cleared |= self.filters.remove(&key).is_some();
                }
                if let Some(key) = find_key(&self.slicers, name) {
                    cleared |= self.slicers.remove(&key).is_some();
                }
                cleared
            }
            None => {
                let cleared = !self.filters.is_empty() || !self.slicers.is_empty();
                self.filters.clear();
                self.slicers.clear();
                cleared
            }
        }
    }
}

fn component_selection(component: &super::Component) -> Option<Value> {
    match component {
        super::Component::Filter(f) => f.selected.clone(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AuthType, Component, Record, Source};
    use crate::error::ErrorKind;
    use serde_json::json;

    fn snapshot() -> UnifiedDashboard {
        let mut dash = UnifiedDashboard::empty(Source::Tableau, AuthType::Public);
        let mut region = Record::new();
        region.insert("name", json!("Region"));
        region.insert("selected", json!("West"));
        let mut year = Record::new();
        year.insert("name", json!("Year"));
        year.insert("selected", Value::Null);
        dash.filters = vec![region, year];
        dash.drill_state.insert("map".to_string(), vec!["country".to_string()]);
        dash.components.push(Component::from(json!({
            "type": "visual",
            "name": "Sales Chart",
            "highlights": ["Q1"]
        })));
        dash
    }

    #[test]
    fn test_from_snapshot_keeps_only_real_selections() {
        let state = InteractiveState::from_snapshot(&snapshot());
        assert_eq!(state.filters.len(), 1);
        assert_eq!(state.filter_selection("region"), Some(&json!("West")));
        assert_eq!(state.drill_levels("MAP"), Some(&vec!["country".to_string()]));
        assert_eq!(state.highlights_for("sales chart").map(|h| h.len()), Some(1));
    }

    #[test]
    fn test_drill_round_trip_restores_state() {
        let mut state = InteractiveState::from_snapshot(&snapshot());
        let before = state.drill_state.clone();

        state.drill_down("map", "state");
        assert_eq!(state.drill_levels("map").map(|l| l.len()), Some(2));
        assert_eq!(state.drill_up("map").unwrap(), "state");
        assert_eq!(state.drill_state, before);

        state.drill_down("trend", "month");
        state.drill_up("trend").unwrap();
        assert_eq!(state.drill_state, before);
    }

    #[test]
    fn test_drill_up_on_empty_stack_is_reported() {
        let mut state = InteractiveState::new();
        let err = state.drill_up("map").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyState);

        state.drill_state.insert("map".to_string(), Vec::new());
        assert!(state.drill_up("map").is_err());
    }

    #[test]
    fn test_highlight_is_idempotent() {
        let mut state = InteractiveState::new();
        assert!(state.highlight("chart", json!({"x": 1})));
        assert!(!state.highlight("chart", json!({"x": 1})));
        assert_eq!(state.highlights_for("chart").unwrap().len(), 1);
    }

    #[test]
    fn test_clear_filter_single_and_all() {
        let mut state = InteractiveState::new();
        state.select_filter("Region", json!("West"));
        state.select_slicer("Year", json!(2024));

        assert!(state.clear_filter(Some("region")));
        assert!(state.filters.is_empty());
        assert_eq!(state.slicers.len(), 1);

        assert!(state.clear_filter(None));
        assert!(state.slicers.is_empty());
        assert!(!state.clear_filter(None));
    }

    #[test]
    fn test_null_selection_removes_entry() {
        let mut state = InteractiveState::new();
        state.select_filter("Region", json!("West"));
        state.select_filter("region", Value::Null);
        assert!(state.filters.is_empty());
    }
}
