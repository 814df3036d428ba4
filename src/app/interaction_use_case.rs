use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::app::extract_use_case::{DashboardExtractor, ExtractionRequest};
use crate::domain::{names_match, Component, InteractiveState, UnifiedDashboard};
use crate::error::{DashboardError, Result};
use crate::observability::metrics;
use crate::types::ConnectionParams;

/// Filter, slicer, drill and highlight mutations as read, patch, re-extract.
///
/// Holds no state of its own: the snapshot passed in is the current state,
/// and the returned snapshot replaces it.
pub struct InteractiveStateMerger {
    extractor: Arc<DashboardExtractor>,
}

impl InteractiveStateMerger {
    pub fn new(extractor: Arc<DashboardExtractor>) -> Self {
        Self { extractor }
    }

    #[instrument(skip(self, snapshot, params, criteria), fields(source = %snapshot.source))]
    pub async fn apply_filter(
        &self,
        snapshot: &UnifiedDashboard,
        params: &ConnectionParams,
        component_name: &str,
        criteria: Value,
    ) -> UnifiedDashboard {
        self.mutate("apply_filter", snapshot, params, |state| {
            let name = filter_name(snapshot, component_name)
                .ok_or_else(|| DashboardError::not_found("filter", component_name))?;
            state.select_filter(&name, criteria);
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, snapshot, params, value), fields(source = %snapshot.source))]
    pub async fn apply_slicer(
        &self,
        snapshot: &UnifiedDashboard,
        params: &ConnectionParams,
        slicer_name: &str,
        value: Value,
    ) -> UnifiedDashboard {
        self.mutate("apply_slicer", snapshot, params, |state| {
            let name = snapshot
                .find_slicer(slicer_name)
                .and_then(|s| s.name())
                .map(String::from)
                .ok_or_else(|| DashboardError::not_found("slicer", slicer_name))?;
            state.select_slicer(&name, value);
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, snapshot, params), fields(source = %snapshot.source))]
    pub async fn drill_down(
        &self,
        snapshot: &UnifiedDashboard,
        params: &ConnectionParams,
        visual_name: &str,
        level: &str,
    ) -> UnifiedDashboard {
        self.mutate("drill_down", snapshot, params, |state| {
            let name = visual_name_in(snapshot, visual_name)
                .ok_or_else(|| DashboardError::not_found("visual", visual_name))?;
            state.drill_down(&name, level);
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, snapshot, params), fields(source = %snapshot.source))]
    pub async fn drill_up(
        &self,
        snapshot: &UnifiedDashboard,
        params: &ConnectionParams,
        visual_name: &str,
    ) -> UnifiedDashboard {
        self.mutate("drill_up", snapshot, params, |state| {
            let name = visual_name_in(snapshot, visual_name)
                .ok_or_else(|| DashboardError::not_found("visual", visual_name))?;
            let popped = state.drill_up(&name)?;
            info!(visual = %name, level = %popped, "Drilled up");
            Ok(())
        })
        .await
    }

    /// Highlighting an already highlighted point is a no-op apart from the
    /// re-extraction.
    #[instrument(skip(self, snapshot, params, data_point), fields(source = %snapshot.source))]
    pub async fn highlight_data_point(
        &self,
        snapshot: &UnifiedDashboard,
        params: &ConnectionParams,
        component_name: &str,
        data_point: Value,
    ) -> UnifiedDashboard {
        self.mutate("highlight", snapshot, params, |state| {
            let name = snapshot
                .find_component(component_name)
                .and_then(|c| c.name())
                .map(String::from)
                .ok_or_else(|| DashboardError::not_found("component", component_name))?;
            if !state.highlight(&name, data_point) {
                info!(component = %name, "Data point already highlighted");
            }
            Ok(())
        })
        .await
    }

    /// Clears one filter's selection, or every selection when `component_name`
    /// is `None`.
    #[instrument(skip(self, snapshot, params), fields(source = %snapshot.source))]
    pub async fn clear_filter(
        &self,
        snapshot: &UnifiedDashboard,
        params: &ConnectionParams,
        component_name: Option<&str>,
    ) -> UnifiedDashboard {
        self.mutate("clear_filter", snapshot, params, |state| {
            if let Some(requested) = component_name {
                let known = filter_name(snapshot, requested).is_some()
                    || snapshot.find_slicer(requested).is_some()
                    || state.filter_selection(requested).is_some()
                    || state.slicer_selection(requested).is_some();
                if !known {
                    return Err(DashboardError::not_found("filter", requested));
                }
            }
            state.clear_filter(component_name);
            Ok(())
        })
        .await
    }

    /// Re-extracts with the snapshot's interactive state re-applied.
    #[instrument(skip(self, snapshot, params), fields(source = %snapshot.source))]
    pub async fn refresh(&self, snapshot: &UnifiedDashboard, params: &ConnectionParams) -> UnifiedDashboard {
        self.mutate("refresh", snapshot, params, |_| Ok(())).await
    }

    async fn mutate<F>(
        &self,
        action: &'static str,
        snapshot: &UnifiedDashboard,
        params: &ConnectionParams,
        patch: F,
    ) -> UnifiedDashboard
    where
        F: FnOnce(&mut InteractiveState) -> Result<()>,
    {
        let mut state = InteractiveState::from_snapshot(snapshot);
        if let Err(err) = patch(&mut state) {
            warn!(action, error = %err, "Interaction rejected");
            metrics::interaction::rejected(action, err.kind().as_str());
            return UnifiedDashboard::failed(snapshot.source, snapshot.auth_type, err.to_payload());
        }
        metrics::interaction::applied(action);

        let request = ExtractionRequest::new(snapshot.source, snapshot.auth_type, params.clone())
            .with_state(state);
        self.extractor.extract(&request).await
    }
}

/// Name of a filter in the snapshot, as the snapshot spells it. Filter
/// records are searched first, then filter components.
fn filter_name(snapshot: &UnifiedDashboard, requested: &str) -> Option<String> {
    if let Some(name) = snapshot.find_filter(requested).and_then(|f| f.name()) {
        return Some(name.to_string());
    }
    snapshot
        .components
        .iter()
        .filter(|c| matches!(c, Component::Filter(_)))
        .filter_map(|c| c.name())
        .find(|n| names_match(n, requested))
        .map(String::from)
}

/// Drill targets are visual records and visual components.
fn visual_name_in(snapshot: &UnifiedDashboard, requested: &str) -> Option<String> {
    if let Some(name) = snapshot
        .visuals
        .iter()
        .find(|v| v.is_named(requested))
        .and_then(|v| v.name())
    {
        return Some(name.to_string());
    }
    snapshot
        .components
        .iter()
        .filter(|c| matches!(c, Component::Visual(_)))
        .filter_map(|c| c.name())
        .find(|n| names_match(n, requested))
        .map(String::from)
}
