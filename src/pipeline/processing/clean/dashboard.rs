use tracing::debug;

use super::DataCleaner;
use crate::domain::{Component, Record, UnifiedDashboard};

impl DataCleaner {
    /// Cleans every table, record and structured component of a dashboard.
    /// Highlights and drill state are carried over untouched; failed
    /// dashboards are returned as they are.
    pub fn clean_dashboard(&self, mut dashboard: UnifiedDashboard) -> UnifiedDashboard {
        if !dashboard.is_success() {
            return dashboard;
        }

        dashboard.tables = dashboard.tables.iter().map(|t| self.clean_table(t)).collect();

        for records in [
            &mut dashboard.kpis,
            &mut dashboard.filters,
            &mut dashboard.slicers,
            &mut dashboard.visuals,
        ] {
            for record in records.iter_mut() {
                *record = Record::from_map(self.clean_record(&record.0));
            }
        }

        dashboard.components = dashboard
            .components
            .into_iter()
            .map(|c| self.clean_component(c))
            .collect();

        debug!(
            tables = dashboard.tables.len(),
            components = dashboard.components.len(),
            "Cleaned dashboard"
        );
        dashboard
    }

    /// Structured kinds are cleaned; layout and unknown components pass through.
    pub fn clean_component(&self, component: Component) -> Component {
        match component {
            Component::Table(mut table) => {
                let cleaned = self.clean_table(&table.to_table());
                table.set_table(cleaned);
                Component::Table(table)
            }
            c @ (Component::Kpi(_) | Component::Filter(_) | Component::Visual(_)) => {
                let meta = c.meta().clone();
                let cleaned = self.clean_record(&c.attributes());
                let mut rebuilt =
                    Component::from_attributes(c.kind(), cleaned, meta.highlights, meta.drill_state);
                // A name is an identifier, not a category.
                rebuilt.meta_mut().name = meta.name;
                rebuilt
            }
            other => other,
        }
    }
}
