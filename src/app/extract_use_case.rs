use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::app::ports::{AdapterFactory, AdapterRequest, ConnectorPort};
use crate::domain::{AuthType, InteractiveState, Source, UnifiedDashboard};
use crate::error::{DashboardError, Result};
use crate::observability::metrics;
use crate::pipeline::processing::{ComponentUnifier, DataCleaner, ExtractionPhase};
use crate::types::ConnectionParams;

/// Everything one extraction call needs: which dashboard, how to reach it,
/// and the interactive state to re-apply.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub source: Source,
    pub auth_type: AuthType,
    pub params: ConnectionParams,
    pub state: InteractiveState,
}

impl ExtractionRequest {
    pub fn new(source: Source, auth_type: AuthType, params: ConnectionParams) -> Self {
        Self {
            source,
            auth_type,
            params,
            state: InteractiveState::default(),
        }
    }

    pub fn with_state(mut self, state: InteractiveState) -> Self {
        self.state = state;
        self
    }
}

/// Use case for extracting one dashboard into the unified schema.
///
/// This is the error-containment boundary: connector and adapter failures
/// come back as a failed dashboard, never as an `Err`.
pub struct DashboardExtractor {
    connector: Arc<dyn ConnectorPort>,
    adapters: Arc<dyn AdapterFactory>,
    unifier: ComponentUnifier,
    cleaner: Option<DataCleaner>,
}

impl DashboardExtractor {
    pub fn new(connector: Arc<dyn ConnectorPort>, adapters: Arc<dyn AdapterFactory>) -> Self {
        Self {
            connector,
            adapters,
            unifier: ComponentUnifier::new(),
            cleaner: None,
        }
    }

    /// Clean every successful extraction before returning it.
    pub fn with_cleaner(mut self, cleaner: DataCleaner) -> Self {
        self.cleaner = Some(cleaner);
        self
    }

    #[instrument(
        skip(self, request),
        fields(source = %request.source, auth_type = %request.auth_type, extraction_id = tracing::field::Empty)
    )]
    pub async fn extract(&self, request: &ExtractionRequest) -> UnifiedDashboard {
        let extraction_id = Uuid::new_v4();
        tracing::Span::current().record("extraction_id", tracing::field::display(extraction_id));
        let started = Instant::now();
        let mut phase = ExtractionPhase::Connecting;

        let result = self.run(request, &mut phase).await;
        metrics::extraction::duration(request.source.as_str(), started.elapsed().as_secs_f64());

        match result {
            Ok(dashboard) if dashboard.is_success() => {
                info!(
                    components = dashboard.components.len(),
                    tables = dashboard.tables.len(),
                    "Extraction finished"
                );
                metrics::extraction::success(request.source.as_str());
                dashboard
            }
            Ok(dashboard) => {
                let kind = dashboard
                    .error
                    .as_ref()
                    .map(|e| e.kind.as_str())
                    .unwrap_or("extraction");
                metrics::extraction::failed(request.source.as_str(), kind);
                dashboard
            }
            Err(err) => {
                warn!(phase = %phase, error = %err, "Extraction failed");
                metrics::extraction::failed(request.source.as_str(), err.kind().as_str());
                UnifiedDashboard::failed(request.source, request.auth_type, err.to_payload())
            }
        }
    }

    async fn run(&self, request: &ExtractionRequest, phase: &mut ExtractionPhase) -> Result<UnifiedDashboard> {
        let (source, auth_type) = (request.source, request.auth_type);
        let adapter = self.adapters.for_source(source, auth_type).ok_or_else(|| {
            DashboardError::UnsupportedSource(format!("no adapter for {}/{}", source, auth_type))
        })?;

        debug!(phase = %phase, "Connecting");
        let connection = self.connector.connect(source, auth_type, &request.params).await?;

        *phase = phase.advance();
        debug!(phase = %phase, "Extracting");
        let raw = adapter
            .extract(
                &connection,
                AdapterRequest {
                    params: &request.params,
                    state: &request.state,
                },
            )
            .await?;

        *phase = phase.advance();
        debug!(phase = %phase, "Unifying");
        let mut dashboard = self.unifier.unify(source, auth_type, raw, &request.state);
        if !dashboard.is_success() {
            *phase = ExtractionPhase::Failed;
            return Ok(dashboard);
        }
        if let Some(cleaner) = &self.cleaner {
            dashboard = cleaner.clean_dashboard(dashboard);
        }

        *phase = phase.advance();
        debug!(phase = %phase, "Extraction complete");
        Ok(dashboard)
    }
}
