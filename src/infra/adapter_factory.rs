use std::collections::HashMap;
use std::sync::Arc;

use crate::apis::powerbi::{PowerBiApiAdapter, PowerBiPublicAdapter};
use crate::apis::tableau::{TableauApiAdapter, TableauPublicAdapter};
use crate::app::ports::{AdapterFactory, AdapterPort, HttpClientPort, OcrPort};
use crate::domain::{AuthType, Source};

/// Adapter lookup keyed by source and auth type.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<(Source, AuthType), Arc<dyn AdapterPort>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: Source, auth_type: AuthType, adapter: Arc<dyn AdapterPort>) {
        self.adapters.insert((source, auth_type), adapter);
    }

    /// All four vendor adapters sharing one HTTP client and OCR engine.
    pub fn default_registry(http: Arc<dyn HttpClientPort>, ocr: Arc<dyn OcrPort>) -> Self {
        let mut registry = Self::new();
        registry.register(
            Source::PowerBi,
            AuthType::Private,
            Arc::new(PowerBiApiAdapter::new(http.clone())),
        );
        registry.register(
            Source::PowerBi,
            AuthType::Public,
            Arc::new(PowerBiPublicAdapter::new(http.clone(), ocr.clone())),
        );
        registry.register(
            Source::Tableau,
            AuthType::Private,
            Arc::new(TableauApiAdapter::new(http.clone())),
        );
        registry.register(
            Source::Tableau,
            AuthType::Public,
            Arc::new(TableauPublicAdapter::new(http, ocr)),
        );
        registry
    }
}

impl AdapterFactory for AdapterRegistry {
    fn for_source(&self, source: Source, auth_type: AuthType) -> Option<Arc<dyn AdapterPort>> {
        self.adapters.get(&(source, auth_type)).cloned()
    }
}
