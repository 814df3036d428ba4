pub mod adapter_factory;
pub mod connector;
pub mod http_client;
pub mod ocr_client;

pub use adapter_factory::AdapterRegistry;
pub use connector::HttpConnector;
pub use http_client::ReqwestHttp;
pub use ocr_client::{DisabledOcr, HttpOcrClient};

use std::sync::Arc;

use crate::app::ports::{HttpClientPort, OcrPort};
use crate::app::DashboardExtractor;
use crate::config::Config;
use crate::error::Result;
use crate::pipeline::processing::DataCleaner;

/// Wires the production extractor from config. Cleaning is applied to every
/// extraction when `clean` is set.
pub fn build_extractor(config: &Config, clean: bool) -> Result<DashboardExtractor> {
    let http: Arc<dyn HttpClientPort> = Arc::new(ReqwestHttp::new(&config.http)?);
    let ocr: Arc<dyn OcrPort> = match &config.ocr.endpoint {
        Some(endpoint) => Arc::new(HttpOcrClient::new(http.clone(), endpoint.clone(), config.ocr.lang.clone())),
        None => Arc::new(DisabledOcr),
    };
    let connector = HttpConnector::new(http.clone(), config.clone());
    let registry = AdapterRegistry::default_registry(http, ocr);

    let extractor = DashboardExtractor::new(Arc::new(connector), Arc::new(registry));
    if clean {
        Ok(extractor.with_cleaner(DataCleaner::new(&config.cleaning)?))
    } else {
        Ok(extractor)
    }
}
