use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::{AuthType, InteractiveState, Source};
use crate::error::Result;
use crate::types::{ConnectionParams, OcrResult, RawExtraction};

#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpGetResult>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl HttpGetResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Vendor REST session for private dashboards.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiSession {
    pub base_url: String,
    pub access_token: String,
    pub workspace_id: Option<String>,
    pub report_id: Option<String>,
    pub site_id: Option<String>,
    pub view_id: Option<String>,
}

/// A fetched public page.
#[derive(Clone, Debug, PartialEq)]
pub struct PageSession {
    pub url: String,
    pub html: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Session {
    Api(ApiSession),
    Page(PageSession),
}

/// An established connection. Owned by the caller of one extraction and
/// dropped afterwards; nothing is registered globally.
#[derive(Clone, Debug)]
pub struct Connection {
    pub source: Source,
    pub auth_type: AuthType,
    pub session: Session,
    pub metadata: Map<String, Value>,
}

#[async_trait]
pub trait ConnectorPort: Send + Sync {
    async fn connect(
        &self,
        source: Source,
        auth_type: AuthType,
        params: &ConnectionParams,
    ) -> Result<Connection>;
}

/// Inputs for one adapter call besides the connection itself.
#[derive(Clone, Copy, Debug)]
pub struct AdapterRequest<'a> {
    pub params: &'a ConnectionParams,
    pub state: &'a InteractiveState,
}

/// One adapter per source × auth combination.
#[async_trait]
pub trait AdapterPort: Send + Sync {
    async fn extract(&self, connection: &Connection, request: AdapterRequest<'_>) -> Result<RawExtraction>;
}

pub trait AdapterFactory: Send + Sync {
    fn for_source(&self, source: Source, auth_type: AuthType) -> Option<Arc<dyn AdapterPort>>;
}

#[async_trait]
pub trait OcrPort: Send + Sync {
    /// Never fails; a failed run is reported in the result.
    async fn extract_from_url(&self, url: &str) -> OcrResult;
}
