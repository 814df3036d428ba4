use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map};
use tracing::{info, instrument};

use crate::app::ports::{ApiSession, Connection, ConnectorPort, HttpClientPort, PageSession, Session};
use crate::config::Config;
use crate::domain::{AuthType, Source};
use crate::error::{DashboardError, Result};
use crate::types::ConnectionParams;

fn required<'a>(value: &'a Option<String>, field: &str, source: Source) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| DashboardError::Connection(format!("{} is required for private {}", field, source)))
}

/// Opens public pages over HTTP and prepares API sessions for private
/// dashboards. Tokens are taken as given; no OAuth flow runs here.
pub struct HttpConnector {
    http: Arc<dyn HttpClientPort>,
    config: Config,
}

impl HttpConnector {
    pub fn new(http: Arc<dyn HttpClientPort>, config: Config) -> Self {
        Self { http, config }
    }

    async fn open_page(&self, params: &ConnectionParams) -> Result<Session> {
        let url = params
            .url
            .as_deref()
            .ok_or_else(|| DashboardError::Connection("url is required for public dashboards".into()))?;
        let response = self.http.get(url, &[]).await?;
        if !response.is_success() {
            return Err(DashboardError::Connection(format!(
                "fetching {} returned HTTP {}",
                url, response.status
            )));
        }
        Ok(Session::Page(PageSession {
            url: url.to_string(),
            html: response.text(),
        }))
    }

    fn open_api(&self, source: Source, params: &ConnectionParams) -> Result<Session> {
        let access_token = required(&params.access_token, "access_token", source)?.to_string();
        let session = match source {
            Source::PowerBi => ApiSession {
                base_url: self.config.powerbi.api_base.clone(),
                access_token,
                workspace_id: params.workspace_id.clone(),
                report_id: Some(required(&params.report_id, "report_id", source)?.to_string()),
                site_id: None,
                view_id: None,
            },
            Source::Tableau => {
                let server = required(&params.server_url, "server_url", source)?;
                ApiSession {
                    base_url: format!(
                        "{}/api/{}",
                        server.trim_end_matches('/'),
                        self.config.tableau.api_version
                    ),
                    access_token,
                    workspace_id: None,
                    report_id: None,
                    site_id: Some(required(&params.site_id, "site_id", source)?.to_string()),
                    view_id: Some(required(&params.view_id, "view_id", source)?.to_string()),
                }
            }
        };
        Ok(Session::Api(session))
    }
}

#[async_trait]
impl ConnectorPort for HttpConnector {
    #[instrument(skip(self, params))]
    async fn connect(&self, source: Source, auth_type: AuthType, params: &ConnectionParams) -> Result<Connection> {
        let session = match auth_type {
            AuthType::Public => self.open_page(params).await?,
            AuthType::Private => self.open_api(source, params)?,
        };

        let mut metadata = Map::new();
        metadata.insert("connected_at".to_string(), json!(Utc::now().to_rfc3339()));
        if let Some(url) = &params.url {
            metadata.insert("url".to_string(), json!(url));
        }
        info!(%source, %auth_type, "Connected");

        Ok(Connection {
            source,
            auth_type,
            session,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::HttpGetResult;

    struct StatusHttp(u16);

    #[async_trait]
    impl HttpClientPort for StatusHttp {
        async fn get(&self, _url: &str, _headers: &[(String, String)]) -> Result<HttpGetResult> {
            Ok(HttpGetResult {
                status: self.0,
                bytes: b"<html><body>ok</body></html>".to_vec(),
                content_type: "text/html".into(),
            })
        }
    }

    fn connector(status: u16) -> HttpConnector {
        HttpConnector::new(Arc::new(StatusHttp(status)), Config::default())
    }

    #[tokio::test]
    async fn test_public_connect_fetches_page() {
        let params = ConnectionParams::for_url("https://public.tableau.com/views/Sales/Overview");
        let connection = connector(200).connect(Source::Tableau, AuthType::Public, &params).await.unwrap();
        match connection.session {
            Session::Page(page) => assert!(page.html.contains("ok")),
            other => panic!("expected page session, got {:?}", other),
        }
        assert!(connection.metadata.contains_key("connected_at"));
    }

    #[tokio::test]
    async fn test_public_connect_rejects_error_status() {
        let params = ConnectionParams::for_url("https://public.tableau.com/views/missing");
        let err = connector(404).connect(Source::Tableau, AuthType::Public, &params).await.unwrap_err();
        assert!(matches!(err, DashboardError::Connection(_)));
    }

    #[tokio::test]
    async fn test_private_connect_requires_token() {
        let params = ConnectionParams {
            report_id: Some("r1".into()),
            ..ConnectionParams::default()
        };
        let err = connector(200).connect(Source::PowerBi, AuthType::Private, &params).await.unwrap_err();
        assert!(err.message().contains("access_token"));
    }

    #[tokio::test]
    async fn test_private_tableau_session_uses_api_version() {
        let params = ConnectionParams {
            server_url: Some("https://tableau.example.com/".into()),
            site_id: Some("site".into()),
            view_id: Some("view".into()),
            access_token: Some("tok".into()),
            ..ConnectionParams::default()
        };
        let connection = connector(200).connect(Source::Tableau, AuthType::Private, &params).await.unwrap();
        let Session::Api(api) = connection.session else {
            panic!("expected api session");
        };
        assert_eq!(api.base_url, "https://tableau.example.com/api/3.21");
    }
}
