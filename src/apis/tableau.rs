//! Tableau adapters: view data over the REST API for private sites, page
//! scraping for Tableau Public. Both emit sequences.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::apis::html::ScrapedPage;
use crate::apis::{ensure_success, ocr_error_component, run_ocr, selection_text, with_query_params};
use crate::app::ports::{AdapterPort, AdapterRequest, Connection, HttpClientPort, OcrPort, Session};
use crate::domain::InteractiveState;
use crate::error::{DashboardError, Result};
use crate::types::RawExtraction;

/// Parses the CSV export of a view into a single table.
pub fn raw_from_csv(view_name: &str, text: &str) -> Result<RawExtraction> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cells: Vec<String> = record.iter().map(|c| c.trim().to_string()).collect();
        if cells.iter().any(|c| !c.is_empty()) {
            records.push(cells);
        }
    }

    let mut records = records.into_iter();
    let headers = records.next().unwrap_or_default();
    let rows: Vec<Vec<String>> = records.collect();
    debug!(view = view_name, columns = headers.len(), rows = rows.len(), "Parsed view CSV");

    let table = json!({ "name": view_name, "headers": headers, "rows": rows });
    let mut component = table.clone();
    component["type"] = json!("table");

    Ok(RawExtraction {
        tables: json!([table]),
        kpis: json!([]),
        filters: json!([]),
        visuals: json!([]),
        layout: json!({}),
        components: json!([component]),
        ..RawExtraction::success()
    })
}

/// `vf_<field>=<value>` view filters for the REST data endpoint.
fn view_filters(state: &InteractiveState) -> Vec<(String, String)> {
    state
        .selections()
        .iter()
        .map(|(name, value)| (format!("vf_{}", name), selection_text(value)))
        .collect()
}

/// Builds the raw extraction from a Tableau Public page. Numeric texts are
/// used as KPIs only when OCR is off.
pub fn raw_from_page(page: &ScrapedPage, heuristic_kpis: bool) -> RawExtraction {
    let mut tables = Vec::new();
    let mut components = Vec::new();

    for table in &page.tables {
        let Some((headers, rows)) = table.rows.split_first() else {
            continue;
        };
        tables.push(json!({ "headers": headers, "rows": rows }));
        components.push(json!({ "type": "table", "headers": headers, "rows": rows }));
    }

    let mut kpis = Vec::new();
    if heuristic_kpis {
        for (index, text) in page.numeric_texts.iter().enumerate() {
            let name = format!("kpi_{}", index + 1);
            kpis.push(json!({ "name": name, "value": text }));
            components.push(json!({ "type": "kpi", "name": name, "value": text }));
        }
    }

    let mut filters = Vec::new();
    let mut filter_index = 1;
    for select in &page.selects {
        let name = select.name.clone().unwrap_or_else(|| format!("filter_{}", filter_index));
        filters.push(json!({ "name": name, "type": "dropdown", "options": select.options }));
        components.push(json!({
            "type": "filter",
            "name": name,
            "filter_type": "dropdown",
            "options": select.options,
        }));
        filter_index += 1;
    }
    for input in &page.inputs {
        let name = input.name.clone().unwrap_or_else(|| format!("filter_{}", filter_index));
        filters.push(json!({ "name": name, "type": input.input_type, "value": input.value }));
        components.push(json!({
            "type": "filter",
            "name": name,
            "filter_type": input.input_type,
            "value": input.value,
        }));
        filter_index += 1;
    }

    let mut visuals = Vec::new();
    for image in &page.images {
        visuals.push(json!({ "type": "image", "src": image.src, "alt": image.alt }));
        components.push(json!({
            "type": "visual",
            "name": image.alt.clone().or_else(|| image.src.clone()),
            "visual_type": "image",
            "src": image.src,
            "alt": image.alt,
        }));
    }
    for svg in &page.svgs {
        visuals.push(json!({ "type": "svg", "content": svg }));
        components.push(json!({ "type": "visual", "visual_type": "svg", "content": svg }));
    }

    let sections: Vec<Option<String>> = page.sections.iter().map(|s| s.label()).collect();
    components.push(json!({ "type": "layout", "name": "layout", "sections": sections }));

    // Widgets carry no type and surface as unknown components.
    for section in &page.sections {
        components.push(json!({ "id": section.id, "class": section.class, "text": section.text }));
    }

    RawExtraction {
        tables: Value::Array(tables),
        kpis: Value::Array(kpis),
        filters: Value::Array(filters),
        visuals: Value::Array(visuals),
        layout: json!({ "sections": sections }),
        components: Value::Array(components),
        html_text: Some(page.text.clone()),
        ..RawExtraction::success()
    }
}

pub struct TableauApiAdapter {
    http: Arc<dyn HttpClientPort>,
}

impl TableauApiAdapter {
    pub fn new(http: Arc<dyn HttpClientPort>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl AdapterPort for TableauApiAdapter {
    #[instrument(skip(self, connection, request))]
    async fn extract(&self, connection: &Connection, request: AdapterRequest<'_>) -> Result<RawExtraction> {
        let Session::Api(api) = &connection.session else {
            return Err(DashboardError::Extraction("Tableau API adapter needs an API session".into()));
        };
        let (Some(site_id), Some(view_id)) = (api.site_id.as_deref(), api.view_id.as_deref()) else {
            return Err(DashboardError::Connection("site_id and view_id are required".into()));
        };

        let url = format!(
            "{}/sites/{}/views/{}/data",
            api.base_url.trim_end_matches('/'),
            site_id,
            view_id
        );
        let url = with_query_params(&url, &view_filters(request.state))?;
        debug!(%url, "Fetching Tableau view data");

        let headers = vec![("X-Tableau-Auth".to_string(), api.access_token.clone())];
        let response = self.http.get(&url, &headers).await?;
        ensure_success(&response, "Tableau view data API")?;

        let mut raw = raw_from_csv(view_id, &response.text())?;
        raw.drill_state = Some(request.state.drill_state.clone());
        info!(view_id, "Fetched Tableau view data");
        Ok(raw)
    }
}

pub struct TableauPublicAdapter {
    http: Arc<dyn HttpClientPort>,
    ocr: Arc<dyn OcrPort>,
}

impl TableauPublicAdapter {
    pub fn new(http: Arc<dyn HttpClientPort>, ocr: Arc<dyn OcrPort>) -> Self {
        Self { http, ocr }
    }
}

#[async_trait]
impl AdapterPort for TableauPublicAdapter {
    #[instrument(skip(self, connection, request))]
    async fn extract(&self, connection: &Connection, request: AdapterRequest<'_>) -> Result<RawExtraction> {
        let Session::Page(page) = &connection.session else {
            return Err(DashboardError::Extraction("Tableau public adapter needs a page session".into()));
        };

        let selections: Vec<(String, String)> = request
            .state
            .selections()
            .iter()
            .map(|(name, value)| (name.clone(), selection_text(value)))
            .collect();
        let (url, html) = if selections.is_empty() {
            (page.url.clone(), page.html.clone())
        } else {
            let url = with_query_params(&page.url, &selections)?;
            debug!(%url, "Refetching Tableau page with selections");
            let response = self.http.get(&url, &[]).await?;
            ensure_success(&response, "Tableau Public page")?;
            (url, response.text())
        };

        let scraped = ScrapedPage::parse(&html);
        let use_ocr = request.params.use_ocr;
        let mut raw = raw_from_page(&scraped, !use_ocr);

        if use_ocr {
            let ocr = run_ocr(self.ocr.as_ref(), &url).await;
            if let Value::Array(components) = &mut raw.components {
                if ocr.is_success() {
                    let kpis: Vec<Value> = ocr
                        .numbers
                        .iter()
                        .enumerate()
                        .map(|(index, number)| {
                            let name = format!("kpi_{}", index + 1);
                            components.push(json!({ "type": "kpi", "name": name, "value": number }));
                            json!({ "name": name, "value": number })
                        })
                        .collect();
                    raw.kpis = Value::Array(kpis);
                } else {
                    let message = ocr.error.unwrap_or_else(|| "OCR failed".into());
                    components.push(ocr_error_component(&message));
                }
            }
        }

        raw.drill_state = Some(request.state.drill_state.clone());
        info!(tables = scraped.tables.len(), sections = scraped.sections.len(), "Parsed Tableau Public page");
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{ApiSession, HttpGetResult, PageSession};
    use crate::domain::{AuthType, Source};
    use crate::types::{ConnectionParams, OcrResult};
    use serde_json::Map;

    struct MockHttp {
        body: String,
        pub urls: Arc<tokio::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl HttpClientPort for MockHttp {
        async fn get(&self, url: &str, _headers: &[(String, String)]) -> Result<HttpGetResult> {
            self.urls.lock().await.push(url.to_string());
            Ok(HttpGetResult {
                status: 200,
                bytes: self.body.clone().into_bytes(),
                content_type: "text/csv".into(),
            })
        }
    }

    struct MockOcr(OcrResult);

    #[async_trait]
    impl OcrPort for MockOcr {
        async fn extract_from_url(&self, _url: &str) -> OcrResult {
            self.0.clone()
        }
    }

    const PAGE: &str = r#"<html><body>
        <div id="kpis"><h2>Orders 42</h2></div>
        <table><tr><th>Region</th><th>Sales</th></tr><tr></tr><tr><td>East</td><td>10</td></tr></table>
        <select name="region"><option>East</option><option>West</option></select>
    </body></html>"#;

    fn page_connection(html: &str) -> Connection {
        Connection {
            source: Source::Tableau,
            auth_type: AuthType::Public,
            session: Session::Page(PageSession {
                url: "https://public.tableau.com/views/Sales/Overview".into(),
                html: html.into(),
            }),
            metadata: Map::new(),
        }
    }

    #[test]
    fn test_raw_from_csv() {
        let raw = raw_from_csv("sales", "Region,Sales\nEast,10\n\nWest,20,extra\n").unwrap();
        assert_eq!(raw.tables[0]["headers"], json!(["Region", "Sales"]));
        assert_eq!(raw.tables[0]["rows"], json!([["East", "10"], ["West", "20", "extra"]]));
        assert_eq!(raw.components[0]["type"], "table");
        assert_eq!(raw.components[0]["name"], "sales");
    }

    #[test]
    fn test_raw_from_page_with_heuristic_kpis() {
        let raw = raw_from_page(&ScrapedPage::parse(PAGE), true);

        assert_eq!(raw.tables[0]["headers"], json!(["Region", "Sales"]));
        assert_eq!(raw.tables[0]["rows"], json!([["East", "10"]]));
        assert!(raw.kpis.as_array().unwrap().iter().any(|k| k["value"] == "Orders 42"));
        assert_eq!(raw.filters[0]["name"], "region");
        assert!(raw.html_text.as_deref().unwrap().contains("Orders 42"));

        let components = raw.components.as_array().unwrap();
        assert!(components.iter().any(|c| c["type"] == "layout"));
        // widgets have no type
        assert!(components.iter().any(|c| c.get("type").is_none() && c["id"] == "kpis"));
    }

    #[tokio::test]
    async fn test_public_adapter_uses_ocr_kpis() {
        let http = MockHttp {
            body: String::new(),
            urls: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        };
        let ocr = MockOcr(OcrResult::success("42".into(), vec![42.0]));
        let adapter = TableauPublicAdapter::new(Arc::new(http), Arc::new(ocr));
        let (params, state) = (ConnectionParams::default(), InteractiveState::new());

        let raw = adapter
            .extract(&page_connection(PAGE), AdapterRequest { params: &params, state: &state })
            .await
            .unwrap();

        assert_eq!(raw.kpis, json!([{"name": "kpi_1", "value": 42.0}]));
    }

    #[tokio::test]
    async fn test_public_adapter_refetches_with_selections() {
        let urls = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let http = MockHttp {
            body: PAGE.into(),
            urls: urls.clone(),
        };
        let adapter = TableauPublicAdapter::new(Arc::new(http), Arc::new(MockOcr(OcrResult::failed("down"))));
        let params = ConnectionParams::default();
        let mut state = InteractiveState::new();
        state.select_filter("region", json!(["East", "West"]));

        let raw = adapter
            .extract(&page_connection("<html></html>"), AdapterRequest { params: &params, state: &state })
            .await
            .unwrap();

        let urls = urls.lock().await;
        assert_eq!(urls.len(), 1);
        assert!(urls[0].contains("region=East%2CWest"));
        let components = raw.components.as_array().unwrap();
        assert!(components.iter().any(|c| c["original_type"] == "error"));
    }

    #[tokio::test]
    async fn test_api_adapter_requests_view_data_with_filters() {
        let urls = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let http = MockHttp {
            body: "Region,Sales\nEast,10\n".into(),
            urls: urls.clone(),
        };
        let adapter = TableauApiAdapter::new(Arc::new(http));
        let connection = Connection {
            source: Source::Tableau,
            auth_type: AuthType::Private,
            session: Session::Api(ApiSession {
                base_url: "https://tableau.example.com/api/3.21".into(),
                access_token: "tok".into(),
                workspace_id: None,
                report_id: None,
                site_id: Some("site".into()),
                view_id: Some("view".into()),
            }),
            metadata: Map::new(),
        };
        let params = ConnectionParams::default();
        let mut state = InteractiveState::new();
        state.select_filter("Region", json!("East"));

        let raw = adapter
            .extract(&connection, AdapterRequest { params: &params, state: &state })
            .await
            .unwrap();

        assert_eq!(
            urls.lock().await[0],
            "https://tableau.example.com/api/3.21/sites/site/views/view/data?vf_Region=East"
        );
        assert_eq!(raw.tables[0]["rows"], json!([["East", "10"]]));
    }
}
