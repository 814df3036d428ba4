//! Power BI adapters: the REST API for private reports and the embed page
//! for public ones. Both emit name-keyed containers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::apis::html::ScrapedPage;
use crate::apis::{ensure_success, ocr_error_component, powerbi_filter_expression, run_ocr, with_query_params};
use crate::app::ports::{AdapterPort, AdapterRequest, Connection, HttpClientPort, OcrPort, Session};
use crate::domain::DrillState;
use crate::error::{DashboardError, Result};
use crate::types::RawExtraction;

fn object_or_empty(value: Option<&Value>) -> Map<String, Value> {
    value.and_then(|v| v.as_object()).cloned().unwrap_or_default()
}

/// Wraps bare values of a name-keyed map so every entry is a record:
/// arrays become `options`, scalars become `value`.
fn keyed_records(value: Option<&Value>) -> Map<String, Value> {
    object_or_empty(value)
        .into_iter()
        .map(|(name, entry)| {
            let entry = match entry {
                Value::Object(_) => entry,
                Value::Array(options) => json!({ "options": options }),
                other => json!({ "value": other }),
            };
            (name, entry)
        })
        .collect()
}

/// Returns `name`, or `name_2`, `name_3`, ... when `components` already
/// holds it.
fn free_key(components: &Map<String, Value>, name: String) -> String {
    if !components.contains_key(&name) {
        return name;
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{}_{}", name, suffix);
        if !components.contains_key(&candidate) {
            warn!(name = %name, renamed = %candidate, "Duplicate component name");
            return candidate;
        }
        suffix += 1;
    }
}

/// Builds the raw extraction from a Power BI report payload.
///
/// `tables`, `filters`, `slicers` and `visuals` are objects keyed by name,
/// `kpis` is a list.
pub fn raw_from_report(report: &Value, drill_state: &DrillState) -> RawExtraction {
    let tables = object_or_empty(report.get("tables"));
    let kpis = report.get("kpis").and_then(|k| k.as_array()).cloned().unwrap_or_default();
    let visuals = object_or_empty(report.get("visuals"));
    let layout = report.get("layout").cloned().unwrap_or_else(|| json!({}));

    let filters = keyed_records(report.get("filters"));
    let slicers = keyed_records(report.get("slicers"));

    let mut components = Map::new();
    for (name, table) in &tables {
        let headers = table
            .get("fields")
            .or_else(|| table.get("headers"))
            .cloned()
            .unwrap_or_else(|| json!([]));
        let key = free_key(&components, name.clone());
        components.insert(
            key,
            json!({
                "type": "table",
                "fields": headers,
                "rows": table.get("rows").cloned().unwrap_or_else(|| json!([])),
            }),
        );
    }
    for (index, kpi) in kpis.iter().enumerate() {
        let name = kpi
            .get("name")
            .and_then(|n| n.as_str())
            .map(String::from)
            .unwrap_or_else(|| format!("kpi_{}", index + 1));
        let key = free_key(&components, name);
        components.insert(
            key,
            json!({
                "type": "kpi",
                "value": kpi.get("value").cloned().unwrap_or(Value::Null),
                "description": kpi.get("description").cloned().unwrap_or_else(|| json!("")),
            }),
        );
    }
    for (name, filter) in &filters {
        let mut component = filter.as_object().cloned().unwrap_or_default();
        component.insert("type".to_string(), json!("filter"));
        let key = free_key(&components, name.clone());
        components.insert(key, Value::Object(component));
    }
    for (name, visual) in &visuals {
        let key = free_key(&components, name.clone());
        components.insert(
            key,
            json!({
                "type": "visual",
                "visual_type": visual.get("type").cloned().unwrap_or(Value::Null),
                "fields": visual.get("fields").cloned().unwrap_or_else(|| json!([])),
                "metadata": visual.get("metadata").cloned().unwrap_or_else(|| json!({})),
            }),
        );
    }

    RawExtraction {
        tables: Value::Object(tables),
        kpis: Value::Array(kpis),
        filters: Value::Object(filters),
        slicers: Value::Object(slicers),
        visuals: Value::Object(visuals),
        layout,
        components: Value::Object(components),
        drill_state: Some(drill_state.clone()),
        ..RawExtraction::success()
    }
}

/// Builds the raw extraction from a rendered public report page.
pub fn raw_from_page(page: &ScrapedPage) -> RawExtraction {
    let mut tables = Map::new();
    let mut components = Map::new();

    for (index, table) in page.tables.iter().enumerate() {
        let name = format!("table_{}", index + 1);
        let rows: Vec<&Vec<String>> = table.body_rows.iter().filter(|r| !r.is_empty()).collect();
        tables.insert(name.clone(), json!({ "headers": table.header_cells, "rows": rows }));
        components.insert(
            name,
            json!({ "type": "table", "fields": table.header_cells, "rows": rows }),
        );
    }

    let mut filters = Map::new();
    let mut filter_index = 1;
    for select in &page.selects {
        let name = free_key(
            &components,
            select.name.clone().unwrap_or_else(|| format!("filter_{}", filter_index)),
        );
        filters.insert(name.clone(), json!({ "options": select.options }));
        components.insert(
            name,
            json!({ "type": "filter", "filter_type": "dropdown", "options": select.options }),
        );
        filter_index += 1;
    }
    for input in &page.inputs {
        let name = free_key(
            &components,
            input.name.clone().unwrap_or_else(|| format!("filter_{}", filter_index)),
        );
        filters.insert(name.clone(), json!({ "value": input.value, "type": input.input_type }));
        components.insert(
            name,
            json!({ "type": "filter", "filter_type": input.input_type, "value": input.value }),
        );
        filter_index += 1;
    }

    let mut visuals = Map::new();
    let mut visual_index = 1;
    for image in &page.images {
        let name = free_key(
            &components,
            image
                .alt
                .clone()
                .or_else(|| image.src.clone())
                .unwrap_or_else(|| format!("visual_{}", visual_index)),
        );
        visuals.insert(name.clone(), json!({ "type": "image", "src": image.src, "alt": image.alt }));
        components.insert(
            name,
            json!({ "type": "visual", "visual_type": "image", "src": image.src, "alt": image.alt }),
        );
        visual_index += 1;
    }
    for svg in &page.svgs {
        let name = free_key(&components, format!("svg_{}", visual_index));
        visuals.insert(name.clone(), json!({ "type": "svg", "content": svg }));
        components.insert(name, json!({ "type": "visual", "visual_type": "svg", "content": svg }));
        visual_index += 1;
    }

    let sections: Vec<Value> = page
        .sections
        .iter()
        .filter_map(|s| s.label())
        .map(Value::String)
        .collect();

    RawExtraction {
        tables: Value::Object(tables),
        kpis: json!([]),
        filters: Value::Object(filters),
        visuals: Value::Object(visuals),
        layout: json!({ "sections": sections }),
        components: Value::Object(components),
        ..RawExtraction::success()
    }
}

/// Appends OCR-read numbers as `kpi_N` KPIs, or the OCR placeholder when
/// the read failed.
fn merge_ocr_kpis(raw: &mut RawExtraction, numbers: Result<Vec<f64>>) {
    let Value::Object(components) = &mut raw.components else {
        return;
    };
    match numbers {
        Ok(numbers) => {
            let kpis: Vec<Value> = numbers
                .iter()
                .enumerate()
                .map(|(index, number)| {
                    let name = free_key(components, format!("kpi_{}", index + 1));
                    components.insert(name.clone(), json!({ "type": "kpi", "value": number }));
                    json!({ "name": name, "value": number })
                })
                .collect();
            raw.kpis = Value::Array(kpis);
        }
        Err(err) => {
            components.insert("ocr_error".to_string(), ocr_error_component(&err.message()));
        }
    }
}

pub struct PowerBiApiAdapter {
    http: Arc<dyn HttpClientPort>,
}

impl PowerBiApiAdapter {
    pub fn new(http: Arc<dyn HttpClientPort>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl AdapterPort for PowerBiApiAdapter {
    #[instrument(skip(self, connection, request))]
    async fn extract(&self, connection: &Connection, request: AdapterRequest<'_>) -> Result<RawExtraction> {
        let Session::Api(api) = &connection.session else {
            return Err(DashboardError::Extraction("Power BI API adapter needs an API session".into()));
        };
        let report_id = api
            .report_id
            .as_deref()
            .ok_or_else(|| DashboardError::Connection("report_id is required".into()))?;

        let base = api.base_url.trim_end_matches('/');
        let url = match api.workspace_id.as_deref() {
            Some(workspace) => format!("{}/v1.0/myorg/groups/{}/reports/{}", base, workspace, report_id),
            None => format!("{}/v1.0/myorg/reports/{}", base, report_id),
        };
        let query: Vec<(String, String)> = powerbi_filter_expression(&request.state.selections())
            .map(|expr| vec![("filter".to_string(), expr)])
            .unwrap_or_default();
        let url = with_query_params(&url, &query)?;

        debug!(%url, "Fetching Power BI report");
        let headers = vec![("Authorization".to_string(), format!("Bearer {}", api.access_token))];
        let response = self.http.get(&url, &headers).await?;
        ensure_success(&response, "Power BI report API")?;
        let report: Value = serde_json::from_slice(&response.bytes)?;

        let raw = raw_from_report(&report, &request.state.drill_state);
        info!(report_id, "Fetched Power BI report");
        Ok(raw)
    }
}

pub struct PowerBiPublicAdapter {
    http: Arc<dyn HttpClientPort>,
    ocr: Arc<dyn OcrPort>,
}

impl PowerBiPublicAdapter {
    pub fn new(http: Arc<dyn HttpClientPort>, ocr: Arc<dyn OcrPort>) -> Self {
        Self { http, ocr }
    }
}

#[async_trait]
impl AdapterPort for PowerBiPublicAdapter {
    #[instrument(skip(self, connection, request))]
    async fn extract(&self, connection: &Connection, request: AdapterRequest<'_>) -> Result<RawExtraction> {
        let Session::Page(page) = &connection.session else {
            return Err(DashboardError::Extraction("Power BI public adapter needs a page session".into()));
        };

        // Selections ride along as a URL filter, which means a fresh page.
        let (url, html) = match powerbi_filter_expression(&request.state.selections()) {
            Some(expr) => {
                let url = with_query_params(&page.url, &[("filter".to_string(), expr)])?;
                debug!(%url, "Refetching Power BI page with selections");
                let response = self.http.get(&url, &[]).await?;
                ensure_success(&response, "Power BI page")?;
                (url, response.text())
            }
            None => (page.url.clone(), page.html.clone()),
        };

        let scraped = ScrapedPage::parse(&html);
        let mut raw = raw_from_page(&scraped);

        if request.params.use_ocr {
            let ocr = run_ocr(self.ocr.as_ref(), &url).await;
            let numbers = if ocr.is_success() {
                Ok(ocr.numbers)
            } else {
                Err(DashboardError::Extraction(ocr.error.unwrap_or_else(|| "OCR failed".into())))
            };
            merge_ocr_kpis(&mut raw, numbers);
        }

        raw.drill_state = Some(request.state.drill_state.clone());
        info!(
            tables = scraped.tables.len(),
            filters = scraped.selects.len() + scraped.inputs.len(),
            "Parsed Power BI public page"
        );
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{ApiSession, HttpGetResult, PageSession};
    use crate::domain::{AuthType, InteractiveState, Source};
    use crate::types::{ConnectionParams, OcrResult};

    struct MockHttp {
        status: u16,
        body: String,
        pub requests: Arc<tokio::sync::Mutex<Vec<(String, Vec<(String, String)>)>>>,
    }

    #[async_trait]
    impl HttpClientPort for MockHttp {
        async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpGetResult> {
            self.requests.lock().await.push((url.to_string(), headers.to_vec()));
            Ok(HttpGetResult {
                status: self.status,
                bytes: self.body.clone().into_bytes(),
                content_type: "application/json".into(),
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

    fn api_connection(workspace: Option<&str>) -> Connection {
        Connection {
            source: Source::PowerBi,
            auth_type: AuthType::Private,
            session: Session::Api(ApiSession {
                base_url: "https://api.powerbi.com".into(),
                access_token: "tok".into(),
                workspace_id: workspace.map(String::from),
                report_id: Some("r1".into()),
                site_id: None,
                view_id: None,
            }),
            metadata: Map::new(),
        }
    }

    fn page_connection(html: &str) -> Connection {
        Connection {
            source: Source::PowerBi,
            auth_type: AuthType::Public,
            session: Session::Page(PageSession {
                url: "https://app.powerbi.com/view?r=abc".into(),
                html: html.into(),
            }),
            metadata: Map::new(),
        }
    }

    #[test]
    fn test_raw_from_report_builds_named_components() {
        let report = json!({
            "tables": {"Sales": {"fields": ["Region", "Amount"], "rows": [["East", 10]]}},
            "kpis": [{"name": "Total", "value": 10, "description": "sum"}, {"value": 3}],
            "filters": {"Region": ["East", "West"], "Year": 2024},
            "slicers": {"Quarter": ["Q1", "Q2"]},
            "visuals": {"Trend": {"type": "lineChart", "fields": ["Month"]}},
            "layout": {"pages": 1}
        });
        let raw = raw_from_report(&report, &DrillState::new());

        let components = raw.components.as_object().unwrap();
        assert_eq!(components["Sales"]["type"], "table");
        assert_eq!(components["Total"]["description"], "sum");
        assert_eq!(components["kpi_2"]["value"], 3);
        assert_eq!(components["Trend"]["visual_type"], "lineChart");
        assert_eq!(components["Region"]["options"], json!(["East", "West"]));
        assert_eq!(raw.filters["Year"], json!({"value": 2024}));
        assert_eq!(raw.slicers["Quarter"], json!({"options": ["Q1", "Q2"]}));
        assert_eq!(raw.layout, json!({"pages": 1}));
    }

    #[test]
    fn test_shared_names_do_not_overwrite_components() {
        let report = json!({
            "tables": {"Sales": {"fields": ["Region"], "rows": []}},
            "visuals": {"Sales": {"type": "barChart"}}
        });
        let raw = raw_from_report(&report, &DrillState::new());
        let components = raw.components.as_object().unwrap();
        assert_eq!(components["Sales"]["type"], "table");
        assert_eq!(components["Sales_2"]["visual_type"], "barChart");

        let page = ScrapedPage::parse(
            r#"<html><body><img src="a.png" alt="Chart"><img src="b.png" alt="Chart"></body></html>"#,
        );
        let raw = raw_from_page(&page);
        assert_eq!(raw.visuals["Chart"]["src"], "a.png");
        assert_eq!(raw.visuals["Chart_2"]["src"], "b.png");
        assert_eq!(raw.components.as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_api_adapter_sends_token_and_filter() {
        let requests = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let http = MockHttp {
            status: 200,
            body: json!({"tables": {}, "filters": {"Region": ["East"]}}).to_string(),
            requests: requests.clone(),
        };
        let adapter = PowerBiApiAdapter::new(Arc::new(http));
        let mut state = InteractiveState::new();
        state.select_filter("Region", json!("East"));
        let params = ConnectionParams::default();

        let raw = adapter
            .extract(&api_connection(Some("ws")), AdapterRequest { params: &params, state: &state })
            .await
            .unwrap();

        assert!(raw.filters.get("Region").is_some());
        let recorded = requests.lock().await;
        let (url, headers) = &recorded[0];
        assert!(url.starts_with("https://api.powerbi.com/v1.0/myorg/groups/ws/reports/r1?filter="));
        assert_eq!(headers[0], ("Authorization".to_string(), "Bearer tok".to_string()));
    }

    #[tokio::test]
    async fn test_api_adapter_maps_unauthorized_to_connection_error() {
        let http = MockHttp {
            status: 401,
            body: String::new(),
            requests: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        };
        let adapter = PowerBiApiAdapter::new(Arc::new(http));
        let (params, state) = (ConnectionParams::default(), InteractiveState::new());

        let err = adapter
            .extract(&api_connection(None), AdapterRequest { params: &params, state: &state })
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::Connection(_)));
    }

    #[tokio::test]
    async fn test_public_adapter_parses_page_and_ocr() {
        let html = r#"<html><body>
            <table><tr><th>Region</th><th>Sales</th></tr><tr><td>East</td><td>100</td></tr></table>
            <select name="region"><option>East</option></select>
            <input type="text" value="2024">
            <img src="trend.png">
        </body></html>"#;
        let http = MockHttp {
            status: 200,
            body: String::new(),
            requests: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        };
        let ocr = MockOcr(OcrResult::success("Revenue 1,200".into(), vec![1200.0]));
        let adapter = PowerBiPublicAdapter::new(Arc::new(http), Arc::new(ocr));
        let (params, state) = (ConnectionParams::for_url("https://app.powerbi.com/view?r=abc"), InteractiveState::new());

        let raw = adapter
            .extract(&page_connection(html), AdapterRequest { params: &params, state: &state })
            .await
            .unwrap();

        let components = raw.components.as_object().unwrap();
        assert_eq!(components["table_1"]["fields"], json!(["Region", "Sales"]));
        assert_eq!(components["table_1"]["rows"], json!([["East", "100"]]));
        assert_eq!(components["region"]["filter_type"], "dropdown");
        assert_eq!(components["filter_2"]["filter_type"], "text");
        assert_eq!(components["trend.png"]["visual_type"], "image");
        assert_eq!(components["kpi_1"]["value"], 1200.0);
        assert_eq!(raw.kpis, json!([{"name": "kpi_1", "value": 1200.0}]));
    }

    #[tokio::test]
    async fn test_public_adapter_degrades_on_ocr_failure() {
        let http = MockHttp {
            status: 200,
            body: String::new(),
            requests: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        };
        let ocr = MockOcr(OcrResult::failed("engine unavailable"));
        let adapter = PowerBiPublicAdapter::new(Arc::new(http), Arc::new(ocr));
        let (params, state) = (ConnectionParams::default(), InteractiveState::new());

        let raw = adapter
            .extract(&page_connection("<html></html>"), AdapterRequest { params: &params, state: &state })
            .await
            .unwrap();

        assert_eq!(raw.components["ocr_error"]["original_type"], "error");
        assert!(raw.components["ocr_error"]["message"].as_str().unwrap().contains("engine unavailable"));
    }

    #[tokio::test]
    async fn test_public_adapter_refetches_with_selections() {
        let requests = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let http = MockHttp {
            status: 200,
            body: "<html><select name='region'><option>East</option></select></html>".into(),
            requests: requests.clone(),
        };
        let ocr = MockOcr(OcrResult::failed("unused"));
        let adapter = PowerBiPublicAdapter::new(Arc::new(http), Arc::new(ocr));
        let mut params = ConnectionParams::default();
        params.use_ocr = false;
        let mut state = InteractiveState::new();
        state.select_filter("region", json!("East"));

        let raw = adapter
            .extract(&page_connection("<html></html>"), AdapterRequest { params: &params, state: &state })
            .await
            .unwrap();

        assert_eq!(requests.lock().await.len(), 1);
        assert!(raw.filters.get("region").is_some());
        assert!(raw.components.get("ocr_error").is_none());
    }
}
