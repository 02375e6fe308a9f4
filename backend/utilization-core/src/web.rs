// src/web.rs
use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::forecast_message::{evaluate, ForecastMessage};
use crate::loader::ReportInputs;
use crate::render::{chart_svg, html_table};
use crate::utilization::{ForecastMethod, UtilizationError, UtilizationReport};
use crate::AppError;

const NAME_PLACEHOLDER: &str = "Please select your name";

#[derive(Clone)]
pub struct AppState {
    pub inputs: Arc<ReportInputs>,
    pub default_target: u32,
}

impl AppState {
    pub fn new(inputs: ReportInputs, default_target: u32) -> Self {
        Self {
            inputs: Arc::new(inputs),
            default_target,
        }
    }
}

/// A built report together with the year-end prediction and the message for it.
#[derive(Debug, Clone, Serialize)]
pub struct ReportView {
    pub report: UtilizationReport,
    pub target: u32,
    pub predicted_utilization: Decimal,
    pub message: Option<ForecastMessage>,
    pub message_text: Option<String>,
}

impl ReportView {
    pub fn build(
        inputs: &ReportInputs,
        employee: &str,
        method: ForecastMethod,
        target: u32,
    ) -> Result<Self, UtilizationError> {
        let report = inputs.build_report(employee, method)?;
        let predicted_utilization = report.predicted_utilization_percent();
        let message = evaluate(predicted_utilization, target);
        Ok(Self {
            report,
            target,
            predicted_utilization,
            message_text: message.as_ref().map(ToString::to_string),
            message,
        })
    }
}

// --- Request Parameters ---

#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    pub name: Option<String>,
    pub method: Option<String>,
    pub target: Option<String>,
    pub show_data: Option<String>,
}

impl ReportParams {
    fn employee(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    fn method(&self) -> Result<ForecastMethod, AppError> {
        match self.method.as_deref() {
            None | Some("") => Ok(ForecastMethod::default()),
            Some(value) => Ok(value.parse()?),
        }
    }

    /// A cleared form field arrives as an empty value and means "use the default".
    fn target(&self, default_target: u32) -> Result<u32, AppError> {
        let target = match self.target.as_deref().map(str::trim) {
            None | Some("") => default_target,
            Some(value) => value.parse().map_err(|_| AppError::InvalidParameter {
                name: "target",
                value: value.to_string(),
            })?,
        };
        match target {
            target if target <= 100 => Ok(target),
            target => Err(AppError::InvalidTarget(target)),
        }
    }

    fn show_data(&self) -> bool {
        matches!(self.show_data.as_deref(), Some("on") | Some("true") | Some("1"))
    }
}

// --- Router ---

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/employees", get(handle_api_employees))
        .route("/utilization", get(handle_api_utilization));
    Router::new()
        .route("/", get(handle_index))
        .route("/status", get(handle_status))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    employees: usize,
    time_entries: usize,
}

async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        employees: state.inputs.roster.len(),
        time_entries: state.inputs.entries.len(),
    })
}

async fn handle_api_employees(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.inputs.roster.names().to_vec())
}

async fn handle_api_utilization(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Json<ReportView>, AppError> {
    let employee = params
        .employee()
        .ok_or(AppError::MissingParameter("name"))?;
    let method = params.method()?;
    let target = params.target(state.default_target)?;
    info!(
        "Handling /api/utilization for '{}' ({}, target {}%)",
        employee, method, target
    );
    let view = ReportView::build(&state.inputs, employee, method, target)?;
    Ok(Json(view))
}

async fn handle_index(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Html<String>, AppError> {
    let method = params.method()?;
    let target = params.target(state.default_target)?;
    let employee = params.employee();

    let report_section = match employee {
        Some(employee) => {
            info!("Rendering report page for '{}' ({})", employee, method);
            let view = ReportView::build(&state.inputs, employee, method, target)?;
            render_report_section(&view, params.show_data())
        }
        None => String::new(),
    };

    Ok(Html(format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Utilization Report</title>\
         <style>{}</style></head><body>\n<h1>Utilization Report</h1>\n{}{}</body></html>\n",
        PAGE_STYLE,
        render_form(&state, employee, method, target, params.show_data()),
        report_section
    )))
}

const PAGE_STYLE: &str = "body{font-family:Tahoma,sans-serif;max-width:960px;margin:2em auto;color:#333}\
label{display:block;margin:.6em 0}\
.success{background:#e3f4ea;color:#006040;padding:.8em}\
.warning{background:#fff4e0;color:#8a5300;padding:.8em}\
table.utilization{border-collapse:collapse}\
table.utilization td,table.utilization th{padding:.3em .7em;text-align:right;border-bottom:1px solid #ddd}\
tr.current{font-weight:bold}";

fn render_form(
    state: &AppState,
    selected: Option<&str>,
    method: ForecastMethod,
    target: u32,
    show_data: bool,
) -> String {
    let mut names = format!("<option value=\"\">{}</option>", NAME_PLACEHOLDER);
    for name in state.inputs.roster.names() {
        let attr = if Some(name.as_str()) == selected { " selected" } else { "" };
        names.push_str(&format!(
            "<option value=\"{0}\"{1}>{0}</option>",
            escape_html(name),
            attr
        ));
    }

    let mut methods = String::new();
    for m in ForecastMethod::ALL {
        let attr = if m == method { " selected" } else { "" };
        methods.push_str(&format!("<option{}>{}</option>", attr, m));
    }

    format!(
        "<form method=\"get\" action=\"/\">\n\
         <label>Who are you? <select name=\"name\">{}</select></label>\n\
         <label>What's your target utilization? \
         <input type=\"number\" name=\"target\" min=\"0\" max=\"100\" value=\"{}\"></label>\n\
         <label>I would like to change how you predict my utilization. Use my utilization from: \
         <select name=\"method\">{}</select></label>\n\
         <label><input type=\"checkbox\" name=\"show_data\"{}> Show data</label>\n\
         <button type=\"submit\">Update</button>\n</form>\n",
        names,
        target,
        methods,
        if show_data { " checked" } else { "" }
    )
}

fn render_report_section(view: &ReportView, show_data: bool) -> String {
    let mut section = String::from("<section class=\"report\">\n");
    section.push_str(&chart_svg(&view.report, view.target));
    if let (Some(message), Some(text)) = (&view.message, &view.message_text) {
        let class = if message.is_success() { "success" } else { "warning" };
        section.push_str(&format!("<p class=\"{}\">{}</p>\n", class, escape_html(text)));
    }
    if show_data {
        section.push_str("<h2>Utilization Data</h2>\n");
        section.push_str(&html_table(&view.report));
    }
    section.push_str("</section>\n");
    section
}

pub fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiscal_calendar::{FiscalCalendar, FiscalMonth};
    use crate::time_entries::{ActivityTable, Roster, TimeEntry};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::NaiveDate;
    use http_body_util::BodyExt;
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn test_inputs() -> ReportInputs {
        let mut dates: Vec<(NaiveDate, u32)> = (4..=12).map(|m| (d(2021, m, 1), 20)).collect();
        dates.extend((1..=3).map(|m| (d(2022, m, 1), 20)));
        dates.push((d(2021, 5, 24), 5));

        let entry = |name: &str, date, activity: &str, hours| {
            TimeEntry::from_export(name, date, activity, hours, Decimal::ZERO, "")
        };

        ReportInputs {
            entries: vec![
                entry("Dana", d(2021, 4, 12), "Client Work", dec!(80)),
                entry("Dana", d(2021, 5, 24), "Client Work", dec!(120)),
                entry("Ida", d(2021, 5, 24), "Admin", dec!(8)),
            ],
            activities: ActivityTable::from_pairs(vec![
                ("Client Work", "Billable"),
                ("Admin", "Overhead"),
            ]),
            calendar: FiscalCalendar::from_dates(dates),
            roster: Roster::from_names(vec!["Dana", "Ida"]),
        }
    }

    fn app() -> Router {
        router(AppState::new(test_inputs(), 0))
    }

    async fn get(uri: &str) -> (StatusCode, String) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn report_view_evaluates_message() {
        let view =
            ReportView::build(&test_inputs(), "Dana", ForecastMethod::MonthToDate, 95).unwrap();
        assert_eq!(view.report.current_month, FiscalMonth::May);
        assert_eq!(view.predicted_utilization, view.report.predicted_utilization_percent());
        assert!(matches!(view.message, Some(ForecastMessage::Behind { .. })));
        assert!(view
            .message_text
            .unwrap()
            .starts_with("You're on track to miss your target by"));
    }

    #[test]
    fn escape_html_escapes_markup() {
        assert_eq!(
            escape_html("<b>\"O'Neil\" & co</b>"),
            "&lt;b&gt;&quot;O&#39;Neil&quot; &amp; co&lt;/b&gt;"
        );
    }

    #[tokio::test]
    async fn status_reports_loaded_data() {
        let (status, body) = get("/status").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["employees"], 2);
        assert_eq!(json["time_entries"], 3);
    }

    #[tokio::test]
    async fn employees_lists_roster() {
        let (status, body) = get("/api/employees").await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<String> = serde_json::from_str(&body).unwrap();
        assert_eq!(names, vec!["Dana".to_string(), "Ida".to_string()]);
    }

    #[tokio::test]
    async fn utilization_api_returns_report() {
        let (status, body) =
            get("/api/utilization?name=Dana&method=Last%20Month&target=50").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["report"]["method"], "Last Month");
        assert_eq!(json["report"]["current_month"], "May");
        assert_eq!(json["report"]["rows"].as_array().unwrap().len(), 12);
        assert_eq!(json["message"]["outcome"], "on_track");
    }

    #[tokio::test]
    async fn utilization_api_rejects_unknown_method() {
        let (status, _) = get("/api/utilization?name=Dana&method=Gut%20Feeling").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn utilization_api_rejects_out_of_range_target() {
        let (status, _) = get("/api/utilization?name=Dana&target=150").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn index_with_cleared_target_uses_default() {
        let (status, body) = get("/?name=Dana&target=&method=Month%20to%20Date").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<svg"));
        assert!(body.contains("name=\"target\" min=\"0\" max=\"100\" value=\"0\""));
    }

    #[tokio::test]
    async fn utilization_api_rejects_non_numeric_target() {
        let (status, body) = get("/api/utilization?name=Dana&target=lots").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Invalid value for parameter"));
    }

    #[tokio::test]
    async fn utilization_api_requires_name() {
        let (status, _) = get("/api/utilization").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn utilization_api_missing_data_is_not_found() {
        let (status, _) = get("/api/utilization?name=Ida").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn index_without_name_shows_form_only() {
        let (status, body) = get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(NAME_PLACEHOLDER));
        assert!(body.contains("<option value=\"Dana\">Dana</option>"));
        assert!(!body.contains("<svg"));
    }

    #[tokio::test]
    async fn index_with_name_renders_chart_message_and_table() {
        let (status, body) = get("/?name=Dana&target=99&method=Year%20to%20Date&show_data=on").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<svg"));
        assert!(body.contains("class=\"warning\""));
        assert!(body.contains("<h2>Utilization Data</h2>"));
        assert!(body.contains("<option selected>Year to Date</option>"));
        assert!(body.contains("<option value=\"Dana\" selected>Dana</option>"));
    }
}
