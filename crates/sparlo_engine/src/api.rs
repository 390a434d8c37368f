use reqwest::Method;
use serde_json::{json, Value};
use sparlo_core::{CreatedReport, ReportId, ReportRecord, Subscription, UsageSnapshot};
use sparlo_logging::{sparlo_debug, sparlo_warn};

use crate::client::{ApiAuth, HttpClient};
use crate::{ApiError, FailureKind};

/// Report and account endpoints of the backend.
#[async_trait::async_trait]
pub trait ReportApi: Send + Sync {
    async fn list_reports(&self) -> Result<Vec<ReportRecord>, ApiError>;
    async fn get_report(&self, report_id: &str) -> Result<ReportRecord, ApiError>;
    /// Starts a new report and returns its id; generation continues server-side.
    async fn create_report(&self, design_challenge: &str) -> Result<ReportId, ApiError>;
    async fn archive_report(&self, report_id: &str) -> Result<(), ApiError>;
    async fn cancel_report(&self, report_id: &str) -> Result<(), ApiError>;
    async fn check_usage(&self) -> Result<UsageSnapshot, ApiError>;
    async fn subscription(&self) -> Result<Subscription, ApiError>;
}

/// Decodes a report list row by row, a bare array or `{ "reports": [...] }`.
///
/// Rows that do not decode are logged and left out.
fn decode_report_list(body: Value) -> Result<Vec<ReportRecord>, ApiError> {
    let rows = match body {
        Value::Array(rows) => rows,
        Value::Object(mut wrapper) => match wrapper.remove("reports") {
            Some(Value::Array(rows)) => rows,
            _ => return Err(not_a_list()),
        },
        _ => return Err(not_a_list()),
    };

    let total = rows.len();
    let reports: Vec<ReportRecord> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let id = row.get("id").and_then(Value::as_str).map(str::to_string);
            match serde_json::from_value::<ReportRecord>(row) {
                Ok(record) => Some(record),
                Err(err) => {
                    sparlo_warn!(
                        "Skipping report row {} (id {:?}): {}",
                        index,
                        id.as_deref().unwrap_or("?"),
                        err
                    );
                    None
                }
            }
        })
        .collect();
    if reports.len() < total {
        sparlo_warn!("Kept {} of {} report rows", reports.len(), total);
    }
    Ok(reports)
}

fn not_a_list() -> ApiError {
    ApiError::new(
        FailureKind::Decode,
        "expected a report array or an object with a \"reports\" array",
    )
}

/// The benchmark status body leaves out the id and may leave out the
/// creation time; both are filled in before decoding.
fn decode_benchmark_status(report_id: &str, mut body: Value) -> Result<ReportRecord, ApiError> {
    if let Value::Object(fields) = &mut body {
        fields
            .entry("id")
            .or_insert_with(|| Value::String(report_id.to_string()));
        if !fields.contains_key("createdAt") && !fields.contains_key("created_at") {
            fields.insert(
                "createdAt".to_string(),
                Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
    }
    serde_json::from_value(body).map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
}

#[derive(Debug, Clone)]
pub struct ReqwestReportApi {
    http: HttpClient,
}

impl ReqwestReportApi {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn post_action(&self, report_id: &str, action: &str) -> Result<(), ApiError> {
        let url = self.http.endpoint(&["api", "reports", report_id, action])?;
        sparlo_debug!("POST {}", url);
        self.http
            .send_unit(self.http.request(Method::POST, url))
            .await
    }
}

#[async_trait::async_trait]
impl ReportApi for ReqwestReportApi {
    async fn list_reports(&self) -> Result<Vec<ReportRecord>, ApiError> {
        let url = self.http.endpoint(&["api", "reports"])?;
        let body: Value = self
            .http
            .send_json(self.http.request(Method::GET, url))
            .await?;
        decode_report_list(body)
    }

    /// A benchmark key only opens the benchmark status endpoint, so reports are
    /// read from there when that is the configured auth.
    async fn get_report(&self, report_id: &str) -> Result<ReportRecord, ApiError> {
        if matches!(self.http.settings().auth, ApiAuth::BenchmarkKey(_)) {
            let url = self
                .http
                .endpoint(&["api", "benchmark", "reports", report_id])?;
            sparlo_debug!("GET {}", url);
            let body: Value = self
                .http
                .send_json(self.http.request(Method::GET, url))
                .await?;
            return decode_benchmark_status(report_id, body);
        }

        let url = self.http.endpoint(&["api", "reports", report_id])?;
        self.http
            .send_json(self.http.request(Method::GET, url))
            .await
    }

    async fn create_report(&self, design_challenge: &str) -> Result<ReportId, ApiError> {
        let url = self.http.endpoint(&["api", "benchmark", "reports"])?;
        let created: CreatedReport = self
            .http
            .send_json(
                self.http
                    .request(Method::POST, url)
                    .json(&json!({ "designChallenge": design_challenge })),
            )
            .await?;
        Ok(created.report_id)
    }

    async fn archive_report(&self, report_id: &str) -> Result<(), ApiError> {
        self.post_action(report_id, "archive").await
    }

    async fn cancel_report(&self, report_id: &str) -> Result<(), ApiError> {
        self.post_action(report_id, "cancel").await
    }

    async fn check_usage(&self) -> Result<UsageSnapshot, ApiError> {
        let url = self.http.endpoint(&["api", "usage"])?;
        self.http
            .send_json(self.http.request(Method::GET, url))
            .await
    }

    async fn subscription(&self) -> Result<Subscription, ApiError> {
        let url = self.http.endpoint(&["api", "billing", "subscription"])?;
        self.http
            .send_json(self.http.request(Method::GET, url))
            .await
    }
}
