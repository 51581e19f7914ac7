use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::activity::{ActivityKind, ActivityLevel};
use crate::error::{ServiceError, ServiceResult};
use crate::export::{export, ExportedReport, ReportConfig, ReportFormat};
use crate::result::TestResult;
use crate::state::SharedState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub format: Option<String>,
    pub title: Option<String>,
    pub company_name: Option<String>,
    pub logo: Option<String>,
    pub include_charts: Option<bool>,
    pub white_label: Option<bool>,
}

impl ReportQuery {
    fn format_or(&self, default: ReportFormat) -> ServiceResult<ReportFormat> {
        match self.format.as_deref() {
            Some(f) if !f.trim().is_empty() => f.parse(),
            _ => Ok(default),
        }
    }

    fn config(&self) -> ReportConfig {
        ReportConfig {
            title: self.title.clone(),
            company_name: self.company_name.clone(),
            logo: self.logo.clone(),
            include_charts: self.include_charts,
            white_label: self.white_label,
        }
    }
}

#[derive(Deserialize)]
pub struct ExportRequest {
    pub result: TestResult,
    pub format: String,
    #[serde(default)]
    pub config: Option<ReportConfig>,
}

enum Disposition {
    Inline,
    Attachment,
}

fn document_response(report: ExportedReport, disposition: Disposition) -> Response {
    let kind = match disposition {
        Disposition::Inline => "inline",
        Disposition::Attachment => "attachment",
    };
    (
        [
            (header::CONTENT_TYPE, report.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("{}; filename=\"{}\"", kind, report.file_name),
            ),
        ],
        report.bytes,
    )
        .into_response()
}

async fn render_stored(
    state: &SharedState,
    id: &str,
    query: &ReportQuery,
    default_format: ReportFormat,
) -> ServiceResult<ExportedReport> {
    let format = query.format_or(default_format)?;
    let job = state
        .store
        .get(id)?
        .ok_or_else(|| ServiceError::NotFound(format!("Test {}", id)))?;

    let defaults = state.settings.read().await.report.clone();
    let config = query.config().merged_over(&defaults);
    let report = export(&job.results, format, &config)?;

    state
        .activity
        .record(
            ActivityKind::Exported,
            ActivityLevel::Info,
            Some(id),
            format!("Exported {} report ({} bytes)", format, report.bytes.len()),
        )
        .await;
    Ok(report)
}

/// GET /api/reports/{id}: render a stored job's report inline (html by default).
pub async fn view_report(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> ServiceResult<Response> {
    let report = render_stored(&state, &id, &query, ReportFormat::Html).await?;
    Ok(document_response(report, Disposition::Inline))
}

/// GET /api/reports/{id}/download: same document as an attachment (pdf by default).
pub async fn download_report(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> ServiceResult<Response> {
    let report = render_stored(&state, &id, &query, ReportFormat::Pdf).await?;
    Ok(document_response(report, Disposition::Attachment))
}

/// POST /api/reports/export: render an arbitrary result.
pub async fn export_report(
    State(state): State<SharedState>,
    body: Result<Json<ExportRequest>, JsonRejection>,
) -> ServiceResult<Response> {
    let Json(request) =
        body.map_err(|e| ServiceError::Validation(format!("Invalid export request: {}", e)))?;
    let format: ReportFormat = request.format.parse()?;

    let defaults = state.settings.read().await.report.clone();
    let config = request.config.unwrap_or_default().merged_over(&defaults);
    let result = request.result.normalized();
    let report = export(&result, format, &config)?;

    state
        .activity
        .record(
            ActivityKind::Exported,
            ActivityLevel::Info,
            None,
            format!("Exported ad-hoc {} report", format),
        )
        .await;
    Ok(document_response(report, Disposition::Attachment))
}
