use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::jobs::{JobStatus, ReportRunner};
use crate::report::report_file_name;

pub struct AppState {
    pub runner: Arc<ReportRunner>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct TriggerResponse {
    pub report_id: String,
}

fn error_response(status: StatusCode, error: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

pub async fn root() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "Store Monitoring System API".to_string(),
    })
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}

/// Start a report over the currently cached data
pub async fn trigger_report(State(state): State<Arc<AppState>>) -> Json<TriggerResponse> {
    let id = state.runner.trigger();
    Json(TriggerResponse {
        report_id: id.to_string(),
    })
}

/// Report status, or the CSV itself once complete
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(report_id): Path<String>,
) -> Response {
    // Braced and urn forms parse too; the canonical id names the file
    let found = Uuid::parse_str(&report_id).ok().and_then(|id| {
        state
            .runner
            .registry()
            .status(&id)
            .map(|status| (id, status))
    });

    let Some((id, status)) = found else {
        return error_response(StatusCode::NOT_FOUND, "Report ID not found");
    };

    let path = match status {
        JobStatus::Complete { path } => path,
        other => return Json(other).into_response(),
    };

    match tokio::fs::read(&path).await {
        Ok(body) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", report_file_name(&id.to_string())),
                ),
            ],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(
                report_id = %id,
                "Report file {} unreadable: {}",
                path.display(),
                e
            );
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Report completed but file not found",
            )
        }
    }
}
