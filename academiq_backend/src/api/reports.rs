use super::{ApiError, ApiResult, AppState, CurrentUser};
use crate::moderation::{ReportService, ReportTarget, ReportView, ReportedItems};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileReportRequest {
    #[serde(default)]
    post_id: Option<String>,
    #[serde(default)]
    comment_id: Option<String>,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CheckReportResponse {
    has_reported: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ClearReportsResponse {
    cleared: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeleteReportedResponse {
    deleted: usize,
}

pub(crate) async fn file_report(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    payload: Result<Json<FileReportRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ReportView>), ApiError> {
    let Json(payload) = payload?;
    let target = ReportTarget {
        post_id: payload.post_id,
        comment_id: payload.comment_id,
    };
    let service = ReportService::new(state.database.clone());
    let report = service.file_report(&session.user_id, target, &payload.reason)?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub(crate) async fn check_report(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    payload: Result<Json<ReportTarget>, JsonRejection>,
) -> ApiResult<CheckReportResponse> {
    let Json(target) = payload?;
    let service = ReportService::new(state.database.clone());
    let has_reported = service.check_reported(&session.user_id, &target)?;
    Ok(Json(CheckReportResponse { has_reported }))
}

pub(crate) async fn list_reports(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> ApiResult<ReportedItems> {
    let service = ReportService::new(state.database.clone());
    Ok(Json(service.list_reported_items(&session)?))
}

pub(crate) async fn clear_reports(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    payload: Result<Json<ReportTarget>, JsonRejection>,
) -> ApiResult<ClearReportsResponse> {
    let Json(target) = payload?;
    let service = ReportService::new(state.database.clone());
    let cleared = service.clear_reports(&session, &target)?;
    Ok(Json(ClearReportsResponse { cleared }))
}

pub(crate) async fn delete_reported_item(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    payload: Result<Json<ReportTarget>, JsonRejection>,
) -> ApiResult<DeleteReportedResponse> {
    let Json(target) = payload?;
    let service = ReportService::new(state.database.clone());
    let deleted = service.delete_reported_item(&session, &target)?;
    Ok(Json(DeleteReportedResponse { deleted }))
}
