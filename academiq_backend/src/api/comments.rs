use super::{ApiError, ApiResult, AppState, CurrentUser};
use crate::comments::{CommentNode, CommentService, NewComment};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct DeleteCommentResponse {
    deleted: usize,
}

pub(crate) async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    payload: Result<Json<NewComment>, JsonRejection>,
) -> Result<(StatusCode, Json<CommentNode>), ApiError> {
    let Json(payload) = payload?;
    let service = CommentService::new(state.database.clone());
    let comment = service.create_comment(&session.user_id, payload)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub(crate) async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<Vec<CommentNode>> {
    let service = CommentService::new(state.database.clone());
    Ok(Json(service.list_comments(&post_id)?))
}

pub(crate) async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(comment_id): Path<String>,
) -> ApiResult<DeleteCommentResponse> {
    let service = CommentService::new(state.database.clone());
    let deleted = service.delete_comment_subtree(&session, &comment_id)?;
    Ok(Json(DeleteCommentResponse { deleted }))
}
