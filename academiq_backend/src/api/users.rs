use super::{ApiError, ApiResult, AppState, CurrentUser};
use crate::posts::{PostService, PostView};
use crate::users::{ProfileUpdate, UserProfile, UserService};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

pub(crate) async fn get_user(
    State(state): State<AppState>,
    CurrentUser(_session): CurrentUser,
    Path(user_id): Path<String>,
) -> ApiResult<UserProfile> {
    let service = UserService::new(state.database.clone());
    Ok(Json(service.get_profile(&user_id)?))
}

pub(crate) async fn update_user(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(user_id): Path<String>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<UserProfile> {
    let Json(update) = payload?;
    let service = UserService::new(state.database.clone());
    Ok(Json(service.update_profile(&session, &user_id, update)?))
}

pub(crate) async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let service = UserService::new(state.database.clone());
    service.delete_account(&session, &user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn list_user_posts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<PostView>> {
    let service = PostService::new(state.database.clone(), state.uploader.clone());
    Ok(Json(service.list_user_posts(&user_id)?))
}

pub(crate) async fn list_user_bookmarks(
    State(state): State<AppState>,
    CurrentUser(_session): CurrentUser,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<PostView>> {
    let service = PostService::new(state.database.clone(), state.uploader.clone());
    Ok(Json(service.list_bookmarked_posts(&user_id)?))
}
