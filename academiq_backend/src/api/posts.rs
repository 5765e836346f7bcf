use super::{ApiError, ApiResult, AppState, CurrentUser};
use crate::posts::{NewPost, PostService, PostUpdate, PostView};
use crate::search::PostFilterParams;
use crate::uploads::MaterialFile;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct BookmarkResponse {
    bookmarked: bool,
}

fn service(state: &AppState) -> PostService {
    PostService::new(state.database.clone(), state.uploader.clone())
}

pub(crate) async fn list_posts(
    State(state): State<AppState>,
    query: Result<Query<PostFilterParams>, QueryRejection>,
) -> ApiResult<Vec<PostView>> {
    let Query(filters) = query?;
    Ok(Json(service(&state).list_posts(&filters)?))
}

pub(crate) async fn trending_posts(State(state): State<AppState>) -> ApiResult<Vec<PostView>> {
    Ok(Json(service(&state).trending()?))
}

/// Accepts `title`, `body`, `courseCode`, `topics` (a JSON array of strings),
/// `hasLink` and any number of `materials` file parts.
pub(crate) async fn create_post(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<PostView>), ApiError> {
    let mut multipart = multipart?;
    let mut input = NewPost::default();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "materials" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                if data.is_empty() && file_name.as_deref().unwrap_or_default().is_empty() {
                    continue;
                }
                files.push(MaterialFile {
                    file_name,
                    content_type,
                    data,
                });
            }
            "title" => input.title = field.text().await?,
            "body" => input.body = field.text().await?,
            "courseCode" => input.course_code = field.text().await?,
            "hasLink" => input.has_link = field.text().await?.trim() == "true",
            "topics" => {
                let raw = field.text().await?;
                if !raw.trim().is_empty() {
                    input.topics = serde_json::from_str(&raw).map_err(|err| {
                        ApiError::BadRequest(format!("topics must be a JSON array of strings: {err}"))
                    })?;
                }
            }
            other => {
                tracing::debug!(field = %other, "ignoring unknown multipart field");
            }
        }
    }

    let post = service(&state)
        .create_post(&session.user_id, input, files)
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub(crate) async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<PostView> {
    Ok(Json(service(&state).get_post(&post_id)?))
}

pub(crate) async fn update_post(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(post_id): Path<String>,
    payload: Result<Json<PostUpdate>, JsonRejection>,
) -> ApiResult<PostView> {
    let Json(update) = payload?;
    Ok(Json(service(&state).update_post(&session, &post_id, update)?))
}

pub(crate) async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(post_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    service(&state).delete_post(&session, &post_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn bookmark_status(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(post_id): Path<String>,
) -> ApiResult<BookmarkResponse> {
    let bookmarked = service(&state).is_bookmarked(&session.user_id, &post_id)?;
    Ok(Json(BookmarkResponse { bookmarked }))
}

pub(crate) async fn toggle_bookmark(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(post_id): Path<String>,
) -> ApiResult<BookmarkResponse> {
    let bookmarked = service(&state).toggle_bookmark(&session.user_id, &post_id)?;
    Ok(Json(BookmarkResponse { bookmarked }))
}
