use super::{ApiError, AppState};
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};

pub(crate) async fn download_material(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let download = state.uploader.read(&name).await?;
    let disposition = if download.mime == "application/pdf" {
        format!("attachment; filename=\"{}\"", download.name)
    } else {
        format!("inline; filename=\"{}\"", download.name)
    };
    Ok((
        [
            (CONTENT_TYPE, download.mime),
            (CONTENT_LENGTH, download.data.len().to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        download.data,
    )
        .into_response())
}
