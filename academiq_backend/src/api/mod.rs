mod comments;
mod materials;
mod posts;
mod reports;
mod users;
mod votes;

use crate::auth::{Session, SessionService};
use crate::config::ForumConfig;
use crate::database::Database;
use crate::error::ForumError;
use crate::uploads::MaterialUploader;
use anyhow::Result;
use axum::async_trait;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Upper bound on material files in one post submission; the request body
/// limit is this many times the per-file cap.
const MAX_FILES_PER_REQUEST: u64 = 10;

#[derive(Clone)]
pub struct AppState {
    pub config: ForumConfig,
    pub database: Database,
    pub uploader: MaterialUploader,
}

impl AppState {
    pub fn new(config: ForumConfig, database: Database) -> Self {
        let uploader = MaterialUploader::new(&config.paths, config.file.clone());
        Self {
            config,
            database,
            uploader,
        }
    }
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Forbidden(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse { error: msg }),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    error: "Unauthorized".into(),
                },
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, ErrorResponse { error: msg }),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse { error: msg }),
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "internal server error".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<ForumError> for ApiError {
    fn from(err: ForumError) -> Self {
        match err {
            ForumError::Unauthorized => ApiError::Unauthorized,
            ForumError::Forbidden(msg) => ApiError::Forbidden(msg),
            ForumError::NotFound(msg) => ApiError::NotFound(msg),
            ForumError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            ForumError::Store(err) => ApiError::Internal(err),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// The authenticated caller, resolved from `Authorization: Bearer <token>`.
pub(crate) struct CurrentUser(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let session = SessionService::new(state.database.clone()).resolve_header(header)?;
        Ok(CurrentUser(session))
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(state: AppState) -> Router {
    let body_limit = state
        .config
        .file
        .max_upload_bytes
        .saturating_mul(MAX_FILES_PER_REQUEST);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(health_handler))
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/trending", get(posts::trending_posts))
        .route(
            "/posts/:id",
            get(posts::get_post)
                .patch(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/posts/:id/comments", get(comments::list_comments))
        .route(
            "/posts/:id/bookmark",
            get(posts::bookmark_status).post(posts::toggle_bookmark),
        )
        .route(
            "/votes/:kind/:id",
            get(votes::get_votes).post(votes::cast_vote),
        )
        .route("/comments", post(comments::create_comment))
        .route("/comments/:id", axum::routing::delete(comments::delete_comment))
        .route("/reports", get(reports::list_reports).post(reports::file_report))
        .route("/reports/check", post(reports::check_report))
        .route("/reports/clear", post(reports::clear_reports))
        .route("/reports/delete", post(reports::delete_reported_item))
        .route(
            "/users/:id",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/:id/posts", get(users::list_user_posts))
        .route("/users/:id/bookmarks", get(users::list_user_bookmarks))
        .route("/materials/:name", get(materials::download_material))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Tries to bind to the given port, or finds the next available port
async fn find_available_port(start_port: u16) -> Result<(TcpListener, u16)> {
    const MAX_PORT_ATTEMPTS: u16 = 100;

    for offset in 0..MAX_PORT_ATTEMPTS {
        let Some(port) = start_port.checked_add(offset) else {
            break;
        };
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok((listener, port)),
            Err(e) => {
                if offset == 0 {
                    tracing::debug!(port, error = %e, "port in use, trying next port");
                }
                continue;
            }
        }
    }

    anyhow::bail!(
        "could not find an available port starting at {}",
        start_port
    )
}

pub async fn serve_http(config: ForumConfig, database: Database) -> Result<()> {
    let state = AppState::new(config.clone(), database);
    let router = router(state);

    tracing::info!(
        max_upload_mb = config.file.max_upload_bytes / (1024 * 1024),
        materials_dir = %config.paths.materials_dir.display(),
        "configured material uploads"
    );

    let (listener, actual_port) = find_available_port(config.api_port).await?;
    let addr = SocketAddr::from(([0, 0, 0, 0], actual_port));

    if actual_port != config.api_port {
        tracing::warn!(
            requested_port = config.api_port,
            actual_port = actual_port,
            "configured port was in use, bound to next available port"
        );
    }

    tracing::info!(?addr, "HTTP server listening");
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}
