use thiserror::Error;

pub type ForumResult<T> = Result<T, ForumError>;

/// Failure kinds surfaced by the forum services. The HTTP layer maps each one
/// to a status code; nothing below it decides on statuses.
#[derive(Debug, Error)]
pub enum ForumError {
    #[error("authentication required")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("store failure: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl ForumError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<rusqlite::Error> for ForumError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(anyhow::Error::new(err))
    }
}
