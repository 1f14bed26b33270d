use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("ITEM_NOT_FOUND: {0}")]
    ItemNotFound(String),
    #[error("USER_NOT_FOUND: {0}")]
    UserNotFound(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("INVALID_DATE: {0}")]
    InvalidDate(String),
    #[error("OUTSIDE_WINDOW: {0}")]
    OutsideWindow(String),
    #[error("ACCESS_DENIED: {0}")]
    AccessDenied(String),
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    /// Client-input errors are surfaced to the caller as-is and never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ItemNotFound(_)
                | Self::UserNotFound(_)
                | Self::NotFound(_)
                | Self::InvalidDate(_)
                | Self::OutsideWindow(_)
                | Self::AccessDenied(_)
                | Self::InvalidInput(_)
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
