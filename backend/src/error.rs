use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use draw_core::{DrawError, GroupError};
use serde_json::json;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("not allowed")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Conflict(String),
    #[error("the draw has not been performed yet")]
    NotReady,
    #[error("draw failed: {0}")]
    Draw(DrawError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<GroupError> for ApiError {
    fn from(error: GroupError) -> Self {
        match error {
            GroupError::Validation(msg) => Self::Validation(msg),
            GroupError::InvalidState(msg) => Self::InvalidState(msg),
            GroupError::Conflict(msg) => Self::Conflict(msg),
            GroupError::Forbidden => Self::Forbidden,
            GroupError::NotReady => Self::NotReady,
            GroupError::Draw(err) => Self::Draw(err),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidState(_) | Self::Conflict(_) | Self::NotReady => StatusCode::CONFLICT,
            Self::Draw(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Draw(_) | Self::Store(_) => {
                tracing::error!(error = %self, "internal error");
                "an internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
