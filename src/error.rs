use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

/// Closed error taxonomy surfaced to callers. Automatic phase transitions
/// never produce these; they either mutate state or no-op.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Caller input is missing or malformed; retry with corrected input.
    #[error("{0}")]
    Validation(String),

    /// Room or vote target does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Caller is not allowed to perform this action.
    #[error("{0}")]
    Forbidden(String),

    /// Action is invalid for the room's current phase or state.
    #[error("{0}")]
    Conflict(String),

    /// The fact catalog cannot satisfy a round's dealing requirements.
    #[error("{0}")]
    Capacity(String),

    /// Room store failure; fatal for the current call, nothing persisted.
    #[error("room store failure: {0}")]
    Store(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::Forbidden(_) => "forbidden",
            AppError::Conflict(_) => "conflict",
            AppError::Capacity(_) => "capacity",
            AppError::Store(_) => "store",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Capacity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        });

        (self.status(), Json(body)).into_response()
    }
}
