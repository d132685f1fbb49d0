pub mod dispatch;
pub mod executions;
pub mod health;
pub mod jobs;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use common::errors::ApiError;

/// An `ApiError` paired with the HTTP status it should produce
pub struct ApiFailure(pub StatusCode, pub ApiError);

impl ApiFailure {
    pub fn from_execution_error(err: common::errors::ExecutionError) -> Self {
        use common::errors::ExecutionError;

        let status = match err {
            ExecutionError::JobNotFound(_) => StatusCode::NOT_FOUND,
            ExecutionError::JobDisabled(_)
            | ExecutionError::ManualTriggerDisabled(_)
            | ExecutionError::AlreadyRunning(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self(status, err.into())
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}
