//! Admin API error and envelope types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::dlq::DlqError;
use crate::domain::PolicyError;
use crate::queue::QueueError;

/// `{success: true, data}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unavailable(_) => "unavailable",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(target: "courier::http", error = %self, "request failed");
        }
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.error_code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

impl From<DlqError> for ApiError {
    fn from(e: DlqError) -> Self {
        match e {
            DlqError::NotFound(_) => ApiError::NotFound(e.to_string()),
            DlqError::Enqueue(QueueError::Saturated { .. }) => ApiError::Unavailable(e.to_string()),
            DlqError::Enqueue(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<PolicyError> for ApiError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::Storage(_) => ApiError::Internal(e.to_string()),
            _ => ApiError::BadRequest(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    use crate::domain::DlqId;

    #[rstest]
    #[case::not_found(DlqError::NotFound(DlqId::generate()), StatusCode::NOT_FOUND)]
    #[case::saturated(
        DlqError::Enqueue(QueueError::Saturated { max_depth: 1 }),
        StatusCode::SERVICE_UNAVAILABLE
    )]
    #[case::shut_down(DlqError::Enqueue(QueueError::ShutDown), StatusCode::INTERNAL_SERVER_ERROR)]
    fn dlq_errors_map_to_status(#[case] err: DlqError, #[case] expected: StatusCode) {
        assert_eq!(ApiError::from(err).into_response().status(), expected);
    }

    #[test]
    fn policy_validation_is_a_bad_request() {
        let err = ApiError::from(PolicyError::MaxRetriesOutOfRange(11));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
