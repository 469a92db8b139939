use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use wxproxy_core::AppError;

use crate::request_id::RequestId;

/// An [`AppError`] bound to the request it failed, rendered as
/// `{error, detail, request_id}` with the matching status code.
#[derive(Debug)]
pub struct ApiError {
    pub error: AppError,
    pub request_id: RequestId,
}

impl ApiError {
    pub fn new(error: AppError, request_id: RequestId) -> Self {
        Self { error, request_id }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    detail: String,
    request_id: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.error.is_client_error() {
            tracing::warn!(status = status.as_u16(), error = %self.error, "request rejected");
        } else {
            tracing::error!(status = status.as_u16(), error = %self.error, "request failed");
        }

        let body = ErrorBody {
            error: self.error.title(),
            detail: self.error.user_message(),
            request_id: self.request_id.as_str(),
        };
        (status, Json(body)).into_response()
    }
}
