//! API error responses
//!
//! Maps the wager taxonomy onto HTTP statuses with a structured JSON body
//! carrying a machine-readable kind and the request id.

use crate::errors::{AuthError, WagerError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable kind (INVALID_SELECTION, CAPACITY_EXCEEDED, ...).
    pub code: String,
    pub message: String,
    /// Whether resubmitting the same request may succeed later.
    pub retryable: bool,
}

#[derive(Debug)]
pub struct ApiError {
    pub request_id: String,
    pub kind: ApiErrorKind,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    Wager(WagerError),
    Auth(AuthError),
    BadRequest(String),
    Internal(String),
}

impl ApiError {
    pub fn wager(request_id: String, err: WagerError) -> Self {
        Self {
            request_id,
            kind: ApiErrorKind::Wager(err),
        }
    }

    pub fn auth(request_id: String, err: AuthError) -> Self {
        Self {
            request_id,
            kind: ApiErrorKind::Auth(err),
        }
    }

    pub fn bad_request(request_id: String, message: String) -> Self {
        Self {
            request_id,
            kind: ApiErrorKind::BadRequest(message),
        }
    }

    pub fn internal(request_id: String, message: String) -> Self {
        Self {
            request_id,
            kind: ApiErrorKind::Internal(message),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::Wager(err) => write!(f, "[{}] {}", self.request_id, err),
            ApiErrorKind::Auth(err) => write!(f, "[{}] {}", self.request_id, err),
            ApiErrorKind::BadRequest(msg) => write!(f, "[{}] bad request: {}", self.request_id, msg),
            ApiErrorKind::Internal(msg) => write!(f, "[{}] internal: {}", self.request_id, msg),
        }
    }
}

impl std::error::Error for ApiError {}

fn wager_status(err: &WagerError) -> StatusCode {
    match err {
        WagerError::InvalidSelection(_) | WagerError::BelowMinimumStake { .. } => {
            StatusCode::BAD_REQUEST
        }
        WagerError::CapacityExceeded => StatusCode::SERVICE_UNAVAILABLE,
        WagerError::Timeout => StatusCode::REQUEST_TIMEOUT,
        WagerError::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
        WagerError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        WagerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, retryable) = match &self.kind {
            ApiErrorKind::Wager(err) => (
                wager_status(err),
                err.kind().to_string(),
                err.to_string(),
                err.is_retryable(),
            ),
            ApiErrorKind::Auth(err) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED".to_string(),
                err.to_string(),
                false,
            ),
            ApiErrorKind::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST".to_string(),
                msg.clone(),
                false,
            ),
            ApiErrorKind::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR".to_string(),
                msg.clone(),
                false,
            ),
        };

        let body = Json(ErrorResponse {
            request_id: self.request_id,
            error: ErrorBody {
                code,
                message,
                retryable,
            },
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wager_errors_map_to_expected_statuses() {
        assert_eq!(
            wager_status(&WagerError::CapacityExceeded),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(wager_status(&WagerError::Timeout), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            wager_status(&WagerError::InsufficientFunds),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            wager_status(&WagerError::InvalidSelection("x".into())),
            StatusCode::BAD_REQUEST
        );
    }
}
