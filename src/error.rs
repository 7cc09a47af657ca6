/*
 * Responsibility
 * - アプリ共通の AppError 定義 (handler 用)
 * - 認証/認可の拒否レスポンス (AuthRejection) の組み立て
 * - IntoResponse 実装 (HTTP status / JSON error body)
 */
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::failure::AuthFailure;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorResponseBody {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        };

        let body = ErrorResponseBody {
            error: ErrorBody {
                code,
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Rejection emitted when a request fails authentication or authorization.
///
/// Body: `{status, error, timestamp, path}`. Only the failure category is
/// exposed; nothing from the token or from internal errors.
#[derive(Debug, Clone)]
pub struct AuthRejection {
    failure: AuthFailure,
    path: String,
}

#[derive(Debug, Serialize)]
pub struct AuthRejectionBody {
    pub status: u16,
    pub error: &'static str,
    pub timestamp: String,
    pub path: String,
}

impl AuthRejection {
    pub fn new(failure: AuthFailure, path: impl Into<String>) -> Self {
        Self {
            failure,
            path: path.into(),
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let status = self.failure.status();
        let body = AuthRejectionBody {
            status: status.as_u16(),
            error: self.failure.code(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            path: self.path,
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}
