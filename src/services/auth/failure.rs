//! Authentication / authorization failure reasons.
//!
//! These are the only failure values that travel through the request pipeline.
//! They never carry token material, so they are safe to log and to expose as a
//! category string in error responses.

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthFailure {
    #[error("missing bearer token")]
    MissingToken,
    #[error("malformed bearer token")]
    MalformedToken,
    #[error("expired bearer token")]
    ExpiredToken,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("unknown subject")]
    UnknownSubject,
    #[error("insufficient role")]
    InsufficientRole,
}

impl AuthFailure {
    /// Category string used in the `error` field of rejection bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingToken => "MISSING_TOKEN",
            Self::MalformedToken => "MALFORMED_TOKEN",
            Self::ExpiredToken => "EXPIRED_TOKEN",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::UnknownSubject => "UNKNOWN_SUBJECT",
            Self::InsufficientRole => "INSUFFICIENT_ROLE",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InsufficientRole => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}
