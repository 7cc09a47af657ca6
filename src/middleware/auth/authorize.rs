//! SecurityContext + (method, path) → rules で許可/拒否を決める
//!
//! authenticate middleware の内側 (後) で動く前提。
//! SecurityContext が無い場合は未認証 (MissingToken) として扱う。

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::api::extractors::SecurityContext;
use crate::error::AuthRejection;
use crate::services::auth::rules::Decision;
use crate::state::AppState;

pub async fn authorize_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let decision = {
        let fallback = SecurityContext::default();
        let ctx = req.extensions().get::<SecurityContext>().unwrap_or(&fallback);
        state.rules.authorize(req.method(), req.uri().path(), ctx)
    };

    match decision {
        Decision::Allow => next.run(req).await,
        Decision::Reject(failure) => {
            debug!(
                method = %req.method(),
                path = %req.uri().path(),
                reason = failure.code(),
                "request rejected"
            );
            AuthRejection::new(failure, req.uri().path()).into_response()
        }
    }
}
