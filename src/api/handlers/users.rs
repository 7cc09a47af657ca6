/*
 * Responsibility
 * - GET /api/user/me: 認証済み Principal をそのまま返す
 * - GET /api/admin/ping: handler 先頭での明示的な role チェックの例
 */
use axum::{Json, extract::OriginalUri};
use serde_json::{Value, json};

use crate::api::dto::users::PrincipalResponse;
use crate::api::extractors::CurrentPrincipal;
use crate::error::AuthRejection;
use crate::services::auth::principal::require_roles;

pub async fn me(CurrentPrincipal(principal): CurrentPrincipal) -> Json<PrincipalResponse> {
    Json(PrincipalResponse::from(&principal))
}

pub async fn admin_ping(
    OriginalUri(uri): OriginalUri,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Value>, AuthRejection> {
    require_roles(&principal, &["ADMIN"])
        .map_err(|failure| AuthRejection::new(failure, uri.path()))?;

    Ok(Json(json!({"pong": principal.subject()})))
}
