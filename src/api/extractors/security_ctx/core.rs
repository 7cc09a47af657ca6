use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AuthRejection;
use crate::services::auth::principal::Principal;

use super::SecurityContext;

/// Handler で認証済み Principal を受け取るための extractor
///
/// authentication middleware が SecurityContext を extensions に入れている前提。
/// Principal が無い場合 (未認証 / middleware 未設定) は記録された理由で 401 を返す。
pub struct CurrentPrincipal(pub Principal);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<SecurityContext>()
            .cloned()
            .unwrap_or_default();

        match ctx.principal() {
            Some(principal) => Ok(CurrentPrincipal(principal.clone())),
            None => Err(AuthRejection::new(ctx.failure_reason(), parts.uri.path())),
        }
    }
}
