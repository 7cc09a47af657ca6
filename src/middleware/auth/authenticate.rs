//! bearer token 検証 → Principal 解決 → SecurityContext を extensions に入れる
//!
//! この stage 自身は決してエラーレスポンスを返さない。
//! 失敗した場合も「Principal なし + 理由」の SecurityContext を入れて次へ進み、
//! 拒否するかどうかは authorization stage (rules) が決める。
//! (public route は garbage token 付きでも到達できる必要があるため)

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::api::extractors::SecurityContext;
use crate::services::auth::{
    failure::AuthFailure, identity_resolver::IdentityResolver, token_codec::TokenCodec,
};
use crate::state::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// Token extraction + verification + identity resolution, per request.
#[derive(Clone, Debug)]
pub struct AuthenticationFilter {
    codec: Arc<TokenCodec>,
    resolver: IdentityResolver,
}

impl AuthenticationFilter {
    pub fn new(codec: Arc<TokenCodec>, resolver: IdentityResolver) -> Self {
        Self { codec, resolver }
    }

    /// Build the security context for a request. Never fails: every failure
    /// becomes an unauthenticated context carrying the reason.
    pub async fn authenticate(&self, headers: &HeaderMap) -> SecurityContext {
        match self.try_authenticate(headers).await {
            Ok(ctx) => ctx,
            Err(reason) => {
                debug!(reason = reason.code(), "request is unauthenticated");
                SecurityContext::unauthenticated(reason)
            }
        }
    }

    async fn try_authenticate(&self, headers: &HeaderMap) -> Result<SecurityContext, AuthFailure> {
        let token = extract_bearer_token(headers)?;
        let payload = self.codec.verify(token)?;
        let principal = self.resolver.resolve(&payload.sub).await?;

        debug!(subject = %principal.subject(), "request authenticated");
        Ok(SecurityContext::authenticated(
            principal.with_claims(payload.extra),
        ))
    }
}

/// `Authorization: Bearer <token>`.
///
/// - no header / other scheme / non-ASCII value -> `MissingToken`
/// - `Bearer ` with nothing after it -> `MalformedToken`
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthFailure> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthFailure::MissingToken)?;

    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthFailure::MissingToken)?
        .trim();

    if token.is_empty() {
        return Err(AuthFailure::MalformedToken);
    }
    Ok(token)
}

pub async fn authenticate_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // runs once per request even if the layer is stacked twice
    if req.extensions().get::<SecurityContext>().is_none() {
        let ctx = state.filter.authenticate(req.headers()).await;
        req.extensions_mut().insert(ctx);
    }

    next.run(req).await
}
