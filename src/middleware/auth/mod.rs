pub mod authenticate;
pub mod authorize;

use axum::{Router, middleware};

use crate::state::AppState;

pub use authenticate::{AuthenticationFilter, extract_bearer_token};

/// Apply the authentication and authorization stages to every route.
///
/// Layers run outside-in, so `authenticate` is added last and runs first.
///
/// ```ignore
/// let app = middleware::auth::apply(router, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            authorize::authorize_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state,
            authenticate::authenticate_middleware,
        ))
}
