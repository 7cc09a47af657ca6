//! CORS policy for browser clients.
//!
//! Applied outside the auth stages so preflight requests are answered here and
//! never reach the access rules.
//!
//! Policy:
//! - `CORS_ENABLED=false`: no CORS layer at all (no cross-origin headers).
//! - Development: permissive (Allow-Origin: *), WITHOUT credentials.
//! - Production: allowlist origins from Config, WITHOUT credentials.

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;

/// Build the CORS layer, or `None` when CORS is disabled.
///
/// Do not combine wildcard origin (`Any`) with `allow_credentials(true)`.
pub fn layer(config: &Config) -> Option<CorsLayer> {
    if !config.cors_enabled {
        return None;
    }

    let cors = if config.app_env.is_production() {
        // Empty allowlist allows no origin.
        let allowed: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|s| HeaderValue::from_str(s).ok())
            .collect();

        CorsLayer::new().allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _req| allowed.iter().any(|v| v == origin),
        ))
    } else {
        CorsLayer::new().allow_origin(Any)
    };

    Some(
        cors.allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-request-id"),
        ])
        .max_age(std::time::Duration::from_secs(60 * 10)),
    )
}

pub fn apply(router: Router, config: &Config) -> Router {
    match layer(config) {
        Some(cors) => router.layer(cors),
        None => router,
    }
}
