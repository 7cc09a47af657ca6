/*
 * Responsibility
 * - tracing / panic hook の初期化
 * - Config読み込み → 依存生成 (token codec, identity store) → Router 組み立て
 * - Middleware の適用順序 (auth → security headers → CORS → HTTP)
 * - axum::serve() で起動
 */
use std::{panic, process, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::repos::{IdentityStore, InMemoryIdentityStore, PgIdentityStore};
use crate::services::auth::{credentials::Argon2Verifier, token_codec::TokenCodec};
use crate::state::AppState;
use crate::{api, middleware};

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,bearer_gate=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // stderr can be hidden depending on how the process is launched.
        tracing::error!(?info, "panic");

        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env().context("failed to load configuration")?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting bearer gate in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_state(config: &Config) -> Result<AppState> {
    let codec = TokenCodec::new(
        &config.token_keys,
        config.auth_issuer.clone(),
        config.auth_audience.clone(),
    )
    .context("invalid token key configuration")?;
    tracing::info!(algorithm = ?codec.algorithm(), "token codec ready");

    let identity = build_identity_store(config).await?;
    tracing::info!(backend = identity.backend_name(), "identity store ready");

    config.rules.warn_shadowed();

    Ok(AppState::new(
        Arc::new(codec),
        config.rules.clone(),
        identity,
        Arc::new(Argon2Verifier),
        Duration::from_secs(config.access_token_ttl_seconds),
    ))
}

async fn build_identity_store(config: &Config) -> Result<Arc<dyn IdentityStore>> {
    if let Some(url) = &config.database_url {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await
            .context("failed to connect to DATABASE_URL")?;
        return Ok(Arc::new(PgIdentityStore::new(pool)));
    }

    match &config.identity_seed_path {
        Some(path) => {
            let store = InMemoryIdentityStore::from_seed_file(path)
                .with_context(|| format!("failed to load identity seed {}", path.display()))?;
            tracing::info!(accounts = store.len(), "loaded identity seed");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!(
                "no DATABASE_URL or IDENTITY_SEED_PATH; every bearer token will resolve to an unknown subject"
            );
            Ok(Arc::new(InMemoryIdentityStore::new(Vec::new())))
        }
    }
}

/// Assemble the full HTTP stack.
///
/// Order (outermost first): HTTP (request-id, trace, timeout, body limit),
/// CORS, security headers, authentication, authorization, routes.
pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = middleware::auth::apply(api::routes(), state.clone()).with_state(state);
    let router = middleware::security_headers::apply(router);
    let router = middleware::cors::apply(router, config);
    middleware::http::apply(router, config)
}
