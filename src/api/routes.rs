/*
 * Responsibility
 * - URL 構造を定義 (/health, /api/auth/signin, /api/user/me, /api/admin/ping)
 * - 認証/認可は route ごとではなく app 全体に掛ける (access rules で制御)
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::handlers::{
    auth::signin,
    health::health,
    users::{admin_ping, me},
};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/signin", post(signin))
        .route("/api/user/me", get(me))
        .route("/api/admin/ping", get(admin_ping))
}
