/*
 * Responsibility
 * - Handler / middleware から見える「リクエスト単位のセキュリティコンテキスト」の型
 * - authentication middleware だけが生成して request extensions に格納する
 * - 以降の stage (authorization, handler) は読むだけ
 */

use std::sync::Arc;

use crate::services::auth::{failure::AuthFailure, principal::Principal};

/// Per-request security context.
///
/// Either a resolved principal, or no principal plus the reason resolution
/// failed. Never both.
#[derive(Debug, Clone)]
pub struct SecurityContext {
    principal: Option<Arc<Principal>>,
    failure: Option<AuthFailure>,
}

impl SecurityContext {
    pub fn authenticated(principal: Principal) -> Self {
        Self {
            principal: Some(Arc::new(principal)),
            failure: None,
        }
    }

    pub fn unauthenticated(reason: AuthFailure) -> Self {
        Self {
            principal: None,
            failure: Some(reason),
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    /// Why no principal was resolved. `MissingToken` when nothing was recorded.
    pub fn failure_reason(&self) -> AuthFailure {
        self.failure.unwrap_or(AuthFailure::MissingToken)
    }
}

impl Default for SecurityContext {
    fn default() -> Self {
        Self::unauthenticated(AuthFailure::MissingToken)
    }
}
