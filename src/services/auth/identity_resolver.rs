use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::repos::identity_store::IdentityStore;
use crate::services::auth::{failure::AuthFailure, principal::Principal};

const ROLE_PREFIX: &str = "ROLE_";

/// Maps a verified token subject to a principal with its current roles.
///
/// Every call goes to the identity store, so a disabled account or a revoked
/// role takes effect on the next request without re-issuing tokens.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("store", &self.store.backend_name())
            .finish()
    }
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, subject: &str) -> Result<Principal, AuthFailure> {
        let account = match self.store.lookup(subject).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                debug!(subject = %subject, "subject not found in identity store");
                return Err(AuthFailure::UnknownSubject);
            }
            Err(err) => {
                // fail-closed: treated like an unknown subject for this request
                warn!(
                    subject = %subject,
                    backend = self.store.backend_name(),
                    error = %err,
                    "identity store lookup failed"
                );
                return Err(AuthFailure::UnknownSubject);
            }
        };

        if !account.enabled {
            debug!(subject = %subject, "account disabled");
            return Err(AuthFailure::UnknownSubject);
        }

        let roles: BTreeSet<String> = account
            .roles
            .iter()
            .map(|r| normalize_role(r))
            .filter(|r| !r.is_empty())
            .collect();

        if roles.is_empty() {
            debug!(subject = %subject, "account has no roles");
            return Err(AuthFailure::UnknownSubject);
        }

        Ok(Principal::new(account.subject, roles))
    }
}

/// `ROLE_ADMIN` and `ADMIN` name the same role.
pub fn normalize_role(role: &str) -> String {
    let role = role.trim();
    role.strip_prefix(ROLE_PREFIX).unwrap_or(role).to_string()
}
