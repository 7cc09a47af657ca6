/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - token codec, authentication filter, access rules, identity store, credential verifier
 * - 起動時に一度だけ組み立て、以降は読み取り専用 (lock 不要)
 * - Clone 前提で持つ (内部は Arc)
 */
use std::sync::Arc;
use std::time::Duration;

use crate::middleware::auth::AuthenticationFilter;
use crate::repos::identity_store::IdentityStore;
use crate::services::auth::{
    credentials::CredentialVerifier, identity_resolver::IdentityResolver, rules::RuleSet,
    token_codec::TokenCodec,
};

#[derive(Clone)]
pub struct AppState {
    pub codec: Arc<TokenCodec>,
    pub filter: Arc<AuthenticationFilter>,
    pub rules: Arc<RuleSet>,
    pub identity: Arc<dyn IdentityStore>,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub access_token_ttl: Duration,
}

impl AppState {
    pub fn new(
        codec: Arc<TokenCodec>,
        rules: RuleSet,
        identity: Arc<dyn IdentityStore>,
        credentials: Arc<dyn CredentialVerifier>,
        access_token_ttl: Duration,
    ) -> Self {
        let resolver = IdentityResolver::new(identity.clone());
        let filter = AuthenticationFilter::new(codec.clone(), resolver);

        Self {
            codec,
            filter: Arc::new(filter),
            rules: Arc::new(rules),
            identity,
            credentials,
            access_token_ttl,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("codec", &self.codec)
            .field("rules", &self.rules.rules().len())
            .field("identity", &self.identity.backend_name())
            .field("access_token_ttl", &self.access_token_ttl)
            .finish()
    }
}
