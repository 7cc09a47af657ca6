/*
 * Responsibility
 * - POST /api/auth/signin
 * - identity store で account を引き、credential verifier で password を検証
 * - 成功したら token codec で access token を発行する
 * - 失敗理由 (存在しない / 無効 / password 不一致) はクライアントに区別させない
 */
use axum::{Json, extract::State};
use tracing::{debug, error, warn};

use crate::api::dto::signin::{SignInRequest, TokenResponse};
use crate::error::AppError;
use crate::services::auth::identity_resolver::normalize_role;
use crate::state::AppState;

pub async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    req.validate()
        .map_err(|msg| AppError::InvalidRequest(msg.to_string()))?;

    let account = state
        .identity
        .lookup(req.username.trim())
        .await
        .map_err(|e| {
            warn!(error = %e, "identity store lookup failed during sign-in");
            AppError::Internal
        })?
        .filter(|a| a.enabled && a.password_hash.is_some());

    // Argon2 is CPU-bound; keep it off the async workers.
    // Accounts that cannot sign in still pay for one verification.
    let verifier = state.credentials.clone();
    let password = req.password;
    let stored = account.as_ref().and_then(|a| a.password_hash.clone());
    let matches = tokio::task::spawn_blocking(move || match stored {
        Some(stored) => verifier.verify_password(&password, &stored),
        None => {
            verifier.verify_decoy(&password);
            false
        }
    })
    .await
    .map_err(|e| {
        error!(error = %e, "password verification task failed");
        AppError::Internal
    })?;

    let account = match account {
        Some(account) if matches => account,
        _ => {
            debug!("sign-in rejected: unknown account or bad credentials");
            return Err(AppError::Unauthorized);
        }
    };

    let roles: Vec<String> = account.roles.iter().map(|r| normalize_role(r)).collect();
    let access_token = state
        .codec
        .issue(&account.subject, &roles, state.access_token_ttl)
        .map_err(|e| {
            error!(error = %e, "failed to issue access token");
            AppError::Internal
        })?;

    debug!(subject = %account.subject, "access token issued");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.access_token_ttl.as_secs(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::repos::{Account, InMemoryIdentityStore};
    use crate::services::auth::credentials::CredentialVerifier;
    use crate::services::auth::rules::RuleSet;
    use crate::services::auth::token_codec::{TokenCodec, TokenKeys};

    // Plain-text "hashes", counting which path each attempt took.
    #[derive(Default)]
    struct CountingVerifier {
        real: AtomicUsize,
        decoy: AtomicUsize,
    }

    impl CountingVerifier {
        fn calls(&self) -> usize {
            self.real.load(Ordering::SeqCst) + self.decoy.load(Ordering::SeqCst)
        }
    }

    impl CredentialVerifier for CountingVerifier {
        fn verify_password(&self, plain: &str, stored: &str) -> bool {
            self.real.fetch_add(1, Ordering::SeqCst);
            plain == stored
        }

        fn verify_decoy(&self, _plain: &str) {
            self.decoy.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn account(subject: &str, enabled: bool, password: Option<&str>) -> Account {
        Account {
            subject: subject.into(),
            roles: vec!["USER".into()],
            enabled,
            password_hash: password.map(str::to_string),
        }
    }

    fn state(verifier: Arc<CountingVerifier>) -> AppState {
        let codec = TokenCodec::new(
            &TokenKeys::Hmac {
                secret: b"0123456789abcdef0123456789abcdef".to_vec(),
            },
            "bearer-gate",
            "api",
        )
        .unwrap();
        let store = InMemoryIdentityStore::new([
            account("alice", true, Some("secret")),
            account("carol", false, Some("secret")),
            account("dave", true, None),
        ]);

        AppState::new(
            Arc::new(codec),
            RuleSet::default(),
            Arc::new(store),
            verifier,
            Duration::from_secs(60),
        )
    }

    fn request(username: &str, password: &str) -> Json<SignInRequest> {
        Json(SignInRequest {
            username: username.into(),
            password: password.into(),
        })
    }

    #[tokio::test]
    async fn every_rejection_runs_one_verification() {
        let verifier = Arc::new(CountingVerifier::default());
        let state = state(verifier.clone());

        for (username, password) in [
            ("alice", "wrong"),
            ("nobody", "secret"),
            ("carol", "secret"),
            ("dave", "secret"),
        ] {
            let before = verifier.calls();
            let result = signin(State(state.clone()), request(username, password)).await;

            assert!(matches!(result, Err(AppError::Unauthorized)), "{username}");
            assert_eq!(verifier.calls() - before, 1, "{username}");
        }

        assert_eq!(verifier.real.load(Ordering::SeqCst), 1);
        assert_eq!(verifier.decoy.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn valid_credentials_issue_a_token() {
        let verifier = Arc::new(CountingVerifier::default());
        let state = state(verifier.clone());

        let Json(body) = signin(State(state.clone()), request("alice", "secret"))
            .await
            .unwrap();

        assert_eq!(body.token_type, "Bearer");
        assert_eq!(body.expires_in, 60);
        assert_eq!(state.codec.verify(&body.access_token).unwrap().sub, "alice");
        assert_eq!(verifier.decoy.load(Ordering::SeqCst), 0);
    }
}
