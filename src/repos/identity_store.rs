//! Identity store interface used by the identity resolver and sign-in.
//!
//! The gate only needs `lookup(subject)`. Implementations must be safe to call
//! concurrently from many in-flight requests.
use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::repos::error::RepoError;

/// Account record as stored by the identity store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub subject: String,
    pub roles: Vec<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    // PHC string; `None` for accounts that cannot sign in with a password
    #[serde(default)]
    pub password_hash: Option<String>,
}

fn enabled_by_default() -> bool {
    true
}

#[async_trait]
pub trait IdentityStore: Send + Sync + 'static {
    // Backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Returns:
    // - `Ok(Some(account))` when the subject exists (enabled or not)
    // - `Ok(None)` when it does not
    // - `Err(_)` on backend failure (callers fail closed)
    async fn lookup(&self, subject: &str) -> Result<Option<Account>, RepoError>;
}

/// Fixed set of accounts held in memory.
///
/// Read-only after construction, so concurrent lookups need no locking.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityStore {
    accounts: HashMap<String, Account>,
}

impl InMemoryIdentityStore {
    pub fn new(accounts: impl IntoIterator<Item = Account>) -> Self {
        Self {
            accounts: accounts
                .into_iter()
                .map(|a| (a.subject.clone(), a))
                .collect(),
        }
    }

    /// Load accounts from a JSON array file.
    pub fn from_seed_file(path: &Path) -> Result<Self, RepoError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RepoError::Seed(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, RepoError> {
        let accounts: Vec<Account> =
            serde_json::from_str(raw).map_err(|e| RepoError::Seed(e.to_string()))?;
        Ok(Self::new(accounts))
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn lookup(&self, subject: &str) -> Result<Option<Account>, RepoError> {
        Ok(self.accounts.get(subject).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seed_json_defaults_enabled_and_hash() {
        let store = InMemoryIdentityStore::from_json(
            r#"[
                {"subject": "alice", "roles": ["USER"]},
                {"subject": "bob", "roles": ["USER"], "enabled": false, "password_hash": "$argon2id$x"}
            ]"#,
        )
        .unwrap();

        assert_eq!(store.len(), 2);

        let alice = store.lookup("alice").await.unwrap().unwrap();
        assert!(alice.enabled);
        assert_eq!(alice.password_hash, None);

        let bob = store.lookup("bob").await.unwrap().unwrap();
        assert!(!bob.enabled);

        assert!(store.lookup("carol").await.unwrap().is_none());
    }

    #[test]
    fn invalid_seed_is_an_error() {
        let err = InMemoryIdentityStore::from_json("{not json").unwrap_err();
        assert!(matches!(err, RepoError::Seed(_)));
    }
}
