//! Password verification for sign-in.
//!
//! Argon2id with PHC-formatted hashes (salt included).

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed")]
    HashingFailed,
}

// Argon2id with the default parameters; no password matches it.
const DECOY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$4DUZvPI9rg18SQAjvgRhmg$C+6dOSwfVjBQ9q2pWNdQHoJkHIqdYwgDzVtysBvvp8o";

pub trait CredentialVerifier: Send + Sync + 'static {
    /// `true` only when `plain` matches `stored`. Unreadable hashes are a mismatch.
    fn verify_password(&self, plain: &str, stored: &str) -> bool;

    /// Do the work of one verification without a stored hash to check against.
    /// Sign-in calls this for unknown, disabled and password-less accounts so
    /// they take as long to reject as a wrong password.
    fn verify_decoy(&self, plain: &str);
}

#[derive(Debug, Clone, Default)]
pub struct Argon2Verifier;

impl Argon2Verifier {
    pub fn hash_password(&self, plain: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|_| PasswordError::HashingFailed)?;
        Ok(hash.to_string())
    }
}

impl CredentialVerifier for Argon2Verifier {
    fn verify_password(&self, plain: &str, stored: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored) else {
            return false;
        };
        Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }

    fn verify_decoy(&self, plain: &str) {
        let _ = self.verify_password(plain, DECOY_HASH);
    }
}
