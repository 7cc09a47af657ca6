//! Bearer token (JWT) issuance and verification.
//!
//! Verification is split in three ordered checks so each failure maps to one
//! reason:
//! 1. structure  -> `MalformedToken`
//! 2. signature  -> `InvalidSignature`
//! 3. expiry     -> `ExpiredToken`
//!
//! The codec never looks at the identity store; a verified payload says nothing
//! about whether the subject is still allowed in.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::services::auth::failure::AuthFailure;

pub const MIN_HMAC_SECRET_LEN: usize = 32;

const RESERVED_CLAIMS: [&str; 7] = ["sub", "iat", "exp", "iss", "aud", "jti", "roles"];

/// Signing key material, loaded once at startup.
#[derive(Clone)]
pub enum TokenKeys {
    /// HS256 with a shared secret.
    Hmac { secret: Vec<u8> },
    /// EdDSA with Ed25519 PKCS#8 PEM keys.
    Ed25519 {
        private_key_pem: String,
        public_key_pem: String,
    },
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        match self {
            Self::Hmac { .. } => f.write_str("TokenKeys::Hmac"),
            Self::Ed25519 { .. } => f.write_str("TokenKeys::Ed25519"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenKeyError {
    #[error("hmac secret must be at least {MIN_HMAC_SECRET_LEN} bytes")]
    WeakSecret,
    #[error("invalid ed25519 private key pem: {0}")]
    InvalidPrivateKey(#[source] jsonwebtoken::errors::Error),
    #[error("invalid ed25519 public key pem: {0}")]
    InvalidPublicKey(#[source] jsonwebtoken::errors::Error),
}

#[derive(Debug, Error)]
pub enum TokenIssueError {
    #[error("subject must not be empty")]
    EmptySubject,
    #[error("token ttl must be at least one second")]
    InvalidTtl,
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Token payload, as issued and as returned by a successful `verify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    // string or array of strings; audience checks are done by jsonwebtoken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    // informational only: live roles come from the identity store
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
struct RawHeader {
    #[allow(dead_code)]
    alg: String,
}

#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

impl TokenCodec {
    pub fn new(
        keys: &TokenKeys,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Result<Self, TokenKeyError> {
        let (algorithm, encoding_key, decoding_key) = match keys {
            TokenKeys::Hmac { secret } => {
                if secret.len() < MIN_HMAC_SECRET_LEN {
                    return Err(TokenKeyError::WeakSecret);
                }
                (
                    Algorithm::HS256,
                    EncodingKey::from_secret(secret),
                    DecodingKey::from_secret(secret),
                )
            }
            TokenKeys::Ed25519 {
                private_key_pem,
                public_key_pem,
            } => (
                Algorithm::EdDSA,
                EncodingKey::from_ed_pem(private_key_pem.as_bytes())
                    .map_err(TokenKeyError::InvalidPrivateKey)?,
                DecodingKey::from_ed_pem(public_key_pem.as_bytes())
                    .map_err(TokenKeyError::InvalidPublicKey)?,
            ),
        };

        let issuer = issuer.into();
        let audience = audience.into();

        let mut validation = Validation::new(algorithm);
        // Expiry is checked by `verify_at` so the boundary is exact (now >= exp is expired).
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_audience(&[audience.as_str()]);

        Ok(Self {
            algorithm,
            encoding_key,
            decoding_key,
            validation,
            issuer,
            audience,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn issue(
        &self,
        subject: &str,
        roles: &[String],
        ttl: Duration,
    ) -> Result<String, TokenIssueError> {
        self.issue_at(subject, roles, ttl, Utc::now().timestamp())
    }

    pub fn issue_at(
        &self,
        subject: &str,
        roles: &[String],
        ttl: Duration,
        now: i64,
    ) -> Result<String, TokenIssueError> {
        self.issue_with_claims_at(subject, roles, ttl, Map::new(), now)
    }

    /// Issue a token carrying custom claims. Keys that collide with registered
    /// claims are dropped.
    pub fn issue_with_claims_at(
        &self,
        subject: &str,
        roles: &[String],
        ttl: Duration,
        mut extra: Map<String, Value>,
        now: i64,
    ) -> Result<String, TokenIssueError> {
        if subject.trim().is_empty() {
            return Err(TokenIssueError::EmptySubject);
        }
        let ttl_seconds = i64::try_from(ttl.as_secs()).map_err(|_| TokenIssueError::InvalidTtl)?;
        if ttl_seconds == 0 {
            return Err(TokenIssueError::InvalidTtl);
        }

        extra.retain(|key, _| !RESERVED_CLAIMS.contains(&key.as_str()));

        let payload = TokenPayload {
            sub: subject.to_string(),
            iat: now,
            exp: now.saturating_add(ttl_seconds),
            iss: Some(self.issuer.clone()),
            aud: Some(Value::String(self.audience.clone())),
            jti: Some(Uuid::new_v4().to_string()),
            roles: roles.to_vec(),
            extra,
        };

        let mut header = Header::new(self.algorithm);
        header.typ = Some("JWT".to_string());
        Ok(jsonwebtoken::encode(&header, &payload, &self.encoding_key)?)
    }

    pub fn verify(&self, raw: &str) -> Result<TokenPayload, AuthFailure> {
        self.verify_at(raw, Utc::now().timestamp())
    }

    pub fn verify_at(&self, raw: &str, now: i64) -> Result<TokenPayload, AuthFailure> {
        // 1) structure
        parse_structure(raw)?;

        // 2) signature (+ iss/aud)
        let data = jsonwebtoken::decode::<TokenPayload>(raw, &self.decoding_key, &self.validation)
            .map_err(|e| classify_jwt_error(&e))?;

        // 3) expiry, fail-closed at the boundary
        if now >= data.claims.exp {
            return Err(AuthFailure::ExpiredToken);
        }

        Ok(data.claims)
    }
}

/// Checks the `header.payload.signature` shape and that header and payload
/// are readable, so any later decode failure can only come from the signature.
fn parse_structure(raw: &str) -> Result<TokenPayload, AuthFailure> {
    let parts: Vec<&str> = raw.split('.').collect();
    let [header, payload, signature] = parts.as_slice() else {
        return Err(AuthFailure::MalformedToken);
    };

    decode_segment::<RawHeader>(header)?;
    let payload = decode_segment::<TokenPayload>(payload)?;

    if payload.sub.trim().is_empty() {
        return Err(AuthFailure::MalformedToken);
    }
    if signature.is_empty() {
        return Err(AuthFailure::InvalidSignature);
    }

    Ok(payload)
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, AuthFailure> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthFailure::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthFailure::MalformedToken)
}

fn classify_jwt_error(err: &jsonwebtoken::errors::Error) -> AuthFailure {
    match err.kind() {
        ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::MissingRequiredClaim(_) => AuthFailure::MalformedToken,
        ErrorKind::ExpiredSignature => AuthFailure::ExpiredToken,
        // Structure was already validated, so whatever else fails here is the signature.
        _ => AuthFailure::InvalidSignature,
    }
}
