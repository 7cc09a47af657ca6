/*
 * Responsibility
 * - 環境変数の読み込み (listen addr, identity store, CORS, token key, access rules)
 * - 設定値のバリデーション (不足・不正なら起動失敗)
 * - 起動時に一度だけ構築し、以降は読み取り専用
 */
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::services::auth::rules::{RuleError, RuleSet};
use crate::services::auth::token_codec::{MIN_HMAC_SECRET_LEN, TokenKeys};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
    Rules(RuleError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
            ConfigError::Rules(e) => write!(f, "invalid configuration: AUTH_RULES: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Rules(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RuleError> for ConfigError {
    fn from(e: RuleError) -> Self {
        ConfigError::Rules(e)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    // Identity store: PostgreSQL when set, otherwise in-memory (optionally seeded)
    pub database_url: Option<String>,
    pub identity_seed_path: Option<PathBuf>,

    pub cors_enabled: bool,
    pub cors_allowed_origins: Vec<String>,

    pub auth_issuer: String,
    pub auth_audience: String,
    pub access_token_ttl_seconds: u64,
    pub token_keys: TokenKeys,

    pub rules: RuleSet,

    pub request_timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port: u16 = match non_empty("PORT") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 3000,
        };
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(lookup("APP_ENV"));

        let database_url = non_empty("DATABASE_URL");
        let identity_seed_path = non_empty("IDENTITY_SEED_PATH").map(PathBuf::from);

        let cors_enabled = match non_empty("CORS_ENABLED") {
            Some(v) => parse_bool(&v).ok_or(ConfigError::Invalid("CORS_ENABLED"))?,
            None => true,
        };
        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let auth_issuer = non_empty("AUTH_ISSUER").ok_or(ConfigError::Missing("AUTH_ISSUER"))?;
        let auth_audience =
            non_empty("AUTH_AUDIENCE").ok_or(ConfigError::Missing("AUTH_AUDIENCE"))?;

        let access_token_ttl_seconds = match non_empty("ACCESS_TOKEN_TTL_SECONDS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid("ACCESS_TOKEN_TTL_SECONDS"))?,
            None => 3600, // 1 hour
        };

        let token_keys = match non_empty("TOKEN_ALGORITHM")
            .unwrap_or_else(|| "HS256".to_string())
            .to_ascii_uppercase()
            .as_str()
        {
            "HS256" => {
                let secret = non_empty("TOKEN_HMAC_SECRET")
                    .ok_or(ConfigError::Missing("TOKEN_HMAC_SECRET"))?;
                if secret.len() < MIN_HMAC_SECRET_LEN {
                    return Err(ConfigError::Invalid("TOKEN_HMAC_SECRET"));
                }
                TokenKeys::Hmac {
                    secret: secret.into_bytes(),
                }
            }
            "EDDSA" => TokenKeys::Ed25519 {
                private_key_pem: non_empty("TOKEN_PRIVATE_KEY_PEM")
                    .ok_or(ConfigError::Missing("TOKEN_PRIVATE_KEY_PEM"))?
                    .replace("\\n", "\n"),
                public_key_pem: non_empty("TOKEN_PUBLIC_KEY_PEM")
                    .ok_or(ConfigError::Missing("TOKEN_PUBLIC_KEY_PEM"))?
                    .replace("\\n", "\n"),
            },
            _ => return Err(ConfigError::Invalid("TOKEN_ALGORITHM")),
        };

        let rules = match non_empty("AUTH_RULES") {
            Some(text) => RuleSet::parse(&text)?,
            None => RuleSet::defaults()?,
        };

        let request_timeout_seconds = match non_empty("REQUEST_TIMEOUT_SECONDS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid("REQUEST_TIMEOUT_SECONDS"))?,
            None => 30,
        };

        Ok(Self {
            addr,
            app_env,
            database_url,
            identity_seed_path,
            cors_enabled,
            cors_allowed_origins,
            auth_issuer,
            auth_audience,
            access_token_ttl_seconds,
            token_keys,
            rules,
            request_timeout_seconds,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
