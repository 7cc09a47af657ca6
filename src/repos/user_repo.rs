/*
 * Responsibility
 * - users / roles / user_roles テーブル向け SQLx 操作
 * - PgPool を受け取り、IdentityStore として subject → Account を引く
 * - DB エラーは RepoError に変換して返す (上位で fail-closed)
 */
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use crate::repos::error::RepoError;
use crate::repos::identity_store::{Account, IdentityStore};

#[derive(Debug, FromRow)]
pub struct AccountRow {
    pub username: String,
    pub password: Option<String>,
    pub enabled: bool,
    pub roles: Vec<String>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            subject: row.username,
            roles: row.roles,
            enabled: row.enabled,
            password_hash: row.password,
        }
    }
}

pub async fn find_by_username(
    db: &PgPool,
    username: &str,
) -> Result<Option<AccountRow>, RepoError> {
    let row = sqlx::query_as::<_, AccountRow>(
        r#"
        SELECT
            u.username,
            u.password,
            u.enabled,
            COALESCE(
                array_agg(r.name::text ORDER BY r.name) FILTER (WHERE r.name IS NOT NULL),
                ARRAY[]::text[]
            ) AS roles
        FROM users u
        LEFT JOIN user_roles ur ON ur.user_id = u.id
        LEFT JOIN roles r ON r.id = ur.role_id
        WHERE u.username = $1
        GROUP BY u.id, u.username, u.password, u.enabled
        "#,
    )
    .bind(username)
    .fetch_optional(db)
    .await?;

    Ok(row)
}

/// PostgreSQL-backed identity store.
///
/// Roles are read on every lookup; nothing is cached here.
#[derive(Clone, Debug)]
pub struct PgIdentityStore {
    db: PgPool,
}

impl PgIdentityStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn lookup(&self, subject: &str) -> Result<Option<Account>, RepoError> {
        Ok(find_by_username(&self.db, subject).await?.map(Account::from))
    }
}
