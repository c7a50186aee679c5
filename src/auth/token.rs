use std::collections::HashSet;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::auth::{AuthError, Authenticator, Credentials, Principal, SUBMIT_CAPABILITY};

const TOKEN_SCHEMA_LOCK_KEY: i64 = 0x4e57_5244_0002;

/// Identity a station token resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub capabilities: HashSet<String>,
}

pub fn token_hash(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Looks up station tokens by hash. Tokens are issued out of band.
#[async_trait]
pub trait TokenDirectory: Send + Sync {
    async fn resolve(&self, token_hash: &str) -> Result<Option<Identity>, sqlx::Error>;
}

#[derive(Debug, Clone)]
pub struct PgTokenDirectory {
    pool: PgPool,
}

impl PgTokenDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(TOKEN_SCHEMA_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS nightwatcher_station_tokens (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                token_hash TEXT NOT NULL UNIQUE,
                capabilities TEXT[] NOT NULL DEFAULT ARRAY['edit'],
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                expires_at TIMESTAMPTZ NULL,
                revoked_at TIMESTAMPTZ NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    name: String,
    capabilities: Vec<String>,
}

#[async_trait]
impl TokenDirectory for PgTokenDirectory {
    async fn resolve(&self, token_hash: &str) -> Result<Option<Identity>, sqlx::Error> {
        let row: Option<TokenRow> = sqlx::query_as(
            r#"
            SELECT name, capabilities
            FROM nightwatcher_station_tokens
            WHERE token_hash = $1
              AND revoked_at IS NULL
              AND (expires_at IS NULL OR expires_at > NOW())
            LIMIT 1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Identity {
            name: row.name,
            capabilities: row.capabilities.into_iter().collect(),
        }))
    }
}

/// Session-style strategy: a bearer token names an existing principal, which
/// must hold the submit capability.
pub struct TokenAuthenticator<D> {
    directory: D,
}

impl<D: TokenDirectory> TokenAuthenticator<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl<D: TokenDirectory> Authenticator for TokenAuthenticator<D> {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Principal, AuthError> {
        let Credentials::Bearer(token) = credentials else {
            return Err(AuthError::Unauthenticated);
        };

        let identity = self
            .directory
            .resolve(&token_hash(token))
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "station token lookup failed");
                AuthError::ProviderUnavailable(err)
            })?
            .ok_or(AuthError::Unauthenticated)?;

        let principal = Principal {
            name: identity.name,
            capabilities: identity.capabilities,
            source: "station_token",
        };

        if !principal.can(SUBMIT_CAPABILITY) {
            tracing::info!(station = %principal.name, "station token lacks submit capability");
            return Err(AuthError::Unauthorized);
        }

        Ok(principal)
    }
}
