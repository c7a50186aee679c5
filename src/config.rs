use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use sqlx::PgPool;

use crate::auth::{
    Authenticator, CredentialHandle, PgTokenDirectory, SharedSecret, SharedSecretAuthenticator,
    TokenAuthenticator, load_credentials_file,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AuthStrategy {
    /// HTTP Basic against one configured username/password.
    SharedSecret,
    /// Bearer tokens looked up in `nightwatcher_station_tokens`.
    StationToken,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub strategy: AuthStrategy,
    pub username: Option<String>,
    pub password: Option<String>,
    pub credentials_file: Option<PathBuf>,
}

impl AuthConfig {
    /// The credentials file wins over the username/password pair when both are set.
    pub fn shared_secret(&self) -> Result<SharedSecret> {
        if let Some(path) = &self.credentials_file {
            return load_credentials_file(path);
        }

        let username = self.username.as_deref().map(str::trim).unwrap_or_default();
        let password = self.password.as_deref().unwrap_or_default();
        if username.is_empty() || password.is_empty() {
            bail!(
                "shared-secret auth needs NIGHTWATCHER_USERNAME and NIGHTWATCHER_PASSWORD or NIGHTWATCHER_CREDENTIALS_FILE"
            );
        }

        Ok(SharedSecret::new(username, password))
    }
}

pub struct AuthSetup {
    pub authenticator: Arc<dyn Authenticator>,
    /// Present for the shared-secret strategy, so the pair can be reloaded.
    pub credentials: Option<CredentialHandle>,
}

pub async fn build_authenticator(config: &AuthConfig, pool: &PgPool) -> Result<AuthSetup> {
    match config.strategy {
        AuthStrategy::SharedSecret => {
            let secret = config.shared_secret()?;
            tracing::info!(username = %secret.username, "using shared-secret authentication");
            let handle = CredentialHandle::new(secret);
            Ok(AuthSetup {
                authenticator: Arc::new(SharedSecretAuthenticator::new(handle.clone())),
                credentials: Some(handle),
            })
        }
        AuthStrategy::StationToken => {
            let directory = PgTokenDirectory::new(pool.clone());
            directory
                .ensure_schema()
                .await
                .context("failed to ensure station token schema")?;
            tracing::info!("using station-token authentication");
            Ok(AuthSetup {
                authenticator: Arc::new(TokenAuthenticator::new(directory)),
                credentials: None,
            })
        }
    }
}

/// Re-reads the credentials file into the live handle.
pub fn reload_credentials(handle: &CredentialHandle, path: &Path) -> Result<()> {
    let secret = load_credentials_file(path)?;
    handle.replace(secret);
    Ok(())
}
