use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock};

use anyhow::{Context as _, Result, bail};
use async_trait::async_trait;
use subtle::ConstantTimeEq;

use crate::auth::{AuthError, Authenticator, Credentials, Principal, SUBMIT_CAPABILITY};

#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret {
    pub username: String,
    pub password: String,
}

impl SharedSecret {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Compares both halves in constant time so a mismatch doesn't reveal which half was wrong.
    pub fn verify(&self, identity: &str, secret: &str) -> bool {
        let user_ok = self.username.as_bytes().ct_eq(identity.as_bytes());
        let pass_ok = self.password.as_bytes().ct_eq(secret.as_bytes());
        (user_ok & pass_ok).into()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecret")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Shared, reloadable view of the configured credential pair.
///
/// Every verification reads the current pair, so a `replace` is seen by the
/// next request without a restart.
#[derive(Debug, Clone)]
pub struct CredentialHandle {
    inner: Arc<RwLock<SharedSecret>>,
}

impl CredentialHandle {
    pub fn new(secret: SharedSecret) -> Self {
        Self {
            inner: Arc::new(RwLock::new(secret)),
        }
    }

    pub fn verify(&self, identity: &str, secret: &str) -> bool {
        match self.inner.read() {
            Ok(current) => current.verify(identity, secret),
            Err(poisoned) => poisoned.into_inner().verify(identity, secret),
        }
    }

    pub fn replace(&self, secret: SharedSecret) {
        let mut current = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current = secret;
    }

    pub fn username(&self) -> String {
        match self.inner.read() {
            Ok(current) => current.username.clone(),
            Err(poisoned) => poisoned.into_inner().username.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SharedSecretAuthenticator {
    credentials: CredentialHandle,
}

impl SharedSecretAuthenticator {
    pub fn new(credentials: CredentialHandle) -> Self {
        Self { credentials }
    }

    pub fn authenticate_pair(
        &self,
        presented_identity: &str,
        presented_secret: &str,
    ) -> Result<Principal, AuthError> {
        if presented_identity.is_empty() || presented_secret.is_empty() {
            return Err(AuthError::Unauthenticated);
        }

        if !self.credentials.verify(presented_identity, presented_secret) {
            return Err(AuthError::Unauthorized);
        }

        Ok(Principal {
            name: presented_identity.to_string(),
            capabilities: [SUBMIT_CAPABILITY.to_string()].into(),
            source: "shared_secret",
        })
    }
}

#[async_trait]
impl Authenticator for SharedSecretAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Principal, AuthError> {
        match credentials {
            Credentials::Basic { username, password } => self.authenticate_pair(username, password),
            _ => Err(AuthError::Unauthenticated),
        }
    }

    fn challenge(&self) -> Option<&'static str> {
        Some(r#"Basic realm="nightwatcher""#)
    }
}

/// Reads a `key: value` credentials file (`username`, `password`; other keys ignored).
pub fn load_credentials_file(path: &Path) -> Result<SharedSecret> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read credentials file: {}", path.display()))?;

    parse_credentials(&contents)
        .with_context(|| format!("invalid credentials file: {}", path.display()))
}

pub fn parse_credentials(contents: &str) -> Result<SharedSecret> {
    let mut username = None;
    let mut password = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "username" => username = Some(value.trim().to_string()),
            "password" => password = Some(value.trim().to_string()),
            _ => {}
        }
    }

    match (username, password) {
        (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Ok(SharedSecret::new(u, p)),
        _ => bail!("both username and password must be set"),
    }
}
