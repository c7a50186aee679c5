mod shared_secret;
mod token;

use std::collections::HashSet;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

pub use shared_secret::*;
pub use token::*;

/// Capability a principal needs before it may submit readings.
pub const SUBMIT_CAPABILITY: &str = "edit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub capabilities: HashSet<String>,
    pub source: &'static str,
}

impl Principal {
    pub fn can(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

/// What the transport layer found in the request.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Absent,
    Basic { username: String, password: String },
    Bearer(String),
    /// An Authorization header that could not be understood.
    Malformed,
}

impl Credentials {
    pub fn from_authorization(header: Option<&str>) -> Self {
        let Some(value) = header.map(str::trim) else {
            return Credentials::Absent;
        };

        let Some((scheme, rest)) = value.split_once(' ') else {
            return Credentials::Malformed;
        };
        let rest = rest.trim();

        if scheme.eq_ignore_ascii_case("basic") {
            let Ok(decoded) = STANDARD.decode(rest) else {
                return Credentials::Malformed;
            };
            let Ok(decoded) = String::from_utf8(decoded) else {
                return Credentials::Malformed;
            };
            return match decoded.split_once(':') {
                Some((username, password)) => Credentials::Basic {
                    username: username.to_string(),
                    password: password.to_string(),
                },
                None => Credentials::Malformed,
            };
        }

        if scheme.eq_ignore_ascii_case("bearer") && !rest.is_empty() {
            return Credentials::Bearer(rest.to_string());
        }

        Credentials::Malformed
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Absent => f.write_str("Absent"),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Credentials::Bearer(_) => f.write_str("Bearer(..)"),
            Credentials::Malformed => f.write_str("Malformed"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("insufficient permissions")]
    Unauthorized,

    #[error("identity provider unavailable")]
    ProviderUnavailable(#[source] sqlx::Error),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::Unauthorized => "unauthorized",
            AuthError::ProviderUnavailable(_) => "identity_provider_unavailable",
        }
    }
}

/// One way of turning request credentials into a principal.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Principal, AuthError>;

    /// Value for `WWW-Authenticate` on 401 responses, if the strategy has one.
    fn challenge(&self) -> Option<&'static str> {
        None
    }
}
