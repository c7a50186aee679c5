use std::fmt;

use axum::http::StatusCode;

use crate::auth::{AuthError, Authenticator, Credentials};
use crate::reading::{Reading, ValidationError, validate_body};
use crate::store::{ReadingStore, StorageError};

/// Steps one submission moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Received,
    Authenticating,
    Validating,
    Persisting,
    Succeeded,
    Rejected,
}

impl IngestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestState::Received => "received",
            IngestState::Authenticating => "authenticating",
            IngestState::Validating => "validating",
            IngestState::Persisting => "persisting",
            IngestState::Succeeded => "succeeded",
            IngestState::Rejected => "rejected",
        }
    }
}

impl fmt::Display for IngestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IngestError {
    pub fn status(&self) -> StatusCode {
        match self {
            IngestError::Auth(AuthError::Unauthenticated) => StatusCode::UNAUTHORIZED,
            IngestError::Auth(AuthError::Unauthorized) => StatusCode::FORBIDDEN,
            IngestError::Auth(AuthError::ProviderUnavailable(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            IngestError::Validation(_) => StatusCode::BAD_REQUEST,
            IngestError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            IngestError::Auth(err) => err.code(),
            IngestError::Validation(err) => err.code(),
            IngestError::Storage(err) => err.code(),
        }
    }

    /// Message safe to hand back to the station.
    pub fn public_message(&self) -> String {
        match self {
            IngestError::Auth(AuthError::Unauthenticated) => "Authentication required.".to_string(),
            IngestError::Auth(AuthError::Unauthorized) => "Insufficient permissions.".to_string(),
            IngestError::Auth(AuthError::ProviderUnavailable(_)) => {
                "Unable to verify credentials.".to_string()
            }
            IngestError::Validation(err) => err.to_string(),
            IngestError::Storage(_) => "Failed to store reading.".to_string(),
        }
    }
}

fn enter(state: IngestState) {
    tracing::debug!(state = %state, "submission state");
}

/// Authenticates, validates and stores one submission.
///
/// The body is only parsed once authentication has succeeded. Nothing is
/// retried here; a failed insert leaves no row behind so the station may
/// resubmit.
pub async fn submit(
    authenticator: &dyn Authenticator,
    store: &dyn ReadingStore,
    credentials: &Credentials,
    body: &[u8],
) -> Result<Reading, IngestError> {
    enter(IngestState::Received);

    enter(IngestState::Authenticating);
    let principal = match authenticator.authenticate(credentials).await {
        Ok(principal) => principal,
        Err(err) => {
            enter(IngestState::Rejected);
            tracing::info!(code = err.code(), "submission rejected by authentication");
            return Err(err.into());
        }
    };

    enter(IngestState::Validating);
    let reading = match validate_body(body) {
        Ok(reading) => reading,
        Err(err) => {
            enter(IngestState::Rejected);
            tracing::info!(principal = %principal.name, error = %err, "submission failed validation");
            return Err(err.into());
        }
    };

    enter(IngestState::Persisting);
    let stored = match store.insert(&reading).await {
        Ok(stored) => stored,
        Err(err) => {
            enter(IngestState::Rejected);
            tracing::error!(
                principal = %principal.name,
                site = %reading.site_name,
                code = err.code(),
                error = ?err,
                "failed to store reading"
            );
            return Err(err.into());
        }
    };

    enter(IngestState::Succeeded);
    tracing::info!(
        principal = %principal.name,
        source = principal.source,
        site = %stored.site_name,
        id = %stored.id,
        "reading stored"
    );

    Ok(stored)
}
