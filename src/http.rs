use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::{Authenticator, Credentials};
use crate::ingest::{IngestError, submit};
use crate::latest::get_latest;
use crate::reading::Reading;
use crate::store::{ReadingStore, StorageError};

pub const SUBMIT_PATH: &str = "/nightwatcher/v1/submit";
pub const LATEST_PATH: &str = "/nightwatcher/v1/latest";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReadingStore>,
    pub authenticator: Arc<dyn Authenticator>,
}

#[derive(Debug, Serialize)]
struct Envelope<T> {
    success: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    code: &'static str,
    message: String,
    data: ErrorData,
}

#[derive(Debug, Serialize)]
struct ErrorData {
    status: u16,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    challenge: Option<&'static str>,
}

impl ApiError {
    fn with_challenge(mut self, challenge: Option<&'static str>) -> Self {
        if self.status == StatusCode::UNAUTHORIZED {
            self.challenge = challenge;
        }
        self
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        Self {
            status: err.status(),
            code: err.code(),
            message: err.public_message(),
            challenge: None,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        tracing::error!(code = err.code(), error = ?err, "failed to load latest reading");
        IngestError::Storage(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            code: self.code,
            message: self.message,
            data: ErrorData {
                status: self.status.as_u16(),
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(challenge) = self.challenge {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }
        response
    }
}

async fn submit_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Envelope<Reading>>, ApiError> {
    // A header that isn't valid UTF-8 counts as present but unreadable.
    let credentials = match headers.get(AUTHORIZATION) {
        None => Credentials::Absent,
        Some(value) => match value.to_str() {
            Ok(value) => Credentials::from_authorization(Some(value)),
            Err(_) => Credentials::Malformed,
        },
    };

    let reading = submit(
        state.authenticator.as_ref(),
        state.store.as_ref(),
        &credentials,
        &body,
    )
    .await
    .map_err(|err| ApiError::from(err).with_challenge(state.authenticator.challenge()))?;

    Ok(Json(Envelope {
        success: true,
        data: reading,
    }))
}

#[derive(Debug, Deserialize)]
struct LatestQuery {
    site: Option<String>,
}

async fn latest_handler(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<Envelope<Option<Reading>>>, ApiError> {
    let reading = get_latest(state.store.as_ref(), query.site.as_deref()).await?;

    Ok(Json(Envelope {
        success: true,
        data: reading,
    }))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(SUBMIT_PATH, post(submit_handler))
        .route(LATEST_PATH, get(latest_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(state)
}
