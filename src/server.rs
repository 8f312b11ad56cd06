//! JSON HTTP surface over the translator and the package reconciler.
//!
//! # Endpoints
//! - GET /health - Liveness check
//! - GET /languages - Installed languages and default selections
//! - GET /packages - Package checklist and language selectors
//! - POST /translate - Translate text between two installed languages
//! - POST /packages/sync - Install/uninstall packages to match a selection
//!
//! Only one reconciliation runs at a time; requests touching the package index
//! while one is in flight are answered with `409 Conflict`.

use crate::catalog::{installed_language_names, LanguageSelector, UiSnapshot, ViewPreferences};
use crate::error::TranslateError;
use crate::packages::{PackageIndex, PackageStore};
use crate::reconcile::{Reconciler, SyncEvent, SyncStatus};
use crate::security::api_key_matches;
use crate::translate::{TranslationEngine, TranslationResolver};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Header carrying the API key for package changes
pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared state behind every handler
pub struct AppState<I, S, E> {
    reconciler: Mutex<Reconciler<I, S>>,
    resolver: TranslationResolver<S, E>,
    store: S,
    preferences: ViewPreferences,
    api_key: Option<String>,
}

impl<I, S, E> AppState<I, S, E>
where
    I: PackageIndex,
    S: PackageStore + Clone,
    E: TranslationEngine,
{
    pub fn new(reconciler: Reconciler<I, S>, engine: E, api_key: Option<String>) -> Self {
        let store = reconciler.store().clone();
        let preferences = reconciler.preferences().clone();
        Self {
            resolver: TranslationResolver::new(store.clone(), engine),
            reconciler: Mutex::new(reconciler),
            store,
            preferences,
            api_key,
        }
    }
}

/// API error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// API-specific error wrapper
#[derive(Debug)]
enum ApiError {
    Unauthorized,
    Busy,
    NotFound(String),
    Unprocessable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Invalid API key".to_string()),
            ApiError::Busy => (
                StatusCode::CONFLICT,
                "A package update is already in progress".to_string(),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

impl From<TranslateError> for ApiError {
    fn from(err: TranslateError) -> Self {
        match err {
            TranslateError::NotFound(_) => ApiError::NotFound(err.to_string()),
            TranslateError::NoPackageInstalled { .. } => ApiError::Unprocessable(err.to_string()),
            TranslateError::Store(_) | TranslateError::Engine(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct LanguagesResponse {
    languages: Vec<String>,
    source: LanguageSelector,
    target: LanguageSelector,
}

#[derive(Debug, Deserialize)]
struct TranslateRequest {
    #[serde(default)]
    text: String,
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: String,
}

#[derive(Debug, Serialize)]
struct TranslateResponse {
    translation: String,
}

#[derive(Debug, Deserialize)]
struct SyncRequest {
    packages: BTreeSet<String>,
}

#[derive(Debug, Serialize)]
struct SyncResponse {
    events: Vec<SyncEvent>,
}

/// Create the router
pub fn router<I, S, E>(state: Arc<AppState<I, S, E>>) -> Router
where
    I: PackageIndex + Send + Sync + 'static,
    S: PackageStore + Clone + Send + Sync + 'static,
    E: TranslationEngine + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/languages", get(languages::<I, S, E>))
        .route("/packages", get(packages::<I, S, E>))
        .route("/packages/sync", post(sync_packages::<I, S, E>))
        .route("/translate", post(translate::<I, S, E>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router(state)` on `address` until the process is stopped
pub async fn serve<I, S, E>(state: Arc<AppState<I, S, E>>, address: &str) -> anyhow::Result<()>
where
    I: PackageIndex + Send + Sync + 'static,
    S: PackageStore + Clone + Send + Sync + 'static,
    E: TranslationEngine + Send + Sync + 'static,
{
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// GET /health
async fn health() -> &'static str {
    "OK"
}

/// GET /languages
async fn languages<I, S, E>(
    State(state): State<Arc<AppState<I, S, E>>>,
) -> Result<Json<LanguagesResponse>, ApiError>
where
    S: PackageStore,
{
    let installed = state
        .store
        .installed()
        .map_err(|e| ApiError::Internal(format!("Could not read installed packages: {:#}", e)))?;
    let languages = installed_language_names(&installed);

    Ok(Json(LanguagesResponse {
        source: LanguageSelector::with_preference(
            languages.clone(),
            &state.preferences.preferred_source,
        ),
        target: LanguageSelector::with_preference(
            languages.clone(),
            &state.preferences.preferred_target,
        ),
        languages,
    }))
}

/// GET /packages
async fn packages<I, S, E>(
    State(state): State<Arc<AppState<I, S, E>>>,
) -> Result<Json<UiSnapshot>, ApiError>
where
    I: PackageIndex,
    S: PackageStore,
{
    let mut reconciler = state.reconciler.try_lock().map_err(|_| ApiError::Busy)?;
    Ok(Json(reconciler.snapshot().await))
}

/// POST /translate
async fn translate<I, S, E>(
    State(state): State<Arc<AppState<I, S, E>>>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ApiError>
where
    S: PackageStore,
    E: TranslationEngine,
{
    let translation = state
        .resolver
        .translate(&request.text, &request.from, &request.to)
        .await?;
    Ok(Json(TranslateResponse { translation }))
}

/// POST /packages/sync
async fn sync_packages<I, S, E>(
    State(state): State<Arc<AppState<I, S, E>>>,
    headers: HeaderMap,
    Json(request): Json<SyncRequest>,
) -> Result<(StatusCode, Json<SyncResponse>), ApiError>
where
    I: PackageIndex,
    S: PackageStore,
{
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if !api_key_matches(state.api_key.as_deref(), presented) {
        warn!("Rejected package update with missing or invalid API key");
        return Err(ApiError::Unauthorized);
    }

    let mut reconciler = state.reconciler.try_lock().map_err(|_| ApiError::Busy)?;
    let events = reconciler.reconcile_events(&request.packages).await;

    let status = match events.last() {
        Some(SyncEvent::Finished(report)) => match report.status {
            SyncStatus::NoChanges | SyncStatus::Updated => StatusCode::OK,
            SyncStatus::ManagementDisabled => StatusCode::FORBIDDEN,
            SyncStatus::IndexUnavailable => StatusCode::BAD_GATEWAY,
            SyncStatus::StoreUnavailable | SyncStatus::OperationFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    Ok((status, Json(SyncResponse { events })))
}
