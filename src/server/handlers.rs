use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::error::LocalityError;
use crate::locality::{
    CacheStats, ImportCounts, ImportSource, LabelConfig, Language, LocalityReader, LocalityWriter,
    RegionOption, SourceOrigin, SubregionLookup,
};

use super::state::AppState;

const EXPORT_FILE_NAME: &str = "algeria-localities.json";
const DEFAULT_UPLOAD_NAME: &str = "upload.xml";

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct FailureBody {
    success: bool,
    message: String,
}

pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = FailureBody { success: false, message: self.1 };
        (self.0, Json(body)).into_response()
    }
}

impl From<LocalityError> for ApiError {
    fn from(e: LocalityError) -> Self {
        let status = match &e {
            LocalityError::File(_) => StatusCode::BAD_REQUEST,
            LocalityError::Parse(_) | LocalityError::Structure { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            LocalityError::NotFound(_) | LocalityError::InvalidIdentifier(_) => StatusCode::NOT_FOUND,
            LocalityError::Persist(_) | LocalityError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, e.to_string())
    }
}

/// Run a store or settings write on the blocking pool; both hit the filesystem.
async fn run_blocking<T, F>(state: &Arc<AppState>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> Result<T, ApiError> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, format!("Write task failed: {}", e)))?
}

fn log_request(method: &str, path: &str, outcome: &str, start: Instant) {
    info!(
        "{} {} -> {} ({:.1}ms)",
        method,
        path,
        outcome,
        start.elapsed().as_secs_f64() * 1000.0,
    );
}

// ─── GET /api/regions ────────────────────────────────────────────

#[derive(Serialize)]
pub struct RegionsResponse {
    pub success: bool,
    pub options: Vec<RegionOption>,
}

pub async fn regions(State(state): State<Arc<AppState>>) -> Json<RegionsResponse> {
    let start = Instant::now();
    let options = state.localities.region_options(&state.settings.get());
    log_request("GET", "/api/regions", &format!("{} regions", options.len()), start);
    Json(RegionsResponse { success: true, options })
}

// ─── GET|POST /api/subregions ────────────────────────────────────

#[derive(Deserialize)]
pub struct IdentifierParams {
    #[serde(default)]
    pub identifier: Option<String>,
}

pub async fn subregions_query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IdentifierParams>,
) -> Result<Json<SubregionLookup>, ApiError> {
    lookup_subregions(&state, "GET", params.identifier.as_deref().unwrap_or(""))
}

pub async fn subregions_json(
    State(state): State<Arc<AppState>>,
    Json(params): Json<IdentifierParams>,
) -> Result<Json<SubregionLookup>, ApiError> {
    lookup_subregions(&state, "POST", params.identifier.as_deref().unwrap_or(""))
}

// Misses are ordinary answers of the query endpoint, so they stay 200.
fn lookup_subregions(
    state: &AppState,
    method: &str,
    identifier: &str,
) -> Result<Json<SubregionLookup>, ApiError> {
    let start = Instant::now();
    let answer = state.localities.lookup_subregions(identifier, &state.settings.get())?;
    let outcome = match &answer {
        SubregionLookup::Found { options, .. } => format!("{} -> {} subregions", identifier, options.len()),
        SubregionLookup::Missing { message, .. } => format!("{} -> {}", identifier, message),
    };
    log_request(method, "/api/subregions", &outcome, start);
    Ok(Json(answer))
}

// ─── GET /api/status ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub counts: ImportCounts,
    pub version: u64,
    pub cache: CacheStats,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        success: true,
        counts: state.localities.counts(),
        version: state.localities.store().version(),
        cache: state.localities.cache_stats(),
    })
}

// ─── GET /api/export ─────────────────────────────────────────────

pub async fn export(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let start = Instant::now();
    let json = state.localities.export_json()?;
    log_request("GET", "/api/export", &format!("{} bytes", json.len()), start);

    let disposition = format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME);
    Ok((
        [
            (header::CONTENT_TYPE, "application/json; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        json,
    )
        .into_response())
}

// ─── POST /api/import ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ImportParams {
    pub filename: Option<String>,
}

#[derive(Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub counts: ImportCounts,
    pub source: SourceOrigin,
    pub skipped: usize,
}

/// The request body is the uploaded file; an empty body falls back to the
/// well-known sources.
pub async fn import(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ImportParams>,
    body: Bytes,
) -> Result<Json<ImportResponse>, ApiError> {
    let start = Instant::now();
    let explicit = (!body.is_empty()).then(|| {
        let name = params.filename.unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
        ImportSource::new(name, body.to_vec())
    });

    let outcome = run_blocking(&state, move |s| Ok(s.localities.import(explicit)?))
        .await
        .inspect_err(|e| log_request("POST", "/api/import", &format!("rejected: {}", e.1), start))?;

    log_request(
        "POST",
        "/api/import",
        &format!(
            "{} regions, {} subregions from {}",
            outcome.counts.regions, outcome.counts.subregions, outcome.source
        ),
        start,
    );

    Ok(Json(ImportResponse {
        success: true,
        counts: outcome.counts,
        source: outcome.source,
        skipped: outcome.skipped,
    }))
}

// ─── DELETE /api/localities ──────────────────────────────────────

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub counts: ImportCounts,
}

pub async fn delete_all(State(state): State<Arc<AppState>>) -> Result<Json<DeleteResponse>, ApiError> {
    let start = Instant::now();
    run_blocking(&state, |s| Ok(s.localities.delete()?)).await?;
    log_request("DELETE", "/api/localities", "cleared", start);
    Ok(Json(DeleteResponse { success: true, counts: state.localities.counts() }))
}

// ─── GET|PUT /api/settings ───────────────────────────────────────

#[derive(Serialize)]
pub struct SettingsResponse {
    pub success: bool,
    pub settings: LabelConfig,
}

pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<SettingsResponse> {
    Json(SettingsResponse { success: true, settings: state.settings.get() })
}

/// Partial update; omitted fields keep their current value.
#[derive(Deserialize)]
pub struct SettingsUpdate {
    pub default_language: Option<String>,
    pub bilingual: Option<bool>,
}

pub async fn put_settings(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let start = Instant::now();
    let current = state.settings.get();
    let next = LabelConfig::new(
        update
            .default_language
            .as_deref()
            .map(Language::from_str_lossy)
            .unwrap_or(current.default_language),
        update.bilingual.unwrap_or(current.bilingual),
    );

    let changed = run_blocking(&state, move |s| {
        let changed = s.settings.set(next).map_err(|e| {
            ApiError(StatusCode::INTERNAL_SERVER_ERROR, format!("Could not save settings: {}", e))
        })?;
        if changed {
            s.localities.on_label_settings_changed(&next);
        }
        Ok(changed)
    })
    .await?;

    log_request("PUT", "/api/settings", if changed { "updated" } else { "unchanged" }, start);
    Ok(Json(SettingsResponse { success: true, settings: next }))
}
