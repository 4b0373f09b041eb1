mod handlers;
mod state;

use axum::http::{header, HeaderValue};
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info, warn};

pub use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let export = get(handlers::export).layer(SetResponseHeaderLayer::overriding(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    ));

    Router::new()
        .route("/api/regions", get(handlers::regions))
        .route(
            "/api/subregions",
            get(handlers::subregions_query).post(handlers::subregions_json),
        )
        .route("/api/status", get(handlers::status))
        .route("/api/export", export)
        .route("/api/import", post(handlers::import))
        .route("/api/localities", delete(handlers::delete_all))
        .route("/api/settings", get(handlers::get_settings).put(handlers::put_settings))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Seed an empty store from the bundled feed, then serve until the
/// process is stopped. Seeding failures are logged and do not stop startup.
pub async fn start(host: &str, port: u16, state: Arc<AppState>) -> std::io::Result<()> {
    match state.localities.seed_if_empty() {
        Ok(Some(outcome)) => info!(
            regions = outcome.counts.regions,
            subregions = outcome.counts.subregions,
            source = %outcome.source,
            "seeded empty store"
        ),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "could not seed locality store"),
    }

    let app = build_router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .inspect_err(|e| error!(%addr, error = %e, "cannot bind"))?;

    info!("dz-localities server listening on http://{}", addr);
    info!("press Ctrl+C to stop");

    axum::serve(listener, app).await
}
