//! fieldcheck-api library - HTTP service for the inspection backend
//!
//! Exposes questionnaire, inspection, asset and photo endpoints. All
//! `/api/*` routes require a resolved caller identity; `/health` and
//! `/media/*` are public.

use axum::Router;
use fieldcheck_common::config::Config;
use sqlx::SqlitePool;
use tower_http::services::ServeDir;

pub mod api;
pub mod db;
pub mod domain;
pub mod error;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Service configuration (tag scoping, media directory, GC grace)
    pub config: Config,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, config: Config) -> Self {
        Self { db, config }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Protected routes (require a resolved caller identity)
    let protected = Router::new()
        .route("/api/activos", get(api::assets::list_assets).post(api::assets::create_assets))
        .route(
            "/api/activos/:id",
            axum::routing::put(api::assets::upsert_asset).delete(api::assets::delete_asset),
        )
        .route(
            "/api/cuestionarios",
            get(api::questionnaires::list_questionnaires)
                .post(api::questionnaires::create_questionnaire),
        )
        .route(
            "/api/cuestionarios/fotos",
            post(api::photos::upload_questionnaire_photos),
        )
        .route(
            "/api/cuestionarios/:id",
            get(api::questionnaires::get_questionnaire)
                .put(api::questionnaires::upsert_questionnaire)
                .delete(api::questionnaires::delete_questionnaire),
        )
        .route(
            "/api/inspecciones",
            get(api::inspections::list_inspections).post(api::inspections::create_inspection),
        )
        .route(
            "/api/inspecciones/fotos",
            post(api::photos::upload_inspection_photos),
        )
        .route(
            "/api/inspecciones/:id",
            get(api::inspections::get_inspection)
                .put(api::inspections::upsert_inspection)
                .delete(api::inspections::delete_inspection),
        )
        .route(
            "/api/etiquetas-jerarquicas/activos",
            get(api::vocabularies::list_asset_vocabularies)
                .post(api::vocabularies::upsert_asset_vocabulary),
        )
        .route(
            "/api/etiquetas-jerarquicas/activos/:nombre",
            get(api::vocabularies::get_asset_vocabulary)
                .delete(api::vocabularies::delete_asset_vocabulary),
        )
        .route(
            "/api/etiquetas-jerarquicas/preguntas",
            get(api::vocabularies::list_question_vocabularies)
                .post(api::vocabularies::upsert_question_vocabulary),
        )
        .route(
            "/api/etiquetas-jerarquicas/preguntas/:nombre",
            get(api::vocabularies::get_question_vocabulary)
                .delete(api::vocabularies::delete_question_vocabulary),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::identity::identity_middleware,
        ));

    // Public routes
    let public = Router::new()
        .route("/health", get(api::health::health))
        .nest_service("/media", ServeDir::new(&state.config.media_dir));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
