// src/lib.rs

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod common;
pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use crate::config::AppState;
use crate::middleware::family::family_guard;

/// Monta o router completo da API.
pub fn app(app_state: AppState, max_upload_bytes: usize) -> Router {
    // Rotas da importação (protegidas por JWT + família)
    let import_routes = Router::new()
        .route("/", post(handlers::imports::run_import))
        .route("/preview", post(handlers::imports::preview_file))
        .route("/mapping/validate", post(handlers::imports::validate_mapping))
        .route(
            "/fields",
            get(handlers::imports::list_custom_fields).post(handlers::imports::define_custom_field),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            family_guard,
        ));

    let list_routes = Router::new()
        .route("/", get(handlers::lists::list_lists))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            family_guard,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", docs::ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/imports", import_routes)
        .nest("/api/lists", list_routes)
        .with_state(app_state)
}
