// src/handlers/lists.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{family::FamilyContext, i18n::Locale},
    models::contacts::ContactList,
};

// GET /api/lists
#[utoipa::path(
    get,
    path = "/api/lists",
    tag = "Lists",
    responses(
        (status = 200, description = "Listas da família, incluindo 'Aucune liste'", body = Vec<ContactList>)
    ),
    params(
        ("x-family-id" = Uuid, Header, description = "ID da família")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_lists(
    State(app_state): State<AppState>,
    locale: Locale,
    family: FamilyContext,
) -> Result<impl IntoResponse, ApiError> {
    let lists = app_state
        .import_service
        .list_lists(family.0)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(lists)))
}
