// src/middleware/family.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::authenticate, i18n::Locale},
};

// Cabeçalho que escolhe a família (escopo dos contatos, listas e campos)
pub const FAMILY_ID_HEADER: &str = "x-family-id";

#[derive(Debug, Clone, Copy)]
pub struct FamilyContext(pub Uuid);

fn bad_request(locale: &Locale, fr: &str, en: &str) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        error: if locale.is_french() { fr } else { en }.to_string(),
        details: None,
    }
}

pub fn family_from_headers(headers: &HeaderMap, locale: &Locale) -> Result<FamilyContext, ApiError> {
    let value = headers.get(FAMILY_ID_HEADER).ok_or_else(|| {
        bad_request(
            locale,
            "L'en-tête X-Family-ID est obligatoire.",
            "The X-Family-ID header is required.",
        )
    })?;

    value
        .to_str()
        .ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .map(FamilyContext)
        .ok_or_else(|| {
            bad_request(
                locale,
                "En-tête X-Family-ID invalide (UUID attendu).",
                "Invalid X-Family-ID header (UUID expected).",
            )
        })
}

/// Autentica, lê a família e confere que o usuário pertence a ela.
pub async fn family_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(request.headers(), &app_state.jwt_secret)
        .map_err(|e| e.to_api_error(&locale))?;
    let family = family_from_headers(request.headers(), &locale)?;

    let is_member = app_state
        .family_repo
        .check_user_family(user.0, family.0)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    if !is_member {
        tracing::warn!(user_id = %user.0, family_id = %family.0, "Acesso negado à família");
        return Err(AppError::Forbidden.to_api_error(&locale));
    }

    request.extensions_mut().insert(user);
    request.extensions_mut().insert(family);
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for FamilyContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(family) = parts.extensions.get::<FamilyContext>() {
            return Ok(*family);
        }
        let locale = Locale::from_request_parts(parts, state).await.unwrap_or_else(|e| match e {});
        family_from_headers(&parts.headers, &locale)
    }
}
