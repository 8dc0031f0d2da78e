// src/middleware/auth.rs

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    common::error::{ApiError, AppError},
    middleware::i18n::Locale,
};

// Conteúdo do JWT emitido pelo serviço de identidade
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // ID do usuário
    pub exp: usize,
    pub iat: usize,
}

/// Usuário autenticado, inserido nos "extensions" da requisição por `family_guard`.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Uuid);

pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::InvalidToken)
}

pub(crate) fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthenticatedUser, AppError> {
    let bearer = headers
        .typed_get::<Authorization<Bearer>>()
        .ok_or(AppError::InvalidToken)?;

    validate_token(bearer.token(), secret).map(|claims| AuthenticatedUser(claims.sub))
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthenticatedUser>() {
            Some(user) => Ok(*user),
            None => {
                let locale = Locale::from_request_parts(parts, state).await.unwrap_or_else(|e| match e {});
                Err(AppError::InvalidToken.to_api_error(&locale))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: Uuid, ttl_secs: i64) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub,
            exp: (now + ttl_secs) as usize,
            iat: now as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref())).unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn a_valid_token_yields_the_subject() {
        let user = Uuid::new_v4();
        let headers = bearer(&token("segredo", user, 3600));

        let authenticated = authenticate(&headers, "segredo").unwrap();
        assert_eq!(authenticated.0, user);
    }

    #[test]
    fn wrong_secret_and_expired_tokens_are_rejected() {
        let user = Uuid::new_v4();

        let headers = bearer(&token("outro", user, 3600));
        assert!(matches!(authenticate(&headers, "segredo"), Err(AppError::InvalidToken)));

        let headers = bearer(&token("segredo", user, -3600));
        assert!(matches!(authenticate(&headers, "segredo"), Err(AppError::InvalidToken)));
    }

    #[test]
    fn missing_header_is_rejected() {
        assert!(matches!(
            authenticate(&HeaderMap::new(), "segredo"),
            Err(AppError::InvalidToken)
        ));
    }
}
