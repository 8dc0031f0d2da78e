// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

// Idiomas com mensagens traduzidas; o primeiro é o padrão
const SUPPORTED: [&str; 2] = ["en", "fr"];

/// Idioma das mensagens de erro, negociado pelo `Accept-Language`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(pub String);

impl Locale {
    pub fn is_french(&self) -> bool {
        self.0 == "fr"
    }

    /// Primeiro idioma suportado na ordem de preferência do cliente.
    pub fn negotiate(accept_language: Option<&str>) -> Self {
        let lang = accept_language
            .map(accept_language::parse)
            .unwrap_or_default()
            .into_iter()
            .map(|tag| tag.split('-').next().unwrap_or(&tag).to_lowercase())
            .find(|primary| SUPPORTED.contains(&primary.as_str()))
            .unwrap_or_else(|| SUPPORTED[0].to_string());

        Locale(lang)
    }
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok());

        Ok(Locale::negotiate(header_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_first_supported_language() {
        assert_eq!(Locale::negotiate(Some("fr-FR,fr;q=0.9,en;q=0.8")).0, "fr");
        assert_eq!(Locale::negotiate(Some("de-DE,fr;q=0.5")).0, "fr");
        assert_eq!(Locale::negotiate(Some("en-GB")).0, "en");
    }

    #[test]
    fn falls_back_to_english() {
        assert_eq!(Locale::negotiate(None).0, "en");
        assert_eq!(Locale::negotiate(Some("pt-BR")).0, "en");
    }
}
