pub mod auth;
pub mod family;
pub mod i18n;
