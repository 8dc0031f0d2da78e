// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Imports ---
        handlers::imports::preview_file,
        handlers::imports::validate_mapping,
        handlers::imports::list_custom_fields,
        handlers::imports::define_custom_field,
        handlers::imports::run_import,

        // --- Lists ---
        handlers::lists::list_lists,
    ),
    components(
        schemas(
            // --- Contatos ---
            models::contacts::CustomFieldType,
            models::contacts::Contact,
            models::contacts::CustomFieldDefinition,
            models::contacts::ContactList,

            // --- Importação ---
            models::import::ParsedFile,
            models::import::NewFieldRequest,
            models::import::DefineFieldRequest,
            models::import::DefinedField,
            models::import::ImportPreview,
            models::import::SyncFailure,
            models::import::SyncReport,
            models::import::ImportSummary,

            // --- Payloads ---
            handlers::imports::PreviewUpload,
            handlers::imports::ValidateMappingPayload,
            handlers::imports::ImportUpload,
        )
    ),
    tags(
        (name = "Imports", description = "Importação em massa de contatos"),
        (name = "Lists", description = "Listas de contatos da família")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
