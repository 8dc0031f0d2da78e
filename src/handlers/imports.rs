// src/handlers/imports.rs

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, family::FamilyContext, i18n::Locale},
    models::{
        contacts::CustomFieldDefinition,
        import::{
            ColumnMapping, DefineFieldRequest, DefinedField, ImportPreview, ImportRequest, ImportSummary,
            NewFieldRequest, ParsedFile,
        },
    },
    services::file_ingestor,
};

// =============================================================================
//  UPLOAD
// =============================================================================

/// Partes de um formulário multipart de importação.
#[derive(Default)]
struct UploadParts {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Option<Vec<u8>>,
    mapping: Option<ColumnMapping>,
    list_ids: Option<Vec<Uuid>>,
    new_fields: Vec<NewFieldRequest>,
}

fn json_part<T: DeserializeOwned>(part: &str, text: &str) -> Result<T, AppError> {
    serde_json::from_str(text).map_err(|e| AppError::InvalidRequest(format!("{part}: {e}")))
}

async fn read_form(mut multipart: Multipart) -> Result<UploadParts, AppError> {
    let mut form = UploadParts::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(e.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                form.file_name = field.file_name().map(str::to_string);
                form.content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidRequest(e.body_text()))?;
                form.bytes = Some(bytes.to_vec());
            }
            Some(part @ ("mapping" | "listIds" | "newFields")) => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidRequest(e.body_text()))?;
                match part {
                    "mapping" => form.mapping = Some(json_part(part, &text)?),
                    "listIds" => form.list_ids = Some(json_part(part, &text)?),
                    _ => form.new_fields = json_part(part, &text)?,
                }
            }
            // Partes desconhecidas são ignoradas
            _ => {}
        }
    }

    Ok(form)
}

/// A decodificação do arquivo é CPU-bound: roda fora do executor.
async fn parse_upload(form: &mut UploadParts) -> Result<ParsedFile, AppError> {
    let bytes = form
        .bytes
        .take()
        .ok_or_else(|| AppError::InvalidRequest("file".into()))?;
    let file_name = form.file_name.clone();
    let content_type = form.content_type.clone();

    tokio::task::spawn_blocking(move || {
        file_ingestor::ingest(file_name.as_deref(), content_type.as_deref(), &bytes)
    })
    .await
    .map_err(|e| anyhow::anyhow!("Falha na task de leitura do arquivo: {}", e))?
}

// =============================================================================
//  ROTAS
// =============================================================================

/// Formulário de pré-visualização (apenas para a documentação).
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct PreviewUpload {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

// POST /api/imports/preview
#[utoipa::path(
    post,
    path = "/api/imports/preview",
    tag = "Imports",
    request_body(content = PreviewUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Cabeçalho, amostra e mapeamento proposto", body = ImportPreview),
        (status = 415, description = "Tipo de arquivo não suportado"),
        (status = 422, description = "Arquivo sem linhas de dados")
    ),
    params(
        ("x-family-id" = Uuid, Header, description = "ID da família")
    ),
    security(("api_jwt" = []))
)]
pub async fn preview_file(
    State(app_state): State<AppState>,
    locale: Locale,
    family: FamilyContext,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let preview = async {
        let mut form = read_form(multipart).await?;
        let file = parse_upload(&mut form).await?;
        app_state.import_service.preview(family.0, &file).await
    }
    .await
    .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(preview)))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateMappingPayload {
    #[schema(example = json!(["Prénom", "Email"]))]
    pub headers: Vec<String>,

    #[schema(value_type = Object, example = json!({"Prénom": "prenom", "Email": "email"}))]
    pub mapping: ColumnMapping,
}

// POST /api/imports/mapping/validate
#[utoipa::path(
    post,
    path = "/api/imports/mapping/validate",
    tag = "Imports",
    request_body = ValidateMappingPayload,
    responses(
        (status = 204, description = "Mapeamento válido"),
        (status = 422, description = "E-mail ausente, atributo repetido ou coluna desconhecida")
    ),
    params(
        ("x-family-id" = Uuid, Header, description = "ID da família")
    ),
    security(("api_jwt" = []))
)]
pub async fn validate_mapping(
    State(app_state): State<AppState>,
    locale: Locale,
    family: FamilyContext,
    Json(payload): Json<ValidateMappingPayload>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .import_service
        .validate_mapping(family.0, &payload.headers, &payload.mapping)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok(StatusCode::NO_CONTENT)
}

// GET /api/imports/fields
#[utoipa::path(
    get,
    path = "/api/imports/fields",
    tag = "Imports",
    responses(
        (status = 200, description = "Campos personalizados da família", body = Vec<CustomFieldDefinition>)
    ),
    params(
        ("x-family-id" = Uuid, Header, description = "ID da família")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_custom_fields(
    State(app_state): State<AppState>,
    locale: Locale,
    family: FamilyContext,
) -> Result<impl IntoResponse, ApiError> {
    let fields = app_state
        .import_service
        .list_custom_fields(family.0)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(fields)))
}

// POST /api/imports/fields
#[utoipa::path(
    post,
    path = "/api/imports/fields",
    tag = "Imports",
    request_body = DefineFieldRequest,
    responses(
        (status = 201, description = "Campo criado e coluna reatribuída", body = DefinedField),
        (status = 400, description = "Coluna ausente do mapeamento"),
        (status = 409, description = "Nome já utilizado"),
        (status = 422, description = "Nome vazio")
    ),
    params(
        ("x-family-id" = Uuid, Header, description = "ID da família")
    ),
    security(("api_jwt" = []))
)]
pub async fn define_custom_field(
    State(app_state): State<AppState>,
    locale: Locale,
    family: FamilyContext,
    Json(payload): Json<DefineFieldRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let defined = app_state
        .import_service
        .define_custom_field(family.0, &payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(defined)))
}

/// Formulário de confirmação (apenas para a documentação).
#[derive(ToSchema)]
#[allow(dead_code)]
#[schema(rename_all = "camelCase")]
pub struct ImportUpload {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
    /// JSON: `{"Email": "email", "Niveau": "Niveau"}`
    mapping: String,
    /// JSON: lista de UUIDs
    list_ids: String,
    /// JSON opcional: `[{"name": "Niveau", "fieldType": "TEXT"}]`
    new_fields: Option<String>,
}

// POST /api/imports
#[utoipa::path(
    post,
    path = "/api/imports",
    tag = "Imports",
    request_body(content = ImportUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Importação concluída", body = ImportSummary),
        (status = 404, description = "Lista não encontrada"),
        (status = 409, description = "'Aucune liste' combinada com outras listas"),
        (status = 422, description = "Mapeamento ou seleção de listas inválidos")
    ),
    params(
        ("x-family-id" = Uuid, Header, description = "ID da família")
    ),
    security(("api_jwt" = []))
)]
pub async fn run_import(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    family: FamilyContext,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let summary = async {
        let mut form = read_form(multipart).await?;
        let file = parse_upload(&mut form).await?;
        let request = ImportRequest {
            family_id: family.0,
            owner_user_id: user.0,
            mapping: form
                .mapping
                .ok_or_else(|| AppError::InvalidRequest("mapping".into()))?,
            list_ids: form.list_ids.unwrap_or_default(),
            new_fields: form.new_fields,
        };
        for field in &request.new_fields {
            field.validate()?;
        }
        app_state.import_service.run_import(&file, request).await
    }
    .await
    .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(summary)))
}
