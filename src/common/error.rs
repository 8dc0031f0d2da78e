// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::middleware::i18n::Locale;

#[derive(Debug, Error)]
pub enum AppError {
    // --- Arquivo ---
    #[error("Tipo de arquivo não suportado: {0}")]
    UnsupportedFileType(String),

    #[error("Arquivo precisa de um cabeçalho e ao menos uma linha de dados")]
    FileTooShort,

    #[error("Arquivo ilegível: {0}")]
    MalformedFile(String),

    // --- Mapeamento ---
    #[error("Nenhuma coluna mapeada para o e-mail")]
    MissingEmailMapping,

    #[error("Atributo '{0}' mapeado por mais de uma coluna")]
    DuplicateAttributeMapping(String),

    #[error("Coluna '{0}' não existe no arquivo")]
    UnknownColumn(String),

    #[error("Campo personalizado '{0}' não existe")]
    UnknownCustomField(String),

    #[error("Já existe um campo chamado '{0}'")]
    DuplicateFieldName(String),

    #[error("O nome do campo não pode ser vazio")]
    EmptyFieldName,

    // --- Seleção de listas ---
    #[error("Nenhuma lista selecionada")]
    NoListSelected,

    #[error("'Aucune liste' não pode ser combinada com outras listas")]
    ConflictingListSelection,

    #[error("Lista {0} não encontrada")]
    ListNotFound(uuid::Uuid),

    // --- Genéricos ---
    #[error("Requisição inválida: {0}")]
    InvalidRequest(String),

    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Violação de unicidade: {0}")]
    UniqueConstraintViolation(String),

    #[error("Token inválido")]
    InvalidToken,

    #[error("Acesso negado a esta família")]
    Forbidden,

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // `anyhow::Error` guarda o contexto de qualquer falha inesperada.
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

/// Rejeição HTTP já traduzida.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::UnsupportedFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::FileTooShort
            | AppError::MalformedFile(_)
            | AppError::MissingEmailMapping
            | AppError::DuplicateAttributeMapping(_)
            | AppError::UnknownColumn(_)
            | AppError::UnknownCustomField(_)
            | AppError::EmptyFieldName
            | AppError::NoListSelected
            | AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DuplicateFieldName(_)
            | AppError::ConflictingListSelection
            | AppError::UniqueConstraintViolation(_) => StatusCode::CONFLICT,
            AppError::ListNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Converte para a resposta HTTP no idioma pedido (fr ou en).
    pub fn to_api_error(&self, locale: &Locale) -> ApiError {
        let french = locale.is_french();
        let status = self.status();

        let error = match self {
            AppError::UnsupportedFileType(kind) => pick(
                french,
                format!("Type de fichier non supporté : {kind}. Formats acceptés : .csv, .xlsx, .xls"),
                format!("Unsupported file type: {kind}. Accepted formats: .csv, .xlsx, .xls"),
            ),
            AppError::FileTooShort => pick(
                french,
                "Le fichier doit contenir une ligne d'en-tête et au moins une ligne de données.".into(),
                "The file must contain a header row and at least one data row.".into(),
            ),
            AppError::MalformedFile(reason) => pick(
                french,
                format!("Fichier illisible : {reason}"),
                format!("Unreadable file: {reason}"),
            ),
            AppError::MissingEmailMapping => pick(
                french,
                "Une colonne doit être associée à l'email.".into(),
                "One column must be mapped to email.".into(),
            ),
            AppError::DuplicateAttributeMapping(attr) => pick(
                french,
                format!("L'attribut '{attr}' est associé à plusieurs colonnes."),
                format!("Attribute '{attr}' is mapped by more than one column."),
            ),
            AppError::UnknownColumn(header) => pick(
                french,
                format!("La colonne '{header}' n'existe pas dans le fichier."),
                format!("Column '{header}' does not exist in the file."),
            ),
            AppError::UnknownCustomField(name) => pick(
                french,
                format!("Le champ personnalisé '{name}' n'existe pas."),
                format!("Custom field '{name}' does not exist."),
            ),
            AppError::DuplicateFieldName(name) => pick(
                french,
                format!("Un champ nommé '{name}' existe déjà."),
                format!("A field named '{name}' already exists."),
            ),
            AppError::EmptyFieldName => pick(
                french,
                "Le nom du champ ne peut pas être vide.".into(),
                "The field name cannot be empty.".into(),
            ),
            AppError::NoListSelected => pick(
                french,
                "Sélectionnez au moins une liste.".into(),
                "Select at least one list.".into(),
            ),
            AppError::ConflictingListSelection => pick(
                french,
                "« Aucune liste » ne peut pas être combinée avec d'autres listes.".into(),
                "'Aucune liste' cannot be combined with other lists.".into(),
            ),
            AppError::ListNotFound(id) => pick(
                french,
                format!("Liste {id} introuvable."),
                format!("List {id} not found."),
            ),
            AppError::InvalidRequest(reason) => pick(
                french,
                format!("Requête invalide : {reason}"),
                format!("Invalid request: {reason}"),
            ),
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let codes: Vec<Value> = field_errors
                        .iter()
                        .map(|e| {
                            let text = e.message.as_ref().map(|m| m.to_string());
                            Value::String(text.unwrap_or_else(|| e.code.to_string()))
                        })
                        .collect();
                    details.insert(field.to_string(), Value::Array(codes));
                }
                return ApiError {
                    status,
                    error: pick(
                        french,
                        "Un ou plusieurs champs sont invalides.".into(),
                        "One or more fields are invalid.".into(),
                    ),
                    details: Some(Value::Object(details)),
                };
            }
            AppError::UniqueConstraintViolation(what) => what.clone(),
            AppError::InvalidToken => pick(
                french,
                "Jeton d'authentification invalide ou absent.".into(),
                "Invalid or missing authentication token.".into(),
            ),
            AppError::Forbidden => pick(
                french,
                "Accès refusé à cette famille.".into(),
                "Access to this family is denied.".into(),
            ),
            // Erros internos não vazam detalhes para o cliente.
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                tracing::error!("Erro Interno do Servidor: {:?}", self);
                pick(
                    french,
                    "Une erreur inattendue est survenue.".into(),
                    "An unexpected error occurred.".into(),
                )
            }
        };

        ApiError {
            status,
            error,
            details: None,
        }
    }
}

fn pick(french: bool, fr: String, en: String) -> String {
    if french { fr } else { en }
}

/// Traduz violação de unicidade do Postgres para um erro de domínio.
pub(crate) fn map_unique_violation(err: sqlx::Error, on_conflict: impl FnOnce() -> AppError) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return on_conflict();
        }
    }
    err.into()
}
