// src/models/import.rs

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::contacts::{CustomFieldDefinition, CustomFieldType};

// =============================================================================
//  ARQUIVO LIDO
// =============================================================================

/// Um upload decodificado: cabeçalho + linhas de dados (cabeçalho excluído).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParsedFile {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ParsedFile {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Janela de pré-visualização usada pela detecção automática.
    pub fn preview(&self, limit: usize) -> &[Vec<String>] {
        &self.rows[..self.rows.len().min(limit)]
    }

    /// Célula (linha, coluna), vazia quando a linha é mais curta que o cabeçalho.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}

// =============================================================================
//  ATRIBUTOS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinAttribute {
    Prenom,
    Nom,
    Email,
    Entreprise,
    Telephone,
}

impl BuiltinAttribute {
    pub fn key(self) -> &'static str {
        match self {
            BuiltinAttribute::Prenom => "prenom",
            BuiltinAttribute::Nom => "nom",
            BuiltinAttribute::Email => "email",
            BuiltinAttribute::Entreprise => "entreprise",
            BuiltinAttribute::Telephone => "telephone",
        }
    }

    /// Comparação sem diferenciar maiúsculas, aceitando também os rótulos acentuados.
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.trim().to_lowercase();
        match lowered.as_str() {
            "prenom" | "prénom" => Some(BuiltinAttribute::Prenom),
            "nom" => Some(BuiltinAttribute::Nom),
            "email" => Some(BuiltinAttribute::Email),
            "entreprise" => Some(BuiltinAttribute::Entreprise),
            "telephone" | "téléphone" => Some(BuiltinAttribute::Telephone),
            _ => None,
        }
    }
}

/// Destino de uma coluna: ignorar, atributo nativo ou campo personalizado.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttributeKey {
    Ignore,
    Builtin(BuiltinAttribute),
    Custom(String),
}

impl AttributeKey {
    pub const IGNORE: &'static str = "ignore";

    pub fn is_ignore(&self) -> bool {
        matches!(self, AttributeKey::Ignore)
    }

    /// Chave usada para detectar colunas duplicadas; campos personalizados
    /// são únicos sem diferenciar maiúsculas.
    pub fn identity(&self) -> String {
        match self {
            AttributeKey::Ignore => Self::IGNORE.to_string(),
            AttributeKey::Builtin(b) => b.key().to_string(),
            AttributeKey::Custom(name) => format!("custom:{}", name.trim().to_lowercase()),
        }
    }
}

impl From<String> for AttributeKey {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case(Self::IGNORE) {
            return AttributeKey::Ignore;
        }
        match BuiltinAttribute::from_name(&value) {
            Some(builtin) => AttributeKey::Builtin(builtin),
            None => AttributeKey::Custom(value.trim().to_string()),
        }
    }
}

impl From<AttributeKey> for String {
    fn from(value: AttributeKey) -> Self {
        value.to_string()
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeKey::Ignore => f.write_str(Self::IGNORE),
            AttributeKey::Builtin(b) => f.write_str(b.key()),
            AttributeKey::Custom(name) => f.write_str(name),
        }
    }
}

// =============================================================================
//  MAPEAMENTO
// =============================================================================

/// cabeçalho -> atributo. Serializa como `{"Email": "email", "Prénom": "prenom"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    pub entries: BTreeMap<String, AttributeKey>,
}

impl ColumnMapping {
    /// Define (ou troca) o destino de uma coluna.
    pub fn assign(&mut self, header: impl Into<String>, target: AttributeKey) {
        self.entries.insert(header.into(), target);
    }

    pub fn get(&self, header: &str) -> Option<&AttributeKey> {
        self.entries.get(header)
    }

    /// Colunas ativas (tudo menos `ignore`).
    pub fn active(&self) -> impl Iterator<Item = (&String, &AttributeKey)> {
        self.entries.iter().filter(|(_, target)| !target.is_ignore())
    }

    /// Nomes de campos personalizados referenciados pelo mapeamento.
    pub fn custom_field_names(&self) -> Vec<&str> {
        self.entries
            .values()
            .filter_map(|target| match target {
                AttributeKey::Custom(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, AttributeKey)> for ColumnMapping {
    fn from_iter<I: IntoIterator<Item = (K, AttributeKey)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Mapeamento validado contra o arquivo: índices de coluna já resolvidos.
#[derive(Debug, Clone)]
pub struct ResolvedMapping {
    pub builtins: Vec<(usize, BuiltinAttribute)>,
    pub email_column: usize,
    pub custom: Vec<(usize, CustomFieldDefinition)>,
}

/// Campo personalizado a criar, seja isoladamente ou junto da confirmação.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewFieldRequest {
    #[validate(length(min = 1, max = 100, message = "O nome deve ter entre 1 e 100 caracteres"))]
    #[schema(example = "Niveau")]
    pub name: String,

    #[schema(example = "TEXT")]
    pub field_type: CustomFieldType,
}

/// Criação de campo a partir da tela de mapeamento: a coluna indicada passa
/// a alimentar o novo campo no mapeamento devolvido.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DefineFieldRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub field: NewFieldRequest,

    #[schema(example = "Level")]
    pub column: Option<String>,

    #[serde(default)]
    #[schema(value_type = Object)]
    pub mapping: ColumnMapping,
}

/// Campo criado e mapeamento já apontando para ele.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DefinedField {
    pub field: CustomFieldDefinition,
    #[schema(value_type = Object)]
    pub mapping: ColumnMapping,
}

/// Confirmação de uma importação (o arquivo vem à parte).
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub family_id: Uuid,
    pub owner_user_id: Uuid,
    pub mapping: ColumnMapping,
    pub list_ids: Vec<Uuid>,
    pub new_fields: Vec<NewFieldRequest>,
}

// =============================================================================
//  RESULTADOS
// =============================================================================

/// Proposta devolvida na etapa de pré-visualização.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub headers: Vec<String>,
    pub row_count: usize,
    pub preview_rows: Vec<Vec<String>>,
    pub detected_email_column: Option<String>,
    #[schema(value_type = Object, example = json!({"Prénom": "prenom", "Email": "email"}))]
    pub mapping: ColumnMapping,
    pub custom_fields: Vec<CustomFieldDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub list_id: Uuid,
    // Nome do campo (fase 1) ou e-mail do contato (fase 2)
    pub subject: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub fields_declared: usize,
    pub contacts_pushed: usize,
    pub failures: Vec<SyncFailure>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub contacts_created: usize,
    pub contacts_matched: usize,
    pub rows_without_email: usize,
    pub duplicate_rows: usize,
    pub fields_created: usize,
    pub memberships_created: usize,
    pub custom_values_written: usize,
    pub list_ids: Vec<Uuid>,
    // Só presente quando a sincronização roda em linha (sem tarefa de fundo)
    pub sync: Option<SyncReport>,
}
