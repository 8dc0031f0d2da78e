// src/models/contacts.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- ENUMS ---

// Mapeia o CREATE TYPE custom_field_type do banco
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "custom_field_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum CustomFieldType {
    Text,
    Number,
    Date,
}

impl CustomFieldType {
    /// Nome do tipo do lado da plataforma de marketing.
    pub fn external_name(self) -> &'static str {
        match self {
            CustomFieldType::Text => "text",
            CustomFieldType::Number => "float",
            CustomFieldType::Date => "date",
        }
    }
}

// --- CONTATO ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub family_id: Uuid,
    pub owner_user_id: Uuid,

    pub prenom: Option<String>,
    pub nom: Option<String>,
    // Sempre normalizado (trim + minúsculas), é a chave de deduplicação
    pub email: String,
    pub entreprise: Option<String>,
    pub telephone: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Atributos nativos extraídos de uma linha, ainda sem id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewContact {
    pub prenom: Option<String>,
    pub nom: Option<String>,
    pub email: String,
    pub entreprise: Option<String>,
    pub telephone: Option<String>,
}

// --- CAMPOS PERSONALIZADOS (EAV) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldDefinition {
    pub id: Uuid,
    pub family_id: Uuid,
    pub name: String,
    pub field_type: CustomFieldType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldValue {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub custom_field_id: Uuid,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomFieldValue {
    pub contact_id: Uuid,
    pub custom_field_id: Uuid,
    pub value: String,
}

// --- LISTAS ---

/// Nome da lista especial "sem lista": não pode ser combinada com outras.
pub const NO_LIST_SENTINEL: &str = "Aucune liste";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactList {
    pub id: Uuid,
    pub family_id: Uuid,
    pub nom: String,
    // Informativo, recalculado após cada importação
    pub nb_contacts: i64,
    // Identificador da lista na plataforma de marketing
    pub external_list_handle: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ContactList {
    pub fn is_no_list_sentinel(&self) -> bool {
        self.nom == NO_LIST_SENTINEL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ListMembership {
    pub contact_id: Uuid,
    pub list_id: Uuid,
}
