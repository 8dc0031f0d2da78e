// src/db/contact_store.rs

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::contacts::{
        Contact, ContactList, CustomFieldDefinition, CustomFieldType, ListMembership, NewContact,
        NewCustomFieldValue,
    },
};

/// Operações de armazenamento consumidas pelo pipeline de importação.
///
/// Todas as leituras são em lote (um comando por etapa), nunca uma ida ao
/// banco por linha. Implementações: [`ContactRepository`](super::ContactRepository)
/// (Postgres) e [`MemoryContactStore`](super::MemoryContactStore).
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Contatos da família cujo e-mail (normalizado) está no conjunto.
    async fn find_contacts_by_emails(
        &self,
        family_id: Uuid,
        emails: &[String],
    ) -> Result<Vec<Contact>, AppError>;

    /// Inserção em lote, atômica: ou entra o lote inteiro ou nada.
    async fn insert_contacts(
        &self,
        family_id: Uuid,
        owner_user_id: Uuid,
        contacts: &[NewContact],
    ) -> Result<Vec<Contact>, AppError>;

    async fn list_lists(&self, family_id: Uuid) -> Result<Vec<ContactList>, AppError>;

    /// Listas da família entre os ids pedidos (ids de outra família são ignorados).
    async fn find_lists(
        &self,
        family_id: Uuid,
        list_ids: &[Uuid],
    ) -> Result<Vec<ContactList>, AppError>;

    async fn find_memberships(
        &self,
        contact_ids: &[Uuid],
        list_ids: &[Uuid],
    ) -> Result<Vec<ListMembership>, AppError>;

    /// Retorna quantas arestas foram de fato criadas.
    async fn insert_memberships(&self, edges: &[ListMembership]) -> Result<u64, AppError>;

    /// Recalcula `nb_contacts` a partir das arestas.
    async fn refresh_list_counts(&self, list_ids: &[Uuid]) -> Result<(), AppError>;

    async fn list_custom_fields(
        &self,
        family_id: Uuid,
    ) -> Result<Vec<CustomFieldDefinition>, AppError>;

    /// Falha com `DuplicateFieldName` se o nome já existir na família
    /// (comparação sem diferenciar maiúsculas).
    async fn insert_custom_field(
        &self,
        family_id: Uuid,
        name: &str,
        field_type: CustomFieldType,
    ) -> Result<CustomFieldDefinition, AppError>;

    async fn insert_custom_field_values(
        &self,
        values: &[NewCustomFieldValue],
    ) -> Result<u64, AppError>;
}
