// src/db/memory_store.rs

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ContactStore,
    models::contacts::{
        Contact, ContactList, CustomFieldDefinition, CustomFieldType, CustomFieldValue,
        ListMembership, NewContact, NewCustomFieldValue,
    },
};

/// Armazenamento em memória com as mesmas restrições de unicidade do schema
/// Postgres. Usado apenas nos testes.
#[derive(Default)]
pub struct MemoryContactStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub contacts: Vec<Contact>,
    pub lists: Vec<ContactList>,
    pub memberships: HashSet<ListMembership>,
    pub custom_fields: Vec<CustomFieldDefinition>,
    pub custom_values: Vec<CustomFieldValue>,
    fail_next_contact_insert: bool,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cria uma lista (as listas são geridas fora do pipeline de importação).
    pub fn add_list(&self, family_id: Uuid, nom: &str, external_handle: Option<&str>) -> ContactList {
        let list = ContactList {
            id: Uuid::new_v4(),
            family_id,
            nom: nom.to_string(),
            nb_contacts: 0,
            external_list_handle: external_handle.map(str::to_string),
            created_at: Utc::now(),
        };
        self.state().lists.push(list.clone());
        list
    }

    /// A próxima inserção de contatos é rejeitada inteira.
    pub fn fail_next_contact_insert(&self) {
        self.state().fail_next_contact_insert = true;
    }

    pub fn snapshot(&self) -> MemoryState {
        self.state().clone()
    }

    pub fn contacts_in(&self, family_id: Uuid) -> Vec<Contact> {
        self.state()
            .contacts
            .iter()
            .filter(|c| c.family_id == family_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn find_contacts_by_emails(
        &self,
        family_id: Uuid,
        emails: &[String],
    ) -> Result<Vec<Contact>, AppError> {
        let wanted: HashSet<&str> = emails.iter().map(String::as_str).collect();
        Ok(self
            .state()
            .contacts
            .iter()
            .filter(|c| c.family_id == family_id && wanted.contains(c.email.to_lowercase().as_str()))
            .cloned()
            .collect())
    }

    async fn insert_contacts(
        &self,
        family_id: Uuid,
        owner_user_id: Uuid,
        contacts: &[NewContact],
    ) -> Result<Vec<Contact>, AppError> {
        let mut state = self.state();

        if std::mem::take(&mut state.fail_next_contact_insert) {
            return Err(AppError::InternalServerError(anyhow::anyhow!(
                "inserção de contatos rejeitada"
            )));
        }

        // Valida o lote inteiro antes de gravar qualquer linha (atomicidade)
        let mut seen: HashSet<String> = state
            .contacts
            .iter()
            .filter(|c| c.family_id == family_id)
            .map(|c| c.email.to_lowercase())
            .collect();
        for contact in contacts {
            if !seen.insert(contact.email.to_lowercase()) {
                return Err(AppError::UniqueConstraintViolation(format!(
                    "Un contact avec l'email '{}' existe déjà dans la famille.",
                    contact.email
                )));
            }
        }

        let now = Utc::now();
        let created: Vec<Contact> = contacts
            .iter()
            .map(|c| Contact {
                id: Uuid::new_v4(),
                family_id,
                owner_user_id,
                prenom: c.prenom.clone(),
                nom: c.nom.clone(),
                email: c.email.clone(),
                entreprise: c.entreprise.clone(),
                telephone: c.telephone.clone(),
                created_at: now,
            })
            .collect();

        state.contacts.extend(created.iter().cloned());
        Ok(created)
    }

    async fn list_lists(&self, family_id: Uuid) -> Result<Vec<ContactList>, AppError> {
        let mut lists: Vec<ContactList> = self
            .state()
            .lists
            .iter()
            .filter(|l| l.family_id == family_id)
            .cloned()
            .collect();
        lists.sort_by(|a, b| a.nom.cmp(&b.nom));
        Ok(lists)
    }

    async fn find_lists(
        &self,
        family_id: Uuid,
        list_ids: &[Uuid],
    ) -> Result<Vec<ContactList>, AppError> {
        Ok(self
            .state()
            .lists
            .iter()
            .filter(|l| l.family_id == family_id && list_ids.contains(&l.id))
            .cloned()
            .collect())
    }

    async fn find_memberships(
        &self,
        contact_ids: &[Uuid],
        list_ids: &[Uuid],
    ) -> Result<Vec<ListMembership>, AppError> {
        let contacts: HashSet<&Uuid> = contact_ids.iter().collect();
        Ok(self
            .state()
            .memberships
            .iter()
            .filter(|m| contacts.contains(&m.contact_id) && list_ids.contains(&m.list_id))
            .copied()
            .collect())
    }

    async fn insert_memberships(&self, edges: &[ListMembership]) -> Result<u64, AppError> {
        let mut state = self.state();
        let inserted = edges
            .iter()
            .filter(|edge| state.memberships.insert(**edge))
            .count();
        Ok(inserted as u64)
    }

    async fn refresh_list_counts(&self, list_ids: &[Uuid]) -> Result<(), AppError> {
        let mut state = self.state();
        let MemoryState { lists, memberships, .. } = &mut *state;
        for list in lists.iter_mut().filter(|l| list_ids.contains(&l.id)) {
            list.nb_contacts = memberships.iter().filter(|m| m.list_id == list.id).count() as i64;
        }
        Ok(())
    }

    async fn list_custom_fields(
        &self,
        family_id: Uuid,
    ) -> Result<Vec<CustomFieldDefinition>, AppError> {
        Ok(self
            .state()
            .custom_fields
            .iter()
            .filter(|f| f.family_id == family_id)
            .cloned()
            .collect())
    }

    async fn insert_custom_field(
        &self,
        family_id: Uuid,
        name: &str,
        field_type: CustomFieldType,
    ) -> Result<CustomFieldDefinition, AppError> {
        let mut state = self.state();
        let taken = state
            .custom_fields
            .iter()
            .any(|f| f.family_id == family_id && f.name.to_lowercase() == name.to_lowercase());
        if taken {
            return Err(AppError::DuplicateFieldName(name.to_string()));
        }

        let definition = CustomFieldDefinition {
            id: Uuid::new_v4(),
            family_id,
            name: name.to_string(),
            field_type,
            created_at: Utc::now(),
        };
        state.custom_fields.push(definition.clone());
        Ok(definition)
    }

    async fn insert_custom_field_values(
        &self,
        values: &[NewCustomFieldValue],
    ) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut state = self.state();
        state.custom_values.extend(values.iter().map(|v| CustomFieldValue {
            id: Uuid::new_v4(),
            contact_id: v.contact_id,
            custom_field_id: v.custom_field_id,
            value: v.value.clone(),
            created_at: now,
        }));
        Ok(values.len() as u64)
    }
}
