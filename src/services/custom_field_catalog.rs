// src/services/custom_field_catalog.rs

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ContactStore,
    models::{
        contacts::{CustomFieldDefinition, CustomFieldType},
        import::{AttributeKey, BuiltinAttribute},
    },
};

/// Schema dinâmico de uma família: definições + índice por nome (minúsculo).
#[derive(Debug, Clone)]
pub struct CustomFieldCatalog {
    family_id: Uuid,
    definitions: Vec<CustomFieldDefinition>,
    by_name: HashMap<String, usize>,
}

impl CustomFieldCatalog {
    pub fn empty(family_id: Uuid) -> Self {
        Self {
            family_id,
            definitions: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub async fn load(store: &dyn ContactStore, family_id: Uuid) -> Result<Self, AppError> {
        let mut catalog = Self::empty(family_id);
        for definition in store.list_custom_fields(family_id).await? {
            catalog.index(definition);
        }
        Ok(catalog)
    }

    fn index(&mut self, definition: CustomFieldDefinition) {
        self.by_name
            .insert(name_key(&definition.name), self.definitions.len());
        self.definitions.push(definition);
    }

    pub fn get(&self, name: &str) -> Option<&CustomFieldDefinition> {
        self.by_name
            .get(&name_key(name))
            .map(|&index| &self.definitions[index])
    }

    pub fn into_definitions(self) -> Vec<CustomFieldDefinition> {
        self.definitions
    }

    /// Verificação rápida do lado da aplicação. A guarda real é o índice
    /// único (família, nome) do armazenamento.
    pub fn check_available(&self, name: &str) -> Result<String, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::EmptyFieldName);
        }
        if BuiltinAttribute::from_name(name).is_some()
            || name.eq_ignore_ascii_case(AttributeKey::IGNORE)
            || self.get(name).is_some()
        {
            return Err(AppError::DuplicateFieldName(name.to_string()));
        }
        Ok(name.to_string())
    }

    /// `DefineCustomField`: cria a definição se o nome estiver livre.
    pub async fn define(
        &mut self,
        store: &dyn ContactStore,
        name: &str,
        field_type: CustomFieldType,
    ) -> Result<CustomFieldDefinition, AppError> {
        let name = self.check_available(name)?;
        let definition = store
            .insert_custom_field(self.family_id, &name, field_type)
            .await?;

        tracing::info!(
            family_id = %self.family_id,
            field = %definition.name,
            field_type = ?definition.field_type,
            "🧩 Campo personalizado criado"
        );

        self.index(definition.clone());
        Ok(definition)
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
