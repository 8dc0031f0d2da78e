// src/services/import_service.rs

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ContactStore,
    models::{
        contacts::{Contact, ContactList, CustomFieldDefinition, NewCustomFieldValue},
        import::{
            AttributeKey, ColumnMapping, DefineFieldRequest, DefinedField, ImportPreview, ImportRequest,
            ImportSummary, NewFieldRequest, ParsedFile, ResolvedMapping,
        },
    },
    services::{
        column_mapper::{self, PREVIEW_ROWS},
        contact_writer,
        custom_field_catalog::CustomFieldCatalog,
        custom_value_writer, deduplicator,
        external_sync::{ExternalSyncAdapter, SyncContact, SyncPlan},
        list_linker,
    },
};

type FamilyLocks = Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>;

/// Posse exclusiva da família. Ao sair, a entrada do mapa é removida
/// quando ninguém mais a segura nem espera por ela.
struct FamilyLease {
    locks: FamilyLocks,
    family_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FamilyLease {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.family_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.family_id);
        }
    }
}

/// Orquestra o pipeline de importação de uma família.
#[derive(Clone)]
pub struct ImportService {
    store: Arc<dyn ContactStore>,
    sync: Option<Arc<ExternalSyncAdapter>>,
    sync_in_background: bool,
    family_locks: FamilyLocks,
}

impl ImportService {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self {
            store,
            sync: None,
            sync_in_background: true,
            family_locks: FamilyLocks::default(),
        }
    }

    pub fn with_sync(mut self, adapter: ExternalSyncAdapter, in_background: bool) -> Self {
        self.sync = Some(Arc::new(adapter));
        self.sync_in_background = in_background;
        self
    }

    // =========================================================================
    //  CONSULTAS
    // =========================================================================

    /// Pré-visualização: janela de linhas, mapeamento proposto e catálogo.
    pub async fn preview(&self, family_id: Uuid, file: &ParsedFile) -> Result<ImportPreview, AppError> {
        let catalog = CustomFieldCatalog::load(self.store.as_ref(), family_id).await?;
        let detected = column_mapper::detect_email_column(file);

        Ok(ImportPreview {
            headers: file.headers.clone(),
            row_count: file.row_count(),
            preview_rows: file.preview(PREVIEW_ROWS).to_vec(),
            detected_email_column: detected.map(|c| file.headers[c].clone()),
            mapping: column_mapper::propose_mapping(file),
            custom_fields: catalog.into_definitions(),
        })
    }

    pub async fn list_custom_fields(&self, family_id: Uuid) -> Result<Vec<CustomFieldDefinition>, AppError> {
        self.store.list_custom_fields(family_id).await
    }

    pub async fn list_lists(&self, family_id: Uuid) -> Result<Vec<ContactList>, AppError> {
        self.store.list_lists(family_id).await
    }

    /// Validação interativa: mesmas regras da confirmação, sem escrita.
    pub async fn validate_mapping(
        &self,
        family_id: Uuid,
        headers: &[String],
        mapping: &ColumnMapping,
    ) -> Result<(), AppError> {
        let catalog = CustomFieldCatalog::load(self.store.as_ref(), family_id).await?;
        column_mapper::resolve(mapping, headers, &catalog).map(|_| ())
    }

    /// Cria o campo e, quando há coluna, aponta essa coluna para ele.
    pub async fn define_custom_field(
        &self,
        family_id: Uuid,
        request: &DefineFieldRequest,
    ) -> Result<DefinedField, AppError> {
        let _lease = self.acquire_family(family_id).await;

        // Coluna desconhecida é rejeitada antes de criar o campo
        if let Some(column) = &request.column {
            if !request.mapping.entries.is_empty() && request.mapping.get(column).is_none() {
                return Err(AppError::UnknownColumn(column.clone()));
            }
        }

        let mut catalog = CustomFieldCatalog::load(self.store.as_ref(), family_id).await?;
        let field = catalog
            .define(self.store.as_ref(), &request.field.name, request.field.field_type)
            .await?;

        let mut mapping = request.mapping.clone();
        if let Some(column) = &request.column {
            mapping.assign(column.clone(), AttributeKey::Custom(field.name.clone()));
        }

        Ok(DefinedField { field, mapping })
    }

    // =========================================================================
    //  IMPORTAÇÃO
    // =========================================================================

    pub async fn run_import(&self, file: &ParsedFile, request: ImportRequest) -> Result<ImportSummary, AppError> {
        let family_id = request.family_id;
        let _lease = self.acquire_family(family_id).await;

        let store = self.store.as_ref();
        let mut catalog = CustomFieldCatalog::load(store, family_id).await?;

        // 1. Tudo o que pode rejeitar a importação, antes de qualquer escrita
        column_mapper::validate(&request.mapping)?;
        column_mapper::check_headers(&request.mapping, &file.headers)?;
        let pending = check_new_fields(&catalog, &request.new_fields)?;
        if let Some(unknown) = request
            .mapping
            .custom_field_names()
            .into_iter()
            .find(|name| catalog.get(name).is_none() && !pending.contains(&name.trim().to_lowercase()))
        {
            return Err(AppError::UnknownCustomField(unknown.to_string()));
        }
        let lists = list_linker::resolve_selection(store, family_id, &request.list_ids).await?;

        // 2. Campos novos declarados na confirmação
        for field in &request.new_fields {
            catalog.define(store, &field.name, field.field_type).await?;
        }
        let mapping = column_mapper::resolve(&request.mapping, &file.headers, &catalog)?;

        // 3. Deduplicação
        let extracted = deduplicator::extract_candidates(file, &mapping);
        let outcome = deduplicator::partition(store, family_id, &extracted.candidates).await?;

        // 4. Contatos novos
        let created =
            contact_writer::create_contacts(store, family_id, request.owner_user_id, &outcome.to_create)
                .await?;

        let mut ids_by_email = outcome.existing_ids_by_email();
        ids_by_email.extend(created.iter().map(|c| (c.email.clone(), c.id)));

        // 5. Listas
        let linked: Vec<&Contact> = created.iter().chain(&outcome.already_exists).collect();
        let contact_ids: Vec<Uuid> = linked.iter().map(|c| c.id).collect();
        let memberships_created = list_linker::link(store, &contact_ids, &lists).await?;

        // 6. Valores personalizados
        let values = custom_value_writer::collect_values(file, &mapping, &ids_by_email);
        let custom_values_written = custom_value_writer::write_values(store, &values).await?;

        let list_ids: Vec<Uuid> = lists.iter().map(|l| l.id).collect();
        store.refresh_list_counts(&list_ids).await?;

        let mut summary = ImportSummary {
            contacts_created: created.len(),
            contacts_matched: outcome.already_exists.len(),
            rows_without_email: extracted.rows_without_email,
            duplicate_rows: outcome.repeated_rows,
            fields_created: request.new_fields.len(),
            memberships_created: memberships_created as usize,
            custom_values_written: custom_values_written as usize,
            list_ids,
            sync: None,
        };

        tracing::info!(
            %family_id,
            created = summary.contacts_created,
            matched = summary.contacts_matched,
            lists = ?summary.list_ids,
            "📥 Importação concluída"
        );

        // 7. Sincronização externa, depois de tudo gravado
        if let Some(adapter) = &self.sync {
            let plan = build_sync_plan(&mapping, &lists, &linked, &values);
            if !plan.is_empty() {
                if self.sync_in_background {
                    let adapter = Arc::clone(adapter);
                    tokio::spawn(async move {
                        adapter.run(&plan).await;
                    });
                } else {
                    summary.sync = Some(adapter.run(&plan).await);
                }
            }
        }

        Ok(summary)
    }

    /// Uma importação (ou criação de campo) por família de cada vez.
    async fn acquire_family(&self, family_id: Uuid) -> FamilyLease {
        let lock = {
            let mut locks = self
                .family_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(family_id).or_default())
        };

        FamilyLease {
            locks: Arc::clone(&self.family_locks),
            family_id,
            guard: Some(lock.lock_owned().await),
        }
    }
}

/// Nomes (minúsculos) dos campos a criar; rejeita nomes ocupados ou repetidos.
fn check_new_fields(
    catalog: &CustomFieldCatalog,
    new_fields: &[NewFieldRequest],
) -> Result<HashSet<String>, AppError> {
    let mut pending = HashSet::new();
    for field in new_fields {
        let name = catalog.check_available(&field.name)?;
        if !pending.insert(name.to_lowercase()) {
            return Err(AppError::DuplicateFieldName(name));
        }
    }
    Ok(pending)
}

fn build_sync_plan(
    mapping: &ResolvedMapping,
    lists: &[ContactList],
    contacts: &[&Contact],
    values: &[NewCustomFieldValue],
) -> SyncPlan {
    let names: HashMap<Uuid, &str> = mapping
        .custom
        .iter()
        .map(|(_, d)| (d.id, d.name.as_str()))
        .collect();

    let mut attributes: HashMap<Uuid, BTreeMap<String, String>> = HashMap::new();
    for value in values {
        if let Some(name) = names.get(&value.custom_field_id) {
            attributes
                .entry(value.contact_id)
                .or_default()
                .insert(name.to_string(), value.value.clone());
        }
    }

    let fields = mapping
        .custom
        .iter()
        .map(|(_, d)| (d.name.clone(), d.field_type))
        .collect();
    let contacts = contacts
        .iter()
        .map(|c| SyncContact::from_contact(c, attributes.remove(&c.id).unwrap_or_default()))
        .collect();

    SyncPlan::new(fields, lists, contacts)
}
