// src/services/list_linker.rs

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ContactStore,
    models::contacts::{ContactList, ListMembership},
};

/// Regras de seleção, checadas antes de qualquer escrita:
/// ao menos uma lista, todas da família, e "Aucune liste" sempre sozinha.
pub fn check_selection(requested: &[Uuid], found: &[ContactList]) -> Result<(), AppError> {
    if requested.is_empty() {
        return Err(AppError::NoListSelected);
    }

    if let Some(missing) = requested
        .iter()
        .find(|id| !found.iter().any(|list| list.id == **id))
    {
        return Err(AppError::ListNotFound(*missing));
    }

    if found.len() > 1 && found.iter().any(ContactList::is_no_list_sentinel) {
        return Err(AppError::ConflictingListSelection);
    }

    Ok(())
}

/// Carrega as listas pedidas (sem repetição) e aplica [`check_selection`].
pub async fn resolve_selection(
    store: &dyn ContactStore,
    family_id: Uuid,
    list_ids: &[Uuid],
) -> Result<Vec<ContactList>, AppError> {
    let mut seen = HashSet::new();
    let requested: Vec<Uuid> = list_ids.iter().copied().filter(|id| seen.insert(*id)).collect();

    let found = if requested.is_empty() {
        Vec::new()
    } else {
        store.find_lists(family_id, &requested).await?
    };

    check_selection(&requested, &found)?;
    Ok(found)
}

/// Liga cada contato a cada lista. Idempotente: as arestas já existentes são
/// lidas num único lote e só as que faltam são inseridas.
pub async fn link(
    store: &dyn ContactStore,
    contact_ids: &[Uuid],
    lists: &[ContactList],
) -> Result<u64, AppError> {
    let list_ids: Vec<Uuid> = lists.iter().map(|l| l.id).collect();
    if contact_ids.is_empty() || list_ids.is_empty() {
        return Ok(0);
    }

    let existing: HashSet<ListMembership> = store
        .find_memberships(contact_ids, &list_ids)
        .await?
        .into_iter()
        .collect();

    let mut pending = HashSet::new();
    let missing: Vec<ListMembership> = contact_ids
        .iter()
        .flat_map(|&contact_id| {
            list_ids.iter().map(move |&list_id| ListMembership { contact_id, list_id })
        })
        .filter(|edge| !existing.contains(edge) && pending.insert(*edge))
        .collect();

    let inserted = store.insert_memberships(&missing).await?;
    tracing::debug!(
        already_linked = existing.len(),
        inserted,
        "Vínculos contato-lista gravados"
    );
    Ok(inserted)
}
