// src/services/contact_writer.rs

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ContactStore,
    models::contacts::{Contact, NewContact},
};

/// Grava os contatos novos num único lote. Contatos existentes não são tocados.
pub async fn create_contacts(
    store: &dyn ContactStore,
    family_id: Uuid,
    owner_user_id: Uuid,
    to_create: &[NewContact],
) -> Result<Vec<Contact>, AppError> {
    if to_create.is_empty() {
        return Ok(Vec::new());
    }

    let created = store
        .insert_contacts(family_id, owner_user_id, to_create)
        .await
        .inspect_err(|e| {
            tracing::error!(%family_id, batch = to_create.len(), "🔥 Lote de contatos rejeitado: {e}");
        })?;

    tracing::info!(%family_id, created = created.len(), "✅ Contatos criados");
    Ok(created)
}
