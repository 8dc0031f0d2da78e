// src/services/custom_value_writer.rs

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ContactStore,
    models::{
        contacts::NewCustomFieldValue,
        import::{ParsedFile, ResolvedMapping},
    },
    services::deduplicator::normalize_email,
};

/// Um valor por célula não vazia de coluna personalizada, para toda linha cujo
/// e-mail leva a um contato conhecido (inclusive linhas repetidas).
pub fn collect_values(
    file: &ParsedFile,
    mapping: &ResolvedMapping,
    contact_ids: &HashMap<String, Uuid>,
) -> Vec<NewCustomFieldValue> {
    if mapping.custom.is_empty() {
        return Vec::new();
    }

    let mut values = Vec::new();
    for row in 0..file.row_count() {
        let email = normalize_email(file.cell(row, mapping.email_column));
        let Some(&contact_id) = contact_ids.get(&email) else {
            continue;
        };

        for (column, definition) in &mapping.custom {
            let cell = file.cell(row, *column).trim();
            if cell.is_empty() {
                continue;
            }
            values.push(NewCustomFieldValue {
                contact_id,
                custom_field_id: definition.id,
                value: cell.to_string(),
            });
        }
    }

    values
}

/// Apenas acrescenta: reimportar o mesmo arquivo grava os valores de novo.
pub async fn write_values(
    store: &dyn ContactStore,
    values: &[NewCustomFieldValue],
) -> Result<u64, AppError> {
    if values.is_empty() {
        return Ok(0);
    }
    store.insert_custom_field_values(values).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        contacts::{CustomFieldDefinition, CustomFieldType},
        import::BuiltinAttribute,
    };
    use chrono::Utc;

    #[test]
    fn blank_cells_produce_no_value() {
        let field = CustomFieldDefinition {
            id: Uuid::new_v4(),
            family_id: Uuid::new_v4(),
            name: "Niveau".into(),
            field_type: CustomFieldType::Text,
            created_at: Utc::now(),
        };
        let file = ParsedFile {
            headers: vec!["Email".into(), "Niveau".into()],
            rows: vec![
                vec!["alice@x.com".into(), " Gold ".into()],
                vec!["bob@x.com".into(), "   ".into()],
                vec!["inconnu@x.com".into(), "Silver".into()],
            ],
        };
        let mapping = ResolvedMapping {
            builtins: vec![(0, BuiltinAttribute::Email)],
            email_column: 0,
            custom: vec![(1, field.clone())],
        };
        let ids: HashMap<String, Uuid> = [
            ("alice@x.com".to_string(), Uuid::new_v4()),
            ("bob@x.com".to_string(), Uuid::new_v4()),
        ]
        .into_iter()
        .collect();

        let values = collect_values(&file, &mapping, &ids);

        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, "Gold");
        assert_eq!(values[0].custom_field_id, field.id);
        assert_eq!(values[0].contact_id, ids["alice@x.com"]);
    }
}
