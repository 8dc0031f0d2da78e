// src/services/column_mapper.rs

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    common::error::AppError,
    models::import::{AttributeKey, BuiltinAttribute, ColumnMapping, ParsedFile, ResolvedMapping},
    services::custom_field_catalog::CustomFieldCatalog,
};

/// Linhas examinadas pela detecção automática.
pub const PREVIEW_ROWS: usize = 10;

// Leniente de propósito: qualquer coisa com "@" e um ponto no domínio.
static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("regex de e-mail válida"));

pub fn looks_like_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value.trim())
}

/// Primeira coluna (na ordem do cabeçalho) com um e-mail na janela de pré-visualização.
pub fn detect_email_column(file: &ParsedFile) -> Option<usize> {
    let preview = file.preview(PREVIEW_ROWS);
    (0..file.headers.len()).find(|&column| {
        preview
            .iter()
            .any(|row| row.get(column).is_some_and(|cell| looks_like_email(cell)))
    })
}

/// Mapeamento inicial: a coluna detectada vai para `email`, o resto é ignorado.
pub fn propose_mapping(file: &ParsedFile) -> ColumnMapping {
    let email_column = detect_email_column(file);

    file.headers
        .iter()
        .enumerate()
        .map(|(index, header)| {
            let target = if Some(index) == email_column {
                AttributeKey::Builtin(BuiltinAttribute::Email)
            } else {
                AttributeKey::Ignore
            };
            (header.clone(), target)
        })
        .collect()
}

/// Regras do mapeamento, na ordem: e-mail obrigatório, depois unicidade dos destinos.
pub fn validate(mapping: &ColumnMapping) -> Result<(), AppError> {
    let has_email = mapping
        .active()
        .any(|(_, target)| *target == AttributeKey::Builtin(BuiltinAttribute::Email));
    if !has_email {
        return Err(AppError::MissingEmailMapping);
    }

    let mut seen = HashSet::new();
    for (_, target) in mapping.active() {
        if !seen.insert(target.identity()) {
            return Err(AppError::DuplicateAttributeMapping(target.to_string()));
        }
    }

    Ok(())
}

/// Toda coluna ativa do mapeamento precisa existir no cabeçalho.
pub fn check_headers(mapping: &ColumnMapping, headers: &[String]) -> Result<(), AppError> {
    match mapping.active().find(|(header, _)| !headers.contains(header)) {
        Some((header, _)) => Err(AppError::UnknownColumn(header.clone())),
        None => Ok(()),
    }
}

/// Valida e resolve o mapeamento contra o cabeçalho do arquivo e o catálogo da família.
pub fn resolve(
    mapping: &ColumnMapping,
    headers: &[String],
    catalog: &CustomFieldCatalog,
) -> Result<ResolvedMapping, AppError> {
    validate(mapping)?;

    let mut builtins = Vec::new();
    let mut custom = Vec::new();
    let mut email_column = None;

    for (header, target) in mapping.active() {
        let column = headers
            .iter()
            .position(|h| h == header)
            .ok_or_else(|| AppError::UnknownColumn(header.clone()))?;

        match target {
            AttributeKey::Builtin(attribute) => {
                if *attribute == BuiltinAttribute::Email {
                    email_column = Some(column);
                }
                builtins.push((column, *attribute));
            }
            AttributeKey::Custom(name) => {
                let definition = catalog
                    .get(name)
                    .ok_or_else(|| AppError::UnknownCustomField(name.clone()))?;
                custom.push((column, definition.clone()));
            }
            AttributeKey::Ignore => {}
        }
    }

    Ok(ResolvedMapping {
        builtins,
        // validate() garante a coluna de e-mail
        email_column: email_column.ok_or(AppError::MissingEmailMapping)?,
        custom,
    })
}
