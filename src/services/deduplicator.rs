// src/services/deduplicator.rs

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ContactStore,
    models::{
        contacts::{Contact, NewContact},
        import::{BuiltinAttribute, ParsedFile, ResolvedMapping},
    },
};

/// Chave de deduplicação: e-mail sem espaços e em minúsculas.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[derive(Debug, Default)]
pub struct ExtractedRows {
    // Uma por linha com e-mail, na ordem do arquivo
    pub candidates: Vec<NewContact>,
    pub rows_without_email: usize,
}

/// Extrai os atributos nativos de cada linha; linhas sem e-mail não são importáveis.
pub fn extract_candidates(file: &ParsedFile, mapping: &ResolvedMapping) -> ExtractedRows {
    let mut extracted = ExtractedRows::default();

    for row in 0..file.row_count() {
        let email = normalize_email(file.cell(row, mapping.email_column));
        if email.is_empty() {
            extracted.rows_without_email += 1;
            continue;
        }

        let mut contact = NewContact {
            email,
            ..Default::default()
        };
        for &(column, attribute) in &mapping.builtins {
            let value = file.cell(row, column).trim();
            let value = (!value.is_empty()).then(|| value.to_string());
            match attribute {
                BuiltinAttribute::Prenom => contact.prenom = value,
                BuiltinAttribute::Nom => contact.nom = value,
                BuiltinAttribute::Entreprise => contact.entreprise = value,
                BuiltinAttribute::Telephone => contact.telephone = value,
                BuiltinAttribute::Email => {}
            }
        }

        extracted.candidates.push(contact);
    }

    extracted
}

#[derive(Debug, Default)]
pub struct DedupOutcome {
    /// Um por e-mail: a primeira ocorrência no arquivo.
    pub to_create: Vec<NewContact>,
    /// Contatos da família que já tinham um dos e-mails.
    pub already_exists: Vec<Contact>,
    /// Linhas que repetem um e-mail já visto no mesmo arquivo.
    pub repeated_rows: usize,
}

impl DedupOutcome {
    pub fn existing_ids_by_email(&self) -> HashMap<String, Uuid> {
        self.already_exists
            .iter()
            .map(|c| (normalize_email(&c.email), c.id))
            .collect()
    }
}

/// Separa os candidatos entre "novos" e "já existentes" com uma única
/// consulta por família.
pub async fn partition(
    store: &dyn ContactStore,
    family_id: Uuid,
    candidates: &[NewContact],
) -> Result<DedupOutcome, AppError> {
    // 1. E-mails distintos, na ordem do arquivo
    let mut seen = HashSet::new();
    let mut distinct = Vec::new();
    let mut repeated_rows = 0;
    for candidate in candidates {
        if seen.insert(candidate.email.as_str()) {
            distinct.push(candidate);
        } else {
            repeated_rows += 1;
        }
    }

    let emails: Vec<String> = distinct.iter().map(|c| c.email.clone()).collect();

    // 2. Busca em lote
    let already_exists = store.find_contacts_by_emails(family_id, &emails).await?;
    let known: HashSet<String> = already_exists
        .iter()
        .map(|c| normalize_email(&c.email))
        .collect();

    // 3. Partição
    let to_create = distinct
        .into_iter()
        .filter(|c| !known.contains(&c.email))
        .cloned()
        .collect();

    Ok(DedupOutcome {
        to_create,
        already_exists,
        repeated_rows,
    })
}
