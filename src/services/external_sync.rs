// src/services/external_sync.rs

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    contacts::{Contact, ContactList, CustomFieldType},
    import::{SyncFailure, SyncReport},
};

/// Canal de erro próprio da sincronização: nunca vira `AppError`.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("tempo esgotado após {0:?}")]
    Timeout(Duration),

    #[error("falha de transporte: {0}")]
    Transport(String),

    #[error("resposta {status}: {body}")]
    Remote { status: u16, body: String },
}

/// Contato como enviado à plataforma de marketing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncContact {
    pub contact_id: Uuid,
    pub email: String,
    pub attributes: BTreeMap<String, String>,
}

impl SyncContact {
    /// Atributos nativos preenchidos + valores personalizados desta importação.
    pub fn from_contact(contact: &Contact, custom: BTreeMap<String, String>) -> Self {
        let mut attributes = custom;
        let builtins = [
            ("prenom", &contact.prenom),
            ("nom", &contact.nom),
            ("entreprise", &contact.entreprise),
            ("telephone", &contact.telephone),
        ];
        for (key, value) in builtins {
            if let Some(value) = value {
                attributes.insert(key.to_string(), value.clone());
            }
        }

        Self {
            contact_id: contact.id,
            email: contact.email.clone(),
            attributes,
        }
    }
}

/// As duas operações consumidas da plataforma de marketing.
#[async_trait]
pub trait MarketingService: Send + Sync {
    async fn declare_field(
        &self,
        list_handle: &str,
        field_name: &str,
        field_type: CustomFieldType,
    ) -> Result<(), SyncError>;

    async fn upsert_contact(&self, list_handle: &str, contact: &SyncContact) -> Result<(), SyncError>;
}

pub const MAX_SYNC_WORKERS: usize = 20;

#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub workers: usize,
    pub call_timeout: Duration,
    pub retry_backoff: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            workers: 8,
            call_timeout: Duration::from_secs(10),
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// O que empurrar depois do commit.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub fields: Vec<(String, CustomFieldType)>,
    // Apenas listas com identificador externo
    pub lists: Vec<ContactList>,
    pub contacts: Vec<SyncContact>,
}

impl SyncPlan {
    pub fn new(
        fields: Vec<(String, CustomFieldType)>,
        lists: &[ContactList],
        contacts: Vec<SyncContact>,
    ) -> Self {
        Self {
            fields,
            lists: lists
                .iter()
                .filter(|l| l.external_list_handle.is_some())
                .cloned()
                .collect(),
            contacts,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty() || (self.fields.is_empty() && self.contacts.is_empty())
    }

    fn targets(&self) -> impl Iterator<Item = (Uuid, &str)> {
        self.lists
            .iter()
            .filter_map(|l| l.external_list_handle.as_deref().map(|h| (l.id, h)))
    }
}

/// Sincronização "best-effort": cada par (item, lista) é tentado de forma
/// isolada, com no máximo um retry; as falhas só são registradas.
#[derive(Clone)]
pub struct ExternalSyncAdapter {
    service: Arc<dyn MarketingService>,
    settings: SyncSettings,
}

impl ExternalSyncAdapter {
    pub fn new(service: Arc<dyn MarketingService>, mut settings: SyncSettings) -> Self {
        settings.workers = settings.workers.clamp(1, MAX_SYNC_WORKERS);
        Self { service, settings }
    }

    pub async fn run(&self, plan: &SyncPlan) -> SyncReport {
        let mut report = SyncReport::default();
        if plan.is_empty() {
            return report;
        }

        // Fase 1: os campos precisam existir antes que os contatos os referenciem
        let field_jobs: Vec<(Uuid, String, String, CustomFieldType)> = plan
            .targets()
            .flat_map(|(list_id, handle)| {
                plan.fields
                    .iter()
                    .map(move |(name, field_type)| (list_id, handle.to_string(), name.clone(), *field_type))
            })
            .collect();

        let results: Vec<_> = stream::iter(field_jobs)
            .map(|(list_id, handle, name, field_type)| {
                let service = Arc::clone(&self.service);
                let settings = self.settings;
                async move {
                    let outcome = call_with_retry(settings, || {
                        service.declare_field(&handle, &name, field_type)
                    })
                    .await;
                    (list_id, name, outcome)
                }
            })
            .buffer_unordered(self.settings.workers)
            .collect()
            .await;

        for (list_id, name, outcome) in results {
            match outcome {
                Ok(()) => report.fields_declared += 1,
                Err(e) => {
                    tracing::warn!(%list_id, field = %name, "⚠️ Declaração de campo abandonada: {e}");
                    report.failures.push(SyncFailure {
                        list_id,
                        subject: name,
                        error: e.to_string(),
                    });
                }
            }
        }

        // Fase 2: contatos
        let contact_jobs: Vec<(Uuid, String, SyncContact)> = plan
            .targets()
            .flat_map(|(list_id, handle)| {
                plan.contacts
                    .iter()
                    .map(move |contact| (list_id, handle.to_string(), contact.clone()))
            })
            .collect();

        let results: Vec<_> = stream::iter(contact_jobs)
            .map(|(list_id, handle, contact)| {
                let service = Arc::clone(&self.service);
                let settings = self.settings;
                async move {
                    let outcome =
                        call_with_retry(settings, || service.upsert_contact(&handle, &contact)).await;
                    (list_id, contact, outcome)
                }
            })
            .buffer_unordered(self.settings.workers)
            .collect()
            .await;

        for (list_id, contact, outcome) in results {
            match outcome {
                Ok(()) => report.contacts_pushed += 1,
                Err(e) => {
                    tracing::warn!(
                        %list_id,
                        contact_id = %contact.contact_id,
                        email = %contact.email,
                        "⚠️ Envio de contato abandonado: {e}"
                    );
                    report.failures.push(SyncFailure {
                        list_id,
                        subject: contact.email,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            fields = report.fields_declared,
            contacts = report.contacts_pushed,
            failures = report.failures.len(),
            "🔄 Sincronização externa concluída"
        );
        report
    }
}

/// Uma tentativa, espera `retry_backoff`, e uma segunda tentativa.
async fn call_with_retry<F, Fut>(settings: SyncSettings, call: F) -> Result<(), SyncError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), SyncError>>,
{
    match call_once(settings.call_timeout, call()).await {
        Ok(()) => Ok(()),
        Err(first) => {
            tracing::debug!("Nova tentativa após falha: {first}");
            tokio::time::sleep(settings.retry_backoff).await;
            call_once(settings.call_timeout, call()).await
        }
    }
}

async fn call_once<Fut>(limit: Duration, call: Fut) -> Result<(), SyncError>
where
    Fut: Future<Output = Result<(), SyncError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(SyncError::Timeout(limit)))
}
