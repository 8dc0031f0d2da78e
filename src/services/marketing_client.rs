// src/services/marketing_client.rs

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

use crate::{
    models::contacts::CustomFieldType,
    services::external_sync::{MarketingService, SyncContact, SyncError},
};

#[derive(Serialize)]
struct DeclareFieldBody<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    field_type: &'a str,
}

/// Cliente HTTP da plataforma de marketing. O timeout por chamada é
/// aplicado por quem chama (`ExternalSyncAdapter`).
#[derive(Clone)]
pub struct HttpMarketingClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpMarketingClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }
        request
    }

    async fn send(&self, request: reqwest::RequestBuilder, accept: &[StatusCode]) -> Result<(), SyncError> {
        let response = request
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() || accept.contains(&status) {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SyncError::Remote {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl MarketingService for HttpMarketingClient {
    async fn declare_field(
        &self,
        list_handle: &str,
        field_name: &str,
        field_type: CustomFieldType,
    ) -> Result<(), SyncError> {
        let request = self
            .request(reqwest::Method::POST, &format!("/lists/{list_handle}/fields"))
            .json(&DeclareFieldBody {
                name: field_name,
                field_type: field_type.external_name(),
            });

        // 409: o campo já existe, que é exatamente o estado desejado
        self.send(request, &[StatusCode::CONFLICT]).await
    }

    async fn upsert_contact(&self, list_handle: &str, contact: &SyncContact) -> Result<(), SyncError> {
        let request = self
            .request(reqwest::Method::PUT, &format!("/lists/{list_handle}/contacts"))
            .json(contact);

        self.send(request, &[]).await
    }
}
