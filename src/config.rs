// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{ContactRepository, FamilyRepository},
    services::{
        external_sync::MAX_SYNC_WORKERS, ExternalSyncAdapter, HttpMarketingClient, ImportService,
        SyncSettings,
    },
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Configuração lida do ambiente (e do `.env`, quando existir).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub max_upload_bytes: usize,
    pub sync: SyncSettings,
    pub marketing_api_url: Option<String>,
    pub marketing_api_key: Option<String>,
    pub sync_in_background: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{key} deve ser definida"))
        };
        let parsed = |key: &str, default: u64| -> anyhow::Result<u64> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{key} inválida: {raw}")),
                None => Ok(default),
            }
        };

        let workers = parsed("IMPORT_SYNC_WORKERS", 8)? as usize;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            db_max_connections: parsed("DB_MAX_CONNECTIONS", 5)? as u32,
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES as u64)? as usize,
            sync: SyncSettings {
                workers: workers.clamp(1, MAX_SYNC_WORKERS),
                call_timeout: Duration::from_secs(parsed("IMPORT_SYNC_TIMEOUT_SECS", 10)?),
                retry_backoff: Duration::from_millis(parsed("IMPORT_SYNC_RETRY_BACKOFF_MS", 500)?),
            },
            marketing_api_url: lookup("MARKETING_API_URL").filter(|v| !v.trim().is_empty()),
            marketing_api_key: lookup("MARKETING_API_KEY").filter(|v| !v.trim().is_empty()),
            sync_in_background: lookup("IMPORT_SYNC_IN_BACKGROUND")
                .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no"))
                .unwrap_or(true),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_secret: String,
    pub family_repo: FamilyRepository,
    pub import_service: ImportService,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let family_repo = FamilyRepository::new(db_pool.clone());
        let store = Arc::new(ContactRepository::new(db_pool.clone()));
        let mut import_service = ImportService::new(store);

        match &config.marketing_api_url {
            Some(url) => {
                let client = HttpMarketingClient::new(url, config.marketing_api_key.clone());
                let adapter = ExternalSyncAdapter::new(Arc::new(client), config.sync);
                import_service = import_service.with_sync(adapter, config.sync_in_background);
                tracing::info!(url = %url, "🔄 Sincronização externa habilitada");
            }
            None => tracing::info!("Sincronização externa desabilitada (MARKETING_API_URL ausente)"),
        }

        Ok(Self {
            db_pool,
            jwt_secret: config.jwt_secret.clone(),
            family_repo,
            import_service,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config =
            Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("JWT_SECRET", "s")])).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.sync.workers, 8);
        assert_eq!(config.sync.call_timeout, Duration::from_secs(10));
        assert!(config.marketing_api_url.is_none());
        assert!(config.sync_in_background);
    }

    #[test]
    fn workers_are_clamped() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("IMPORT_SYNC_WORKERS", "500"),
            ("IMPORT_SYNC_IN_BACKGROUND", "false"),
        ]))
        .unwrap();

        assert_eq!(config.sync.workers, MAX_SYNC_WORKERS);
        assert!(!config.sync_in_background);
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }
}
