//src/main.rs

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use contacts_import::config::{AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let config = Config::from_env()?;
    let app_state = AppState::new(&config).await?;

    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .map_err(|e| anyhow::anyhow!("Falha ao rodar as migrações do banco de dados: {e}"))?;

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let app = contacts_import::app(app_state, config.max_upload_bytes);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
