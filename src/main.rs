use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use zwapgrid_partner::api::{create_router, AppState};
use zwapgrid_partner::client::ApiClient;
use zwapgrid_partner::config::{self, encryption_key_from_env};
use zwapgrid_partner::flow::EmbedFlow;
use zwapgrid_partner::users::SqliteUserStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zwapgrid_partner=info".into()),
        )
        .init();

    info!("Zwapgrid partner host starting...");

    let config = config::load_from_env()?;
    info!(
        api_url = %config.zwapgrid.api_url,
        app_url = %config.zwapgrid.app_url,
        serialize_per_user = config.flows.serialize_per_user,
        "Configuration loaded"
    );

    let key = encryption_key_from_env()?;
    let users = SqliteUserStore::new(&config.storage.database_path, &key)
        .context("Failed to open user store")?;
    info!(path = %config.storage.database_path, "User store opened");

    let client = ApiClient::new(&config.zwapgrid, Arc::new(users))
        .context("Failed to build marketplace client")?;
    let flow = EmbedFlow::new(Arc::new(client), &config);

    let app = create_router(AppState {
        flow: Arc::new(flow),
    });

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!(addr = %config.server.bind, "HTTP server listening");

    axum::serve(listener, app).await.context("HTTP server error")?;

    Ok(())
}
