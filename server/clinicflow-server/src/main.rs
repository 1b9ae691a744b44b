use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clinicflow_server::{create_app, ClinicFlowServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    let bind_addr = config.bind_addr.clone();

    let server = ClinicFlowServer::from_env(config).await?;
    let app = create_app(server);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "ClinicFlow server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
