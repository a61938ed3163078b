use std::sync::Arc;

use stockbook_api::app::{build_app, services};
use stockbook_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockbook_observability::init();

    let config = ApiConfig::from_env()?;
    let services = Arc::new(services::build_services(&config).await?);
    let app = build_app(config.jwt_secret.clone(), services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
