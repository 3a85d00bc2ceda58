//! Folio Server - Production Bootstrap

use tracing::info;

use folio_server::{
    create_api_router, initialize_server, log_config_summary, spawn_maintenance_tasks,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    info!("🚀 Starting Folio Server");

    let components = initialize_server().await.map_err(|e| {
        tracing::error!("❌ Failed to initialize server: {}", e);
        e
    })?;
    log_config_summary(&components.config);

    spawn_maintenance_tasks(&components);
    info!("✅ Maintenance tasks scheduled");

    let host = components.config.host.clone();
    let port = components.config.port;
    let app = create_api_router(components);

    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    info!("✅ Server listening on http://{host}:{port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("✅ Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("🛑 Received Ctrl-C, initiating graceful shutdown..."),
        Err(err) => tracing::error!("Failed to listen for Ctrl-C signal: {}", err),
    }
}
