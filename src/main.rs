use session_auth::{
    create_routes, middleware::cors_layer, AppState, AuthConfig, AuthService, LogFormat,
    MemoryUserStore, PgUserStore, ServerConfig, UserStore,
};

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let server_config = ServerConfig::from_env()?;
    init_tracing(server_config.log_format);

    let auth_config = AuthConfig::from_env(server_config.environment)?;
    auth_config.validate()?;

    tracing::info!(environment = %server_config.environment, "Starting session-auth");

    let store: Arc<dyn UserStore> = match &server_config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            Arc::new(PgUserStore::connect(url).await?)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, users are kept in memory and lost on restart");
            Arc::new(MemoryUserStore::new())
        }
    };

    let auth = AuthService::new(store, auth_config)?;
    let mut app = create_routes(AppState::new(auth, server_config.environment));

    if let Some(origin) = &server_config.cors_origin {
        app = app.layer(cors_layer(origin)?);
        tracing::info!(%origin, "CORS enabled");
    }

    let listener = tokio::net::TcpListener::bind(server_config.bind_address()).await?;
    tracing::info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
