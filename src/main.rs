// Entry point for the lodge rates HTTP service

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lodge_rates::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use lodge_rates::{
    create_router, AppState, AuditLog, Config, LogFormat, RatesApiClient, RatesService,
    RatesTransformer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    init_tracing(&config);
    info!("Starting lodge rates service");

    if config.accept_invalid_certs {
        warn!(url = %config.rates_url, "TLS certificate verification is disabled for the rates API");
    }

    let client = RatesApiClient::new(config.client_config())?;
    let mut service = RatesService::new(RatesTransformer::new(config.unit_table()), Arc::new(client));

    if let Some(path) = config.audit_log_path() {
        let audit = AuditLog::open(path)
            .await
            .with_context(|| format!("Failed to open audit log {}", path.display()))?;
        info!(path = %path.display(), "Audit log enabled");
        service = service.with_audit_log(audit);
    }

    let app = create_router(AppState {
        service: Arc::new(service),
        expose_error_trace: config.expose_error_trace,
    });

    let address = config.address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
