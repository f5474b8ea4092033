use std::sync::Arc;

use campuschat_core::{
    backend::{BackendClient, HttpBackendClient, SimulatedBackendClient},
    config::AppConfig,
    http::{self, AppState},
    session::{ChatSession, LocalAuthenticator},
};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;

    let backend = build_backend_client(&config)?;
    let session = ChatSession::new(
        backend,
        Arc::new(LocalAuthenticator::new(config.auth_handshake_delay)),
    );

    let app = http::router(AppState { session });
    let listener = TcpListener::bind(config.http_bind).await?;
    info!("CampusChat HTTP API listening on {}", config.http_bind);

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .init();
}

fn build_backend_client(config: &AppConfig) -> anyhow::Result<Arc<dyn BackendClient>> {
    let mode = config.backend_mode.to_lowercase();
    match mode.as_str() {
        "http" => http_backend(config),
        "simulated" => {
            warn!("BACKEND_MODE=simulated; replies are fabricated locally");
            Ok(simulated_backend(config))
        }
        "auto" => {
            if config.backend_base_url.is_some() {
                http_backend(config)
            } else {
                warn!("BACKEND_BASE_URL not set; using simulated backend");
                Ok(simulated_backend(config))
            }
        }
        other => {
            warn!(
                mode = %other,
                "unknown BACKEND_MODE value; valid values are auto|http|simulated; falling back to auto"
            );
            if config.backend_base_url.is_some() {
                http_backend(config)
            } else {
                Ok(simulated_backend(config))
            }
        }
    }
}

fn http_backend(config: &AppConfig) -> anyhow::Result<Arc<dyn BackendClient>> {
    let client = HttpBackendClient::new(config.backend_url(), config.backend_timeout)?;
    info!(
        endpoint = %client.endpoint(),
        timeout_ms = config.backend_timeout.as_millis() as u64,
        "using HTTP inference backend"
    );
    Ok(Arc::new(client))
}

fn simulated_backend(config: &AppConfig) -> Arc<dyn BackendClient> {
    Arc::new(SimulatedBackendClient::new(config.simulated_reply_delay))
}
