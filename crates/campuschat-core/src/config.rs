use std::{env, net::SocketAddr, time::Duration};

pub const DEFAULT_BACKEND_BASE_URL: &str = "http://localhost:8888";
pub const DEFAULT_BACKEND_ENDPOINT: &str = "/api/chatbot";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_bind: SocketAddr,
    pub backend_mode: String,
    pub backend_base_url: Option<String>,
    pub backend_endpoint: String,
    pub backend_timeout: Duration,
    pub simulated_reply_delay: Duration,
    pub auth_handshake_delay: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = env::var("PORT").unwrap_or_else(|_| "8080".to_owned());
        let http_bind = env::var("HTTP_BIND").unwrap_or_else(|_| format!("0.0.0.0:{port}"));
        let http_bind = http_bind.parse()?;

        Ok(Self {
            http_bind,
            backend_mode: env::var("BACKEND_MODE").unwrap_or_else(|_| "auto".to_owned()),
            backend_base_url: env::var("BACKEND_BASE_URL")
                .ok()
                .filter(|raw| !raw.trim().is_empty()),
            backend_endpoint: env::var("BACKEND_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_BACKEND_ENDPOINT.to_owned()),
            backend_timeout: Duration::from_millis(env_u64("BACKEND_TIMEOUT_MS", 10_000)),
            simulated_reply_delay: Duration::from_millis(env_u64("SIMULATED_REPLY_DELAY_MS", 1_000)),
            auth_handshake_delay: Duration::from_millis(env_u64("AUTH_HANDSHAKE_DELAY_MS", 1_500)),
        })
    }

    /// Full URL of the message endpoint, falling back to the local default
    /// server when no base URL is configured.
    pub fn backend_url(&self) -> String {
        let base = self
            .backend_base_url
            .as_deref()
            .unwrap_or(DEFAULT_BACKEND_BASE_URL);
        join_url(base, &self.backend_endpoint)
    }
}

fn join_url(base: &str, endpoint: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    let endpoint = endpoint.trim().trim_start_matches('/');
    if endpoint.is_empty() {
        base.to_owned()
    } else {
        format!("{base}/{endpoint}")
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(default)
}
