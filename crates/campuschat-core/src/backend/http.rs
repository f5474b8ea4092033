use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{BackendClient, FALLBACK_REPLY};
use crate::types::{BackendReply, ReplyStatus};

#[derive(Debug, Clone)]
pub struct HttpBackendClient {
    client: Client,
    endpoint: String,
}

impl HttpBackendClient {
    /// `timeout` bounds the whole exchange, connect through body.
    pub fn new(endpoint: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn exchange(&self, message: &str) -> anyhow::Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&MessageRequest { message })
            .send()
            .await?
            .error_for_status()?
            .json::<MessageResponse>()
            .await?;

        match response.status {
            ReplyStatus::Success => Ok(response.response),
            ReplyStatus::Error => Err(anyhow::anyhow!(
                "backend reported error: {}",
                response.response
            )),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    response: String,
    status: ReplyStatus,
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn send(&self, message: &str) -> BackendReply {
        debug!(endpoint = %self.endpoint, chars = message.chars().count(), "sending message to backend");
        match self.exchange(message).await {
            Ok(text) => BackendReply::success(text),
            Err(error) => {
                warn!(?error, endpoint = %self.endpoint, "backend message exchange failed");
                BackendReply::error(FALLBACK_REPLY)
            }
        }
    }
}
