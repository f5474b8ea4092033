use std::time::Duration;

use async_trait::async_trait;

use super::BackendClient;
use crate::types::BackendReply;

/// Development stand-in used when no inference server is configured.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBackendClient {
    delay: Duration,
}

impl SimulatedBackendClient {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl BackendClient for SimulatedBackendClient {
    async fn send(&self, message: &str) -> BackendReply {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        BackendReply::success(format!(
            "This is a simulated response from the chatbot. In a real implementation, \
             this would be the response from the backend processing: \"{message}\""
        ))
    }
}
