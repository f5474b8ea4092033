use std::time::Duration;

use async_trait::async_trait;

use crate::types::UserInfo;

/// The asynchronous step between committing an identity and being let into
/// the chat. Returning `Err` keeps the session on the registration form.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn verify(&self, identity: &UserInfo) -> anyhow::Result<()>;
}

/// Accepts every validated identity after a fixed delay. There is no
/// credential store behind it.
#[derive(Debug, Clone, Default)]
pub struct LocalAuthenticator {
    delay: Duration,
}

impl LocalAuthenticator {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Authenticator for LocalAuthenticator {
    async fn verify(&self, _identity: &UserInfo) -> anyhow::Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }
}
