mod http;
mod simulated;

use async_trait::async_trait;

use crate::types::BackendReply;

pub use http::HttpBackendClient;
pub use simulated::SimulatedBackendClient;

/// Text shown to the user whenever the backend could not produce a reply.
pub const FALLBACK_REPLY: &str = "Sorry, there was an error connecting to the chatbot server.";

/// One message in, one reply out. Implementations absorb every failure into
/// a [`BackendReply`] with error status; callers never see an `Err`.
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn send(&self, message: &str) -> BackendReply;
}
