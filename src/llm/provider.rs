use async_trait::async_trait;

use crate::errors::DroidClawResult;
use crate::llm::types::ChatMessage;

/// A chat-completion backend. Implementations map transport, auth and quota
/// failures onto distinct `DroidClawError` variants and never retry.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Send the whole ordered conversation and return the completion text.
    async fn send(&self, messages: &[ChatMessage]) -> DroidClawResult<String>;
}
