//! The seam between the orchestrator and a language-model backend.

use crate::error::Result;
use async_trait::async_trait;

/// A text-completion backend.
///
/// `is_configured` and `issue` are cheap and never touch the network. The
/// orchestrator checks them before every call so an unconfigured backend
/// fails fast with a readable message.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Short human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Whether [`chat`](Self::chat) has a chance of succeeding.
    fn is_configured(&self) -> bool;

    /// Why the backend is not usable. Empty when configured.
    fn issue(&self) -> String;

    /// Sends one prompt and returns the model's text.
    async fn chat(&self, prompt: &str) -> Result<String>;
}
