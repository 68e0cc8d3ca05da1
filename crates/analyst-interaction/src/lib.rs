//! Network-facing adapters: language-model backends and the live replay
//! transport.

pub mod delegating;
pub mod ollama;
pub mod transport;
pub mod url_policy;

pub use delegating::{CapabilityRegistry, CapabilityResolver, DelegatingBackend, LlmCapability};
pub use ollama::{BackendTimeouts, OllamaBackend};
pub use transport::ReqwestTransport;
