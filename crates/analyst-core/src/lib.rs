pub mod analysis;
pub mod backend;
pub mod config;
pub mod error;
pub mod memory;
pub mod prompt;
pub mod role;
pub mod traffic;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export common error type
pub use error::{AnalystError, ErrorKind, Result};

pub use analysis::{AnalysisRequest, AnalysisResult, AnalysisState, ResultSink};
pub use backend::BackendAdapter;
pub use config::{BackendSettings, ConfigStore};
pub use memory::SessionMemory;
pub use prompt::{AssembledPrompt, PromptAssembler, PromptBudget, PromptInput};
pub use role::{Role, RoleStore};
pub use traffic::{HttpMessage, TrafficTransport};
