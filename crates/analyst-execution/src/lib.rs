//! Runtime side of the analyst: the process-wide context, the analysis task
//! pipeline and logging setup.

pub mod context;
pub mod logging;
pub mod orchestrator;
pub mod summary;

pub use context::{AnalystContext, SHUTDOWN_GRACE, ShutdownReport};
pub use orchestrator::{AnalysisOrchestrator, TaskId};
pub use summary::summarize;
