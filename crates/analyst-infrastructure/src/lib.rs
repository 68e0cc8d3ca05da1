pub mod paths;
pub mod storage;

pub use paths::AnalystPaths;
pub use storage::{InMemoryConfigStore, TomlConfigStore};
