pub mod agent;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod tools;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

pub use agent::{AgentLoop, AgentOutcome, AgentRun, ContextBuilder, ToolRegistry};
pub use config::*;
pub use error::{AgentError, ConfigError};
pub use orchestrator::*;
pub use providers::*;
pub use tools::*;
pub use traits::*;
