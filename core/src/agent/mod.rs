pub mod context;
pub mod conversation;
pub mod loop_;
pub mod registry;
pub mod schema;

pub use context::{ContextBuilder, render_template};
pub use conversation::Conversation;
pub use loop_::{
    AgentLoop, AgentOutcome, AgentRun, COMPLETION_TOOL, DEFAULT_MAX_ITERATIONS,
    MAX_ITERATIONS_MESSAGE,
};
pub use registry::ToolRegistry;
