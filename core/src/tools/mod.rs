use crate::agent::ToolRegistry;
use crate::config::Config;
use serde_json::Value;
use std::sync::Arc;

pub mod calculator;
pub mod file_read;
pub mod file_write;
pub mod search;
pub mod task_done;

pub use calculator::CalculatorTool;
pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use search::SearchTool;
pub use task_done::MarkTaskCompleteTool;

/// The built-in tool set, registered in a fixed order.
pub fn default_registry(config: &Config) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SearchTool::new(config.search.clone())));
    registry.register(Arc::new(CalculatorTool::new()));
    registry.register(Arc::new(FileReadTool::new(&config.workspace_dir)));
    registry.register(Arc::new(FileWriteTool::new(&config.workspace_dir)));
    registry.register(Arc::new(MarkTaskCompleteTool::new()));
    registry
}

pub fn extract_string_arg(args: &Value, key: &str) -> anyhow::Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' parameter", key))
        .map(|s| s.to_string())
}

pub fn extract_usize_arg_opt(args: &Value, key: &str) -> Option<usize> {
    args.get(key).and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|n| n as usize)
    })
}
