use crate::agent::COMPLETION_TOOL;
use crate::tools::extract_string_arg;
use crate::traits::Tool;
use async_trait::async_trait;
use serde_json::{Value, json};

/// The completion signal. Executing it only echoes its arguments; ending the run is the agent
/// loop's job.
#[derive(Debug, Default)]
pub struct MarkTaskCompleteTool;

impl MarkTaskCompleteTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for MarkTaskCompleteTool {
    fn name(&self) -> &str {
        COMPLETION_TOOL
    }

    fn description(&self) -> &str {
        "REQUIRED: Call this tool when the user's original request has been fully satisfied and you have provided a complete answer. This signals task completion and exits the agent loop."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_summary": {
                    "type": "string",
                    "description": "Brief summary of what was accomplished"
                },
                "completion_message": {
                    "type": "string",
                    "description": "Message to show the user indicating the task is complete"
                }
            },
            "required": ["task_summary", "completion_message"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let task_summary = extract_string_arg(&args, "task_summary")?;
        let completion_message = extract_string_arg(&args, "completion_message")?;

        Ok(json!({
            "status": "completed",
            "task_summary": task_summary,
            "completion_message": completion_message,
            "timestamp": chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }))
    }
}
