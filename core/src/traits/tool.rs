use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// The soft-error payload shape every capability reports failures with.
pub fn tool_error(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> Value;

    /// Returns any JSON value, or `{"error": ...}` for failures the tool reports itself.
    /// An `Err` is converted to the same shape by the registry.
    async fn execute(&self, args: Value) -> anyhow::Result<Value>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters_schema: self.parameters_schema(),
        }
    }
}
