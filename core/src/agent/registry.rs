use crate::agent::schema::validate_arguments;
use crate::traits::{Tool, ToolCall, ToolSpec, tool_error};
use futures_util::FutureExt;
use serde_json::{Value, json};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// An explicit, ordered list of capabilities.
///
/// Cloning is cheap and gives an independent registry: removing a tool from a clone leaves the
/// original untouched. The tools themselves are shared and must not hold per-run state.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Adds a tool. A tool with the same name is replaced in place.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(idx) => self.tools[idx] = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// A copy of this registry without the named tool.
    pub fn without(&self, name: &str) -> Self {
        Self {
            tools: self
                .tools
                .iter()
                .filter(|t| t.name() != name)
                .cloned()
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn get_specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs one model-issued call. Never fails: unknown tools, bad arguments, tool errors and
    /// tool panics all come back as `{"error": ...}` payloads.
    pub async fn execute(&self, call: &ToolCall) -> Value {
        let Some(tool) = self.get(&call.name) else {
            return tool_error(format!("Unknown tool: {}", call.name));
        };

        let args = match call.parse_arguments() {
            Ok(args) => args,
            Err(e) => {
                return tool_error(format!(
                    "Tool execution failed: invalid JSON arguments: {e}"
                ));
            }
        };

        if let Err(violations) = validate_arguments(&tool.parameters_schema(), &args) {
            let details: Vec<String> = violations.iter().map(ToString::to_string).collect();
            return json!({
                "error": format!("Invalid arguments for {}: {}", call.name, details.join("; ")),
                "violations": details,
            });
        }

        match AssertUnwindSafe(tool.execute(args)).catch_unwind().await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => tool_error(format!("Tool execution failed: {e}")),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(tool = %call.name, "Tool panicked: {}", message);
                tool_error(format!("Tool execution failed: {message}"))
            }
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the text back"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            })
        }

        async fn execute(&self, args: Value) -> anyhow::Result<Value> {
            let text = args["text"].as_str().unwrap_or_default();
            match text {
                "fail" => anyhow::bail!("refused to echo"),
                "panic" => panic!("echo exploded"),
                _ => Ok(json!({ "echo": text })),
            }
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new().with_tool(Arc::new(EchoTool))
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall::new("call_1", name, arguments)
    }

    #[tokio::test]
    async fn executes_registered_tool() {
        let result = registry().execute(&call("echo", r#"{"text":"hi"}"#)).await;
        assert_eq!(result, json!({"echo": "hi"}));
    }

    #[tokio::test]
    async fn unknown_tool_is_soft_error() {
        let result = registry().execute(&call("teleport", "{}")).await;
        assert_eq!(result, json!({"error": "Unknown tool: teleport"}));
    }

    #[tokio::test]
    async fn tool_error_is_converted() {
        let result = registry().execute(&call("echo", r#"{"text":"fail"}"#)).await;
        assert_eq!(
            result,
            json!({"error": "Tool execution failed: refused to echo"})
        );
    }

    #[tokio::test]
    async fn tool_panic_is_converted() {
        let result = registry().execute(&call("echo", r#"{"text":"panic"}"#)).await;
        assert_eq!(
            result,
            json!({"error": "Tool execution failed: echo exploded"})
        );
    }

    #[tokio::test]
    async fn malformed_arguments_are_soft_error() {
        let result = registry().execute(&call("echo", "{text")).await;
        let message = result["error"].as_str().unwrap();
        assert!(message.starts_with("Tool execution failed: invalid JSON arguments"));
    }

    #[tokio::test]
    async fn schema_violations_are_reported() {
        let result = registry().execute(&call("echo", r#"{"text": 5}"#)).await;
        assert_eq!(
            result["error"],
            "Invalid arguments for echo: field 'text' must be string, got integer"
        );
        assert_eq!(result["violations"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn without_leaves_original_intact() {
        let original = registry();
        let trimmed = original.without("echo");
        assert!(trimmed.is_empty());
        assert!(original.contains("echo"));
        assert_eq!(original.get_specs()[0].name, "echo");
    }

    #[test]
    fn register_replaces_same_name() {
        let mut registry = registry();
        registry.register(Arc::new(EchoTool));
        assert_eq!(registry.len(), 1);
    }
}
