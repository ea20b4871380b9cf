use crate::traits::ChatMessage;
use std::path::{Path, PathBuf};

/// Replaces every `{name}` placeholder with its value in a single left-to-right pass. Unknown
/// placeholders stay as written and substituted values are never scanned again.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substitution = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(var, _)| *var == name)
                .map(|(_, value)| (close, *value))
        });

        match substitution {
            Some((close, value)) => {
                rendered.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                rendered.push('{');
                rest = after;
            }
        }
    }

    rendered.push_str(rest);
    rendered
}

/// Builds the opening system message of a conversation.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: String,
    workspace: Option<PathBuf>,
}

impl ContextBuilder {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            workspace: None,
        }
    }

    /// Adds a runtime section with the current time and workspace directory.
    pub fn with_workspace(mut self, workspace: impl AsRef<Path>) -> Self {
        self.workspace = Some(workspace.as_ref().to_path_buf());
        self
    }

    pub fn build_system_prompt(&self) -> String {
        let mut parts = vec![self.system_prompt.trim().to_string()];

        if let Some(runtime) = self.get_runtime_context() {
            parts.push(runtime);
        }

        parts.retain(|p| !p.is_empty());
        parts.join("\n\n---\n\n")
    }

    fn get_runtime_context(&self) -> Option<String> {
        let workspace = self.workspace.as_ref()?;
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M (%A)");

        Some(format!(
            "## Runtime Context

### Current Time
{}

### Workspace
{}",
            timestamp,
            workspace.display()
        ))
    }

    pub fn build_messages(&self, task: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.build_system_prompt()),
            ChatMessage::user(task),
        ]
    }
}
