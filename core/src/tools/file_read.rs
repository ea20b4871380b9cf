use crate::tools::{extract_string_arg, extract_usize_arg_opt};
use crate::traits::{Tool, tool_error};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::io::ErrorKind;

pub struct FileReadTool {
    workspace: std::path::PathBuf,
}

impl FileReadTool {
    pub fn new(workspace: impl AsRef<std::path::Path>) -> Self {
        Self {
            workspace: workspace.as_ref().to_path_buf(),
        }
    }
}

fn head_lines(content: &str, n: usize) -> String {
    content
        .lines()
        .take(n)
        .collect::<Vec<_>>()
        .join("\n")
}

fn tail_lines(content: &str, n: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the complete contents of a file from the file system. Returns detailed error messages if the file cannot be read."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read"
                },
                "head": {
                    "type": "integer",
                    "description": "If provided, returns only the first N lines of the file"
                },
                "tail": {
                    "type": "integer",
                    "description": "If provided, returns only the last N lines of the file"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let path = extract_string_arg(&args, "path")?;
        let head = extract_usize_arg_opt(&args, "head");
        let tail = extract_usize_arg_opt(&args, "tail");

        if head.is_some() && tail.is_some() {
            return Ok(tool_error("Cannot specify both head and tail parameters"));
        }

        let full_path = self.workspace.join(&path);

        match tokio::fs::metadata(&full_path).await {
            Ok(meta) if !meta.is_file() => {
                return Ok(tool_error(format!("Path is not a file: {path}")));
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(tool_error(format!("File not found: {path}")));
            }
            Err(e) => return Ok(tool_error(format!("Failed to read file: {e}"))),
        }

        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Ok(tool_error(format!("Failed to decode file as UTF-8: {e}")));
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Ok(tool_error(format!(
                    "Permission denied reading file: {path}"
                )));
            }
            Err(e) => return Ok(tool_error(format!("Failed to read file: {e}"))),
        };

        let content = match (head, tail) {
            (Some(n), _) => head_lines(&content, n),
            (_, Some(n)) => tail_lines(&content, n),
            _ => content,
        };

        Ok(json!({
            "path": path,
            "content": content,
            "success": true
        }))
    }
}
