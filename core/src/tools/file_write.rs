use crate::tools::extract_string_arg;
use crate::traits::{Tool, tool_error};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct FileWriteTool {
    workspace: PathBuf,
}

impl FileWriteTool {
    pub fn new(workspace: impl AsRef<Path>) -> Self {
        Self {
            workspace: workspace.as_ref().to_path_buf(),
        }
    }
}

/// Writes through a sibling `.tmp` file and renames it over the target, so readers never see a
/// half-written file.
async fn write_atomic(target: &Path, content: &str) -> std::io::Result<()> {
    let mut tmp = target.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    if let Err(e) = tokio::fs::write(&tmp, content).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&tmp, target).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Create a new file or completely overwrite an existing file with new content. Use with caution as it will overwrite existing files without warning."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write to"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write to the file"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let path = extract_string_arg(&args, "path")?;
        let content = extract_string_arg(&args, "content")?;

        let full_path = self.workspace.join(&path);

        if let Some(parent) = full_path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Ok(tool_error(format!("OS error writing file: {e}")));
        }

        match write_atomic(&full_path, &content).await {
            Ok(()) => Ok(json!({
                "path": full_path.display().to_string(),
                "bytes_written": content.len(),
                "success": true,
                "message": format!("Successfully wrote to {path}")
            })),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Ok(tool_error(format!(
                "Permission denied writing to file: {path}"
            ))),
            Err(e) => Ok(tool_error(format!("OS error writing file: {e}"))),
        }
    }
}
