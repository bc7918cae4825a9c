use crate::tools::required_arg;
use crate::traits::{ParamKind, Tool, ToolArgs, ToolParameter, ToolResult, Vfs};
use async_trait::async_trait;
use std::sync::Arc;

pub struct WriteFileTool {
    vfs: Arc<dyn Vfs>,
}

impl WriteFileTool {
    pub fn new(vfs: Arc<dyn Vfs>) -> Self {
        Self { vfs }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories and replacing any existing content"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("path", ParamKind::String),
            ToolParameter::required("content", ParamKind::String),
        ]
    }

    async fn execute(&self, args: &ToolArgs) -> anyhow::Result<ToolResult> {
        let path = required_arg(args, "path")?;
        let content = required_arg(args, "content")?;

        if self.vfs.write(path, content) {
            Ok(ToolResult::success(format!(
                "Successfully wrote {} bytes to {}",
                content.len(),
                path
            )))
        } else {
            Ok(ToolResult::error(format!("Failed to write file: {path}")))
        }
    }
}
