use crate::tools::{bool_arg_opt, optional_arg};
use crate::traits::{ParamKind, Tool, ToolArgs, ToolParameter, ToolResult, Vfs};
use async_trait::async_trait;
use std::sync::Arc;

const RECURSIVE_DEPTH: usize = 5;

pub struct ListFilesTool {
    vfs: Arc<dyn Vfs>,
}

impl ListFilesTool {
    pub fn new(vfs: Arc<dyn Vfs>) -> Self {
        Self { vfs }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List the entries of a directory (directories end with '/'); set recursive to true to walk subdirectories"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("path", ParamKind::String),
            ToolParameter::optional("recursive", ParamKind::Boolean),
        ]
    }

    async fn execute(&self, args: &ToolArgs) -> anyhow::Result<ToolResult> {
        let path = optional_arg(args, "path", ".");
        let path = if path.trim().is_empty() { "." } else { path };

        let entries = if bool_arg_opt(args, "recursive") {
            self.vfs.walk(path, RECURSIVE_DEPTH)
        } else {
            self.vfs.list(path)
        };

        if entries.is_empty() {
            return Ok(ToolResult::success(format!(
                "No entries found in {path} (empty or not a directory)"
            )));
        }
        Ok(ToolResult::success(entries.join("\n")))
    }
}
