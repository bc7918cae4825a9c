use crate::tools::required_arg;
use crate::traits::{ParamKind, Tool, ToolArgs, ToolParameter, ToolResult, Vfs};
use async_trait::async_trait;
use std::sync::Arc;

pub struct ReadFileTool {
    vfs: Arc<dyn Vfs>,
}

impl ReadFileTool {
    pub fn new(vfs: Arc<dyn Vfs>) -> Self {
        Self { vfs }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::required("path", ParamKind::String)]
    }

    async fn execute(&self, args: &ToolArgs) -> anyhow::Result<ToolResult> {
        let path = required_arg(args, "path")?;

        match self.vfs.read(path) {
            Some(content) => Ok(ToolResult::success(content)),
            None => Ok(ToolResult::error(format!(
                "Failed to read file: {path} (not found or unreadable)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::LocalVfs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reads_existing_and_reports_missing() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "alpha").unwrap();
        let tool = ReadFileTool::new(Arc::new(LocalVfs::new(tmp.path())));

        let mut args = ToolArgs::new();
        args.insert("path".into(), "a.txt".into());
        assert_eq!(tool.execute(&args).await.unwrap().output, "alpha");

        args.insert("path".into(), "b.txt".into());
        let result = tool.execute(&args).await.unwrap();
        assert!(!result.success);
        assert!(result.to_text().contains("b.txt"));

        assert!(tool.execute(&ToolArgs::new()).await.is_err());
    }
}
