use crate::tools::{required_arg, usize_arg_opt};
use crate::traits::memory::rank_by_recency;
use crate::traits::{Memory, ParamKind, Tool, ToolArgs, ToolParameter, ToolResult};
use async_trait::async_trait;
use std::sync::Arc;

pub struct SearchMemoryTool {
    memory: Arc<dyn Memory>,
}

impl SearchMemoryTool {
    pub fn new(memory: Arc<dyn Memory>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for SearchMemoryTool {
    fn name(&self) -> &str {
        "search_memory"
    }

    fn description(&self) -> &str {
        "Search remembered facts by keyword, most recent first"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("query", ParamKind::String),
            ToolParameter::optional("limit", ParamKind::Integer),
        ]
    }

    async fn execute(&self, args: &ToolArgs) -> anyhow::Result<ToolResult> {
        let query = required_arg(args, "query")?;
        let limit = usize_arg_opt(args, "limit", 5);

        let entries = rank_by_recency(self.memory.search(query).await);
        if entries.is_empty() {
            return Ok(ToolResult::success("No memories found matching the query."));
        }

        let formatted: Vec<String> = entries
            .iter()
            .take(limit)
            .map(|e| format!("- {} => {} ({})", e.query, e.answer, e.source))
            .collect();
        Ok(ToolResult::success(format!(
            "Found {} memories:\n{}",
            formatted.len(),
            formatted.join("\n")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::JsonMemory;
    use crate::traits::MemorySource;
    use tempfile::TempDir;

    #[tokio::test]
    async fn lists_matches_newest_first() {
        let tmp = TempDir::new().unwrap();
        let memory = Arc::new(JsonMemory::open(tmp.path().join("m.json")));
        memory.append("tokio", "old fact", MemorySource::WebSearch).await.unwrap();
        memory.append("tokio", "new fact", MemorySource::Manual).await.unwrap();

        let tool = SearchMemoryTool::new(memory);
        let mut args = ToolArgs::new();
        args.insert("query".into(), "Tokio".into());
        args.insert("limit".into(), "1".into());

        let output = tool.execute(&args).await.unwrap().output;
        assert_eq!(output, "Found 1 memories:\n- tokio => new fact (manual)");

        args.insert("query".into(), "nothing".into());
        assert!(tool.execute(&args).await.unwrap().output.starts_with("No memories"));
    }
}
