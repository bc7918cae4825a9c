use crate::tools::required_arg;
use crate::traits::{Memory, MemorySource, ParamKind, Tool, ToolArgs, ToolParameter, ToolResult};
use async_trait::async_trait;
use std::sync::Arc;

pub struct RememberTool {
    memory: Arc<dyn Memory>,
}

impl RememberTool {
    pub fn new(memory: Arc<dyn Memory>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for RememberTool {
    fn name(&self) -> &str {
        "remember"
    }

    fn description(&self) -> &str {
        "Store a fact for future reference: the question it answers and the answer itself"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("query", ParamKind::String),
            ToolParameter::required("answer", ParamKind::String),
        ]
    }

    async fn execute(&self, args: &ToolArgs) -> anyhow::Result<ToolResult> {
        let query = required_arg(args, "query")?;
        let answer = required_arg(args, "answer")?;

        match self.memory.append(query, answer, MemorySource::Manual).await {
            Ok(_) => Ok(ToolResult::success(format!("Remembered fact for: {query}"))),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}
