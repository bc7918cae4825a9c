use crate::error::CoreError;
use crate::tools::{
    ExecuteCommandTool, ListFilesTool, ReadFileTool, RememberTool, SearchMemoryTool,
    TOOL_CALL_CLOSE, TOOL_CALL_OPEN, ToolInvocation, WriteFileTool, parse_tool_call,
};
use crate::traits::{Memory, Tool, ToolArgs, ToolDefinition, ToolResult, Vfs};
use crate::vfs::LocalVfs;
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fixed set of tools for a session, in registration order.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> anyhow::Result<Self> {
        let mut seen = HashSet::new();
        for tool in &tools {
            if !seen.insert(tool.name().to_string()) {
                anyhow::bail!("tool registration failed: duplicate tool name '{}'", tool.name());
            }
        }
        Ok(Self { tools })
    }

    /// The standard tool set: file tools over `vfs`, shell execution in the
    /// same root with `command_timeout`, and the memory tools.
    pub fn with_defaults(
        vfs: Arc<LocalVfs>,
        memory: Arc<dyn Memory>,
        command_timeout: Duration,
    ) -> Self {
        let shell = ExecuteCommandTool::new(command_timeout).with_working_dir(vfs.root());
        let vfs: Arc<dyn Vfs> = vfs;
        Self {
            tools: vec![
                Arc::new(ReadFileTool::new(vfs.clone())),
                Arc::new(WriteFileTool::new(vfs.clone())),
                Arc::new(ListFilesTool::new(vfs)),
                Arc::new(shell),
                Arc::new(SearchMemoryTool::new(memory.clone())),
                Arc::new(RememberTool::new(memory)),
            ],
        }
    }

    pub fn list_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub async fn execute(&self, name: &str, args: &ToolArgs) -> ToolResult {
        let Some(tool) = self.get(name) else {
            tracing::warn!(tool = name, "unknown tool requested");
            return ToolResult::error(format!("Tool '{}' not found", name));
        };

        let started = Instant::now();
        let result = match tool.execute(args).await {
            Ok(result) => result,
            Err(e) => ToolResult::error(CoreError::ToolExecution(format!("{e:#}")).to_string()),
        };

        tracing::info!(
            tool = name,
            success = result.success,
            duration_ms = started.elapsed().as_millis() as u64,
            "tool executed"
        );
        result
    }

    /// Parse the first tool call out of `output` and execute it.
    ///
    /// `None` when the output holds no tool call. A malformed block yields
    /// an invocation whose result is the parse failure text.
    pub async fn run(&self, output: &str) -> Option<ToolInvocation> {
        match parse_tool_call(output) {
            Ok(None) => None,
            Ok(Some(mut invocation)) => {
                let result = self.execute(&invocation.tool_name, &invocation.args).await;
                invocation.result = Some(result.to_text());
                Some(invocation)
            }
            Err(e) => {
                tracing::warn!(error = %e, "malformed tool call");
                Some(ToolInvocation {
                    tool_name: String::new(),
                    args: ToolArgs::new(),
                    raw_block: raw_block_of(output),
                    result: Some(e.to_string()),
                })
            }
        }
    }

    /// Tool list and call grammar, for inclusion in a system prompt.
    pub fn protocol_instructions(&self) -> String {
        let mut instructions = String::new();
        instructions.push_str("## Tool Use Protocol\n\n");
        instructions.push_str("To use a tool, output exactly one block like this and nothing after it:\n\n");
        let _ = writeln!(instructions, "{TOOL_CALL_OPEN}");
        instructions.push_str("name: tool_name\nargs: param: value\nother_param: \"quoted value, may contain \\n escapes\"\n");
        let _ = writeln!(instructions, "{TOOL_CALL_CLOSE}\n");
        instructions.push_str(
            "The tool result comes back in an [[OBSERVATION]] block. When you have the final answer, reply without a tool call.\n\n",
        );
        instructions.push_str("### Available Tools\n\n");

        for tool in &self.tools {
            let params: Vec<String> = tool
                .parameters()
                .iter()
                .map(|p| {
                    let optional = if p.required { "" } else { ", optional" };
                    format!("{} ({}{})", p.name, p.kind, optional)
                })
                .collect();
            let _ = writeln!(
                instructions,
                "- **{}**: {}\n  Parameters: {}",
                tool.name(),
                tool.description(),
                if params.is_empty() { "none".to_string() } else { params.join(", ") }
            );
        }

        instructions
    }
}

fn raw_block_of(output: &str) -> String {
    match output.find(TOOL_CALL_OPEN) {
        Some(start) => output[start..].to_string(),
        None => output.to_string(),
    }
}
