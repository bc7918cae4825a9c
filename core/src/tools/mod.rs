pub mod execute_command;
pub mod list_files;
pub mod parser;
pub mod read_file;
pub mod remember;
pub mod search_memory;
pub mod write_file;

pub use execute_command::ExecuteCommandTool;
pub use list_files::ListFilesTool;
pub use parser::{TOOL_CALL_CLOSE, TOOL_CALL_OPEN, ToolInvocation, parse_tool_call};
pub use read_file::ReadFileTool;
pub use remember::RememberTool;
pub use search_memory::SearchMemoryTool;
pub use write_file::WriteFileTool;

use crate::traits::ToolArgs;

pub fn required_arg<'a>(args: &'a ToolArgs, key: &str) -> anyhow::Result<&'a str> {
    args.get(key)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' parameter", key))
}

pub fn optional_arg<'a>(args: &'a ToolArgs, key: &str, default: &'a str) -> &'a str {
    args.get(key).map_or(default, String::as_str)
}

pub fn usize_arg_opt(args: &ToolArgs, key: &str, default: usize) -> usize {
    args.get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

pub fn bool_arg_opt(args: &ToolArgs, key: &str) -> bool {
    args.get(key).is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "1"
        )
    })
}
