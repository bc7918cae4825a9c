pub mod memory;
pub mod provider;
pub mod search;
pub mod tool;
pub mod vfs;

pub use memory::{Memory, MemoryEntry, MemorySource};
pub use provider::{ChatMessage, ChatRequest, ChatResponse, Provider};
pub use search::{SearchHit, SearchService};
pub use tool::{ParamKind, Tool, ToolArgs, ToolDefinition, ToolParameter, ToolResult};
pub use vfs::Vfs;
