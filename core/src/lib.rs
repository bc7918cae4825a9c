pub mod agent;
pub mod config;
pub mod error;
pub mod events;
pub mod memory;
pub mod providers;
pub mod search;
pub mod tools;
pub mod traits;
pub mod vfs;

pub use agent::{AutonomousAgent, ContextBuilder, Directive, ReasoningOrchestrator, ReasoningTrace, ToolRegistry};
pub use config::{Config, ConfigService};
pub use error::{CoreError, CoreResult};
pub use events::{DispatchError, Dispatcher, Event, EventBus, SubscriptionId};
pub use memory::{JsonMemory, create_memory};
pub use providers::{
    GeminiProvider, OllamaProvider, OpenAIProvider, ProviderConfig, ProviderFactory, ProviderGateway,
    ProviderId, create_provider, resolve_provider_config,
};
pub use search::DuckDuckGoSearch;
pub use tools::{
    ExecuteCommandTool, ListFilesTool, ReadFileTool, RememberTool, SearchMemoryTool, ToolInvocation,
    WriteFileTool, parse_tool_call,
};
pub use traits::{
    ChatMessage, ChatRequest, ChatResponse, Memory, MemoryEntry, MemorySource, ParamKind, Provider,
    SearchHit, SearchService, Tool, ToolArgs, ToolDefinition, ToolParameter, ToolResult, Vfs,
};
pub use vfs::LocalVfs;
