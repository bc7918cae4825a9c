pub mod context;
pub mod directive;
pub mod loop_;
pub mod reasoning;
pub mod registry;

pub use context::ContextBuilder;
pub use directive::Directive;
pub use loop_::AutonomousAgent;
pub use reasoning::{ReasoningOrchestrator, ReasoningTrace};
pub use registry::ToolRegistry;
