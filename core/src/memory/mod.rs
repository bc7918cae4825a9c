pub mod factory;
pub mod json;

pub use factory::create_memory;
pub use json::JsonMemory;
