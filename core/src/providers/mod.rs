pub mod factory;
pub mod gateway;
pub mod gemini;
pub mod ollama;
pub mod openai;

pub use factory::{ProviderConfig, ProviderId, create_provider, resolve_provider_config};
pub use gateway::{ProviderFactory, ProviderGateway};
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
