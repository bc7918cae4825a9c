use thiserror::Error;

/// Failures the core can produce.
///
/// Every component catches these at its own boundary. The typed form is
/// returned from the `try_*` / `Result` entry points; the text-returning
/// entry points render it with `Display`, which is what ends up in the chat
/// transcript.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("{provider} Error: provider not configured or unavailable ({reason})")]
    ProviderUnavailable { provider: String, reason: String },

    #[error("{provider} Error: {message}")]
    ProviderCall { provider: String, message: String },

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Tool call parse failure: {0}")]
    ToolParse(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl CoreError {
    pub fn provider_call(provider: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::ProviderCall {
            provider: provider.into(),
            message: format!("{err:#}"),
        }
    }

    pub fn persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
