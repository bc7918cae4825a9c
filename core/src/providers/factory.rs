use crate::config::ConfigService;
use crate::providers::{GeminiProvider, OllamaProvider, OpenAIProvider};
use crate::traits::Provider;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenAI,
    Gemini,
    Ollama,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [Self::OpenAI, Self::Gemini, Self::Ollama];

    /// Prefix of this backend's keys in the config (`openai_key`, ...).
    pub fn config_prefix(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Gemini => "Gemini",
            Self::Ollama => "Ollama",
        }
    }

    pub fn env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::OpenAI => &["OPENAI_API_KEY", "SAGE_OPENAI_API_KEY"],
            Self::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY", "SAGE_GEMINI_API_KEY"],
            Self::Ollama => &[],
        }
    }

    pub fn requires_credential(&self) -> bool {
        !matches!(self, Self::Ollama)
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAI => "gpt-4o",
            Self::Gemini => "gemini-pro",
            Self::Ollama => "llama3.2",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.config_prefix())
    }
}

impl FromStr for ProviderId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" | "google" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(anyhow!(
                "Unknown provider: {}. Available: openai, gemini, ollama",
                other
            )),
        }
    }
}

/// Everything needed to talk to one backend.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider_id: ProviderId,
    pub model_id: String,
    pub credential: Option<String>,
    pub base_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider_id", &self.provider_id)
            .field("model_id", &self.model_id)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Resolve a backend's configuration: stored key first, then the
/// environment, otherwise no credential.
pub fn resolve_provider_config(
    config: &ConfigService,
    id: ProviderId,
    env: impl Fn(&str) -> Option<String>,
) -> ProviderConfig {
    let prefix = id.config_prefix();
    let model_id = config
        .get(&format!("{prefix}_model"))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| id.default_model().to_string());
    let base_url = config
        .get(&format!("{prefix}_base_url"))
        .filter(|u| !u.trim().is_empty());

    let credential = if id.requires_credential() {
        resolve_credential(config.get(&format!("{prefix}_key")), id.env_vars(), env)
    } else {
        None
    };

    ProviderConfig {
        provider_id: id,
        model_id,
        credential,
        base_url,
    }
}

fn resolve_credential(
    stored: Option<String>,
    env_vars: &[&str],
    env: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    if let Some(key) = stored.filter(|k| !k.trim().is_empty()) {
        return Some(key);
    }
    env_vars
        .iter()
        .filter_map(|var| env(var))
        .find(|k| !k.trim().is_empty())
}

pub fn process_env(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn Provider>> {
    let require_key = || {
        config.credential.clone().ok_or_else(|| {
            anyhow!(
                "No API key found (set {}_key or one of {})",
                config.provider_id.config_prefix(),
                config.provider_id.env_vars().join(", ")
            )
        })
    };

    match config.provider_id {
        ProviderId::OpenAI => {
            let mut provider = OpenAIProvider::new(require_key()?);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        ProviderId::Gemini => {
            let mut provider = GeminiProvider::new(require_key()?);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        ProviderId::Ollama => {
            let mut provider = OllamaProvider::new();
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
    }
}
