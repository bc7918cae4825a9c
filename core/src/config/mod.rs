pub mod service;

pub use service::ConfigService;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SAGE_DIR: &str = ".sage";
const MEMORY_FILE: &str = "ai_memory.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: String,

    pub openai_key: String,
    pub openai_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_base_url: Option<String>,

    pub gemini_key: String,
    pub gemini_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_base_url: Option<String>,

    pub ollama_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ollama_base_url: Option<String>,

    pub temperature: f64,
    pub max_search_cycles: usize,
    pub max_agent_steps: usize,
    pub search_max_results: usize,
    pub command_timeout_secs: u64,
    pub dispatch_workers: usize,
    pub dispatch_queue_capacity: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_file: Option<PathBuf>,

    #[serde(skip)]
    pub workspace_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: "openai".to_string(),
            openai_key: String::new(),
            openai_model: "gpt-4o".to_string(),
            openai_base_url: None,
            gemini_key: String::new(),
            gemini_model: "gemini-pro".to_string(),
            gemini_base_url: None,
            ollama_model: "llama3.2".to_string(),
            ollama_base_url: None,
            temperature: 0.7,
            max_search_cycles: 1,
            max_agent_steps: 5,
            search_max_results: 3,
            command_timeout_secs: 10,
            dispatch_workers: 4,
            dispatch_queue_capacity: 64,
            memory_file: None,
            workspace_dir: get_sage_dir().join("workspace"),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        if config_exists() {
            load_config()
        } else {
            Ok(Config::default())
        }
    }

    pub fn memory_path(&self) -> PathBuf {
        self.memory_file
            .clone()
            .unwrap_or_else(|| get_sage_dir().join(MEMORY_FILE))
    }
}

pub fn get_sage_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(SAGE_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_sage_dir().join("config.toml")
}

pub fn ensure_sage_dir() -> Result<PathBuf> {
    let sage_dir = get_sage_dir();

    if !sage_dir.exists() {
        std::fs::create_dir_all(&sage_dir).with_context(|| {
            format!("Failed to create sage directory at {}", sage_dir.display())
        })?;
    }

    Ok(sage_dir)
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}

pub fn load_config() -> Result<Config> {
    load_config_from(&get_config_path())
}

pub fn load_config_from(config_path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(config_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!(
                "Config file not found at {}. Run 'sage onboard' to set up your configuration.",
                config_path.display()
            )
        } else {
            anyhow::anyhow!("Failed to read config from {}: {}", config_path.display(), e)
        }
    })?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

    config.workspace_dir = get_sage_dir().join("workspace");

    Ok(config)
}

pub fn save_config(config: &Config) -> Result<()> {
    ensure_sage_dir()?;
    save_config_to(config, &get_config_path())
}

pub fn save_config_to(config: &Config, config_path: &Path) -> Result<()> {
    if let Some(parent) = config_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(config_path, content)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "provider = \"gemini\"\ngemini_key = \"g-123\"\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.provider, "gemini");
        assert_eq!(config.gemini_key, "g-123");
        assert_eq!(config.openai_model, "gpt-4o");
        assert_eq!(config.command_timeout_secs, 10);
        assert_eq!(config.max_search_cycles, 1);
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        let config = Config {
            provider: "ollama".into(),
            ollama_base_url: Some("http://127.0.0.1:11434".into()),
            dispatch_workers: 2,
            ..Default::default()
        };
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.provider, "ollama");
        assert_eq!(loaded.ollama_base_url.as_deref(), Some("http://127.0.0.1:11434"));
        assert_eq!(loaded.dispatch_workers, 2);
    }

    #[test]
    fn missing_file_mentions_onboarding() {
        let tmp = TempDir::new().unwrap();
        let err = load_config_from(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("sage onboard"));
    }

    #[test]
    fn garbage_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "provider = [").unwrap();
        assert!(load_config_from(&path).is_err());
    }
}
