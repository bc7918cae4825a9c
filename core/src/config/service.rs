use super::{Config, load_config_from, save_config_to};
use crate::events::{CONFIG_CHANGED, EventBus};
use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Key/value view over [`Config`], shared by the gateway and the front end.
///
/// Values are exposed as text regardless of their stored type. `set`
/// validates the new value against the typed config before accepting it,
/// persists when file-backed, and publishes `config_changed`.
pub struct ConfigService {
    config: RwLock<Config>,
    path: Option<PathBuf>,
    bus: Option<Arc<EventBus>>,
}

impl ConfigService {
    pub fn new(config: Config) -> Self {
        Self {
            config: RwLock::new(config),
            path: None,
            bus: None,
        }
    }

    pub fn file_backed(config: Config, path: impl AsRef<Path>) -> Self {
        Self {
            config: RwLock::new(config),
            path: Some(path.as_ref().to_path_buf()),
            bus: None,
        }
    }

    /// Load from `path`, or start from defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = if path.exists() {
            load_config_from(path)?
        } else {
            Config::default()
        };
        Ok(Self::file_backed(config, path))
    }

    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn snapshot(&self) -> Config {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let fields = to_fields(&self.snapshot()).ok()?;
        match fields.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        {
            let mut guard = self.config.write().unwrap_or_else(PoisonError::into_inner);

            let mut fields = to_fields(&guard)?;
            let optional = OPTIONAL_KEYS.contains(&key);
            if !optional && !fields.contains_key(key) {
                return Err(anyhow!("Unknown config key '{key}'"));
            }

            let coerced = coerce(fields.get(key), value, optional)
                .with_context(|| format!("Invalid value for config key '{key}'"))?;
            fields.insert(key.to_string(), coerced);

            let mut updated: Config = serde_json::from_value(Value::Object(fields))
                .with_context(|| format!("Invalid value for config key '{key}'"))?;
            updated.workspace_dir = guard.workspace_dir.clone();

            if let Some(path) = &self.path {
                save_config_to(&updated, path)?;
            }
            *guard = updated;
        }

        tracing::info!(key, "config changed");
        if let Some(bus) = &self.bus {
            bus.publish(CONFIG_CHANGED, json!({ "key": key, "value": value }));
        }
        Ok(())
    }
}

fn to_fields(config: &Config) -> Result<Map<String, Value>> {
    match serde_json::to_value(config)? {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow!("config did not serialize to an object")),
    }
}

/// Keys that are omitted from the serialized config while unset.
const OPTIONAL_KEYS: &[&str] = &[
    "openai_base_url",
    "gemini_base_url",
    "ollama_base_url",
    "memory_file",
];

/// An empty value clears an optional key and empties a text key.
fn coerce(existing: Option<&Value>, raw: &str, optional: bool) -> Result<Value> {
    let raw = raw.trim();
    if raw.is_empty() && optional {
        return Ok(Value::Null);
    }
    Ok(match existing {
        Some(Value::Number(_)) => {
            let number: serde_json::Number = raw
                .parse()
                .map_err(|_| anyhow!("expected a number, got '{raw}'"))?;
            Value::Number(number)
        }
        Some(Value::Bool(_)) => Value::Bool(
            raw.parse()
                .map_err(|_| anyhow!("expected true or false, got '{raw}'"))?,
        ),
        _ => Value::String(raw.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[test]
    fn get_renders_every_type_as_text() {
        let service = ConfigService::new(Config::default());
        assert_eq!(service.get("provider").as_deref(), Some("openai"));
        assert_eq!(service.get("command_timeout_secs").as_deref(), Some("10"));
        assert_eq!(service.get("temperature").as_deref(), Some("0.7"));
        assert_eq!(service.get("openai_base_url"), None);
        assert_eq!(service.get_or("openai_base_url", "fallback"), "fallback");
        assert_eq!(service.get("no_such_key"), None);
    }

    #[test]
    fn set_coerces_and_validates() {
        let service = ConfigService::new(Config::default());

        service.set("dispatch_workers", "8").unwrap();
        assert_eq!(service.snapshot().dispatch_workers, 8);

        service.set("gemini_base_url", "http://localhost:9000").unwrap();
        assert_eq!(
            service.snapshot().gemini_base_url.as_deref(),
            Some("http://localhost:9000")
        );

        assert!(service.set("dispatch_workers", "many").is_err());
        assert_eq!(service.snapshot().dispatch_workers, 8);

        assert!(service.set("colour_scheme", "dark").is_err());
    }

    #[test]
    fn empty_value_clears_text_and_optional_keys() {
        let service = ConfigService::new(Config {
            openai_key: "sk-stored".into(),
            ollama_base_url: Some("http://gpu-box:11434".into()),
            ..Default::default()
        });

        service.set("openai_key", "").unwrap();
        service.set("ollama_base_url", "").unwrap();

        let config = service.snapshot();
        assert_eq!(config.openai_key, "");
        assert_eq!(config.ollama_base_url, None);
        assert!(service.set("max_agent_steps", "").is_err());
    }

    #[test]
    fn empty_value_for_unknown_key_is_rejected_without_event() {
        let bus = Arc::new(EventBus::new());
        let published = Arc::new(Mutex::new(0));
        let p = published.clone();
        bus.subscribe(CONFIG_CHANGED, move |_| *p.lock().unwrap() += 1);

        let service = ConfigService::new(Config::default()).with_bus(bus);
        let err = service.set("colour_scheme", "").unwrap_err();
        assert_eq!(err.to_string(), "Unknown config key 'colour_scheme'");
        assert_eq!(*published.lock().unwrap(), 0);
    }

    #[test]
    fn file_backed_set_persists() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        let service = ConfigService::load(&path).unwrap();
        service.set("openai_key", "sk-test").unwrap();

        let reloaded = ConfigService::load(&path).unwrap();
        assert_eq!(reloaded.get("openai_key").as_deref(), Some("sk-test"));
    }

    #[test]
    fn set_publishes_config_changed() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        bus.subscribe(CONFIG_CHANGED, move |e| s.lock().unwrap().push(e.payload.clone()));

        let service = ConfigService::new(Config::default()).with_bus(bus);
        service.set("provider", "gemini").unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["key"], "provider");
        assert_eq!(seen[0]["value"], "gemini");
    }
}
