use crate::config::Config;
use crate::memory::JsonMemory;
use crate::traits::Memory;
use std::sync::Arc;

pub fn create_memory(config: &Config) -> Arc<dyn Memory> {
    Arc::new(JsonMemory::open(config.memory_path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn factory_uses_configured_file() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            memory_file: Some(tmp.path().join("facts.json")),
            ..Default::default()
        };
        let mem = create_memory(&config);
        assert_eq!(mem.name(), "json");
    }
}
