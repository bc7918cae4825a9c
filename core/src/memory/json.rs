//! Memory store persisted as a pretty-printed JSON array.
//!
//! The whole collection is rewritten on every append: serialized to a
//! sibling `.tmp` file, then renamed over the target. The in-memory copy and
//! the file are guarded by one async mutex, so appends are serialized and
//! none are lost under concurrency.

use crate::error::{CoreError, CoreResult};
use crate::traits::{Memory, MemoryEntry, MemorySource};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct JsonMemory {
    path: PathBuf,
    entries: Mutex<Vec<MemoryEntry>>,
}

impl JsonMemory {
    /// Load the store at `path`. A missing or unreadable file yields an
    /// empty store. Records that fail to parse are skipped, and the original
    /// file is copied to `<path>.corrupt` before anything rewrites it.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = load_entries(&path);
        tracing::debug!(path = %path.display(), count = entries.len(), "memory loaded");
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &[MemoryEntry]) -> CoreResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::persistence(format!("{}: {e}", parent.display())))?;
        }

        let content = serde_json::to_string_pretty(entries).map_err(CoreError::persistence)?;

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content)
            .await
            .map_err(|e| CoreError::persistence(format!("{}: {e}", temp_path.display())))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| CoreError::persistence(format!("{}: {e}", self.path.display())))?;
        Ok(())
    }
}

fn load_entries(path: &Path) -> Vec<MemoryEntry> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "memory file unreadable, starting empty");
            return Vec::new();
        }
    };

    if content.trim().is_empty() {
        return Vec::new();
    }

    let records = match serde_json::from_str::<Vec<serde_json::Value>>(&content) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "memory file corrupt, starting empty");
            preserve_corrupt(path);
            return Vec::new();
        }
    };

    let total = records.len();
    let entries: Vec<MemoryEntry> = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value(record) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(path = %path.display(), index, error = %e, "skipping bad memory record");
                None
            }
        })
        .collect();

    if entries.len() < total {
        preserve_corrupt(path);
    }
    entries
}

/// Copy the file to `<path>.corrupt` so the next rewrite cannot lose data
/// that failed to load.
fn preserve_corrupt(path: &Path) {
    let backup = corrupt_path(path);
    match std::fs::copy(path, &backup) {
        Ok(_) => tracing::warn!(backup = %backup.display(), "kept a copy of the unreadable memory file"),
        Err(e) => tracing::error!(backup = %backup.display(), error = %e, "could not back up memory file"),
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".corrupt");
    PathBuf::from(name)
}

#[async_trait]
impl Memory for JsonMemory {
    fn name(&self) -> &str {
        "json"
    }

    async fn append(
        &self,
        query: &str,
        answer: &str,
        source: MemorySource,
    ) -> CoreResult<MemoryEntry> {
        let mut entries = self.entries.lock().await;

        let now = Utc::now();
        let timestamp = match entries.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };
        let entry = MemoryEntry {
            timestamp,
            query: query.to_string(),
            answer: answer.to_string(),
            source,
        };

        entries.push(entry.clone());
        if let Err(e) = self.persist(&entries).await {
            entries.pop();
            return Err(e);
        }

        tracing::debug!(query, %source, count = entries.len(), "memory appended");
        Ok(entry)
    }

    async fn search(&self, query: &str) -> Vec<MemoryEntry> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|e| e.matches(query))
            .cloned()
            .collect()
    }

    async fn entries(&self) -> Vec<MemoryEntry> {
        self.entries.lock().await.clone()
    }

    async fn count(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn append_then_reload_preserves_entry() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ai_memory.json");

        let memory = JsonMemory::open(&path);
        let entry = memory
            .append("rust async", "Tokio is an async runtime", MemorySource::WebSearch)
            .await
            .unwrap();

        let reloaded = JsonMemory::open(&path);
        assert_eq!(reloaded.entries().await, vec![entry]);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn later_append_ranks_first_in_context() {
        let tmp = TempDir::new().unwrap();
        let memory = JsonMemory::open(tmp.path().join("m.json"));

        memory.append("paris weather", "Rainy", MemorySource::WebSearch).await.unwrap();
        memory.append("paris weather", "Sunny", MemorySource::Manual).await.unwrap();

        let context = memory.context_string("Paris", 3).await;
        assert_eq!(
            context,
            "[[MEMORY_CONTEXT]]\nFact 1: Sunny (Source: manual)\nFact 2: Rainy (Source: web_search)\n[[/MEMORY_CONTEXT]]\n"
        );
        assert_eq!(memory.context_string("Paris", 1).await.matches("Fact").count(), 1);
        assert_eq!(memory.context_string("berlin", 3).await, "");
        assert_eq!(memory.context_string("", 3).await, "");
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty_and_is_kept_aside() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("m.json");
        std::fs::write(&path, "{ not json").unwrap();

        let memory = JsonMemory::open(&path);
        assert_eq!(memory.count().await, 0);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("m.json.corrupt")).unwrap(),
            "{ not json"
        );

        memory.append("q", "a", MemorySource::Manual).await.unwrap();
        assert_eq!(JsonMemory::open(&path).count().await, 1);
    }

    #[tokio::test]
    async fn offsetless_timestamps_load_and_survive_append() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ai_memory.json");
        std::fs::write(
            &path,
            r#"[{"timestamp":"2025-12-14T12:26:47.123456","query":"rust","answer":"old fact","source":"web_search"}]"#,
        )
        .unwrap();

        let memory = JsonMemory::open(&path);
        assert_eq!(memory.count().await, 1);
        memory.append("tokio", "new fact", MemorySource::Manual).await.unwrap();

        let entries = JsonMemory::open(&path).entries().await;
        let answers: Vec<_> = entries.iter().map(|e| e.answer.as_str()).collect();
        assert_eq!(answers, vec!["old fact", "new fact"]);
        assert!(!tmp.path().join("ai_memory.json.corrupt").exists());
    }

    #[tokio::test]
    async fn bad_records_are_skipped_individually() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("m.json");
        let original = r#"[
            {"timestamp":"2024-05-01T10:00:00Z","query":"a","answer":"kept","source":"manual"},
            {"timestamp":"not a date","query":"b","answer":"dropped","source":"manual"},
            {"query":"c"}
        ]"#;
        std::fs::write(&path, original).unwrap();

        let memory = JsonMemory::open(&path);
        let entries = memory.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].answer, "kept");

        memory.append("d", "later", MemorySource::Manual).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("m.json.corrupt")).unwrap(),
            original
        );
    }

    #[tokio::test]
    async fn concurrent_appends_are_all_kept_in_timestamp_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("m.json");
        let memory = Arc::new(JsonMemory::open(&path));

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let memory = memory.clone();
                tokio::spawn(async move {
                    memory
                        .append(&format!("q{i}"), &format!("a{i}"), MemorySource::WebSearch)
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let entries = JsonMemory::open(&path).entries().await;
        assert_eq!(entries.len(), 20);
        assert!(entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn persistence_failure_leaves_store_unchanged() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let memory = JsonMemory::open(blocker.join("m.json"));
        let err = memory.append("q", "a", MemorySource::Manual).await.unwrap_err();
        assert!(matches!(err, CoreError::Persistence(_)));
        assert_eq!(memory.count().await, 0);
    }

    #[test]
    fn file_format_is_a_json_array() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("m.json");
        std::fs::write(
            &path,
            r#"[{"timestamp":"2024-05-01T10:00:00Z","query":"q","answer":"a","source":"forum"}]"#,
        )
        .unwrap();

        let entries = load_entries(&path);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source, MemorySource::Unknown);
    }
}
