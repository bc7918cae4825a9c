use crate::error::CoreResult;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Write;

pub const DEFAULT_CONTEXT_LIMIT: usize = 3;

pub const MEMORY_CONTEXT_OPEN: &str = "[[MEMORY_CONTEXT]]";
pub const MEMORY_CONTEXT_CLOSE: &str = "[[/MEMORY_CONTEXT]]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub answer: String,
    pub source: MemorySource,
}

/// RFC 3339, or an ISO-8601 local time without offset read as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_timestamp(&text)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {text}")))
}

impl MemoryEntry {
    /// Case-insensitive match of any whitespace-separated term of `query`
    /// against this entry's query and answer.
    pub fn matches(&self, query: &str) -> bool {
        let content = format!("{} {}", self.query, self.answer).to_lowercase();
        query
            .to_lowercase()
            .split_whitespace()
            .any(|term| content.contains(term))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    WebSearch,
    Manual,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WebSearch => write!(f, "web_search"),
            Self::Manual => write!(f, "manual"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[async_trait]
pub trait Memory: Send + Sync {
    fn name(&self) -> &str;

    /// Append a fact and persist the whole store.
    async fn append(
        &self,
        query: &str,
        answer: &str,
        source: MemorySource,
    ) -> CoreResult<MemoryEntry>;

    /// Entries matching any term of `query`, in insertion order.
    async fn search(&self, query: &str) -> Vec<MemoryEntry>;

    async fn entries(&self) -> Vec<MemoryEntry>;

    async fn count(&self) -> usize;

    /// Up to `limit` matching facts, most recent first, wrapped in
    /// `[[MEMORY_CONTEXT]]` delimiters. Empty when nothing matches.
    async fn context_string(&self, query: &str, limit: usize) -> String {
        render_context(rank_by_recency(self.search(query).await), limit)
    }
}

/// Sort most recent first. Entries with equal timestamps keep reverse
/// insertion order, so a later append always ranks ahead.
pub fn rank_by_recency(entries: Vec<MemoryEntry>) -> Vec<MemoryEntry> {
    let mut indexed: Vec<(usize, MemoryEntry)> = entries.into_iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| b.timestamp.cmp(&a.timestamp).then(ib.cmp(ia)));
    indexed.into_iter().map(|(_, e)| e).collect()
}

pub fn render_context(ranked: Vec<MemoryEntry>, limit: usize) -> String {
    if ranked.is_empty() || limit == 0 {
        return String::new();
    }

    let mut context = format!("{MEMORY_CONTEXT_OPEN}\n");
    for (i, entry) in ranked.iter().take(limit).enumerate() {
        let _ = writeln!(
            context,
            "Fact {}: {} (Source: {})",
            i + 1,
            entry.answer,
            entry.source
        );
    }
    context.push_str(MEMORY_CONTEXT_CLOSE);
    context.push('\n');
    context
}
