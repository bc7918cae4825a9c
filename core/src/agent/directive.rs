//! The reasoning protocol a drafting model answers with.

use serde::Serialize;

pub const SEARCH_OPEN: &str = "[[SEARCH:";
pub const THOUGHT_OPEN: &str = "[[THOUGHT]]";
pub const THOUGHT_CLOSE: &str = "[[/THOUGHT]]";
pub const ANSWER_OPEN: &str = "[[ANSWER]]";
pub const ANSWER_CLOSE: &str = "[[/ANSWER]]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directive {
    Search { query: String },
    /// A search marker with nothing to search for.
    EmptySearch,
    Answer { thought: String, answer: String },
    Malformed { raw: String },
}

impl Directive {
    /// A search marker anywhere in the output wins. The query runs to the
    /// next `]]`, even across lines, or to the end of the line when the
    /// marker is never closed. Inner whitespace is collapsed.
    pub fn parse(output: &str) -> Self {
        if let Some(start) = output.find(SEARCH_OPEN) {
            let rest = &output[start + SEARCH_OPEN.len()..];
            let end = rest
                .find("]]")
                .unwrap_or_else(|| rest.find('\n').unwrap_or(rest.len()));
            let query = rest[..end].split_whitespace().collect::<Vec<_>>().join(" ");
            if query.is_empty() {
                return Self::EmptySearch;
            }
            return Self::Search { query };
        }

        if let Some(start) = output.find(ANSWER_OPEN) {
            let rest = &output[start + ANSWER_OPEN.len()..];
            let answer = rest.find(ANSWER_CLOSE).map_or(rest, |end| &rest[..end]);
            let thought = extract_thought(&output[..start]);
            return Self::Answer {
                thought,
                answer: answer.trim().to_string(),
            };
        }

        Self::Malformed {
            raw: output.to_string(),
        }
    }

    pub fn search_query(&self) -> Option<&str> {
        match self {
            Self::Search { query } => Some(query),
            _ => None,
        }
    }
}

fn extract_thought(before_answer: &str) -> String {
    let Some(start) = before_answer.find(THOUGHT_OPEN) else {
        return String::new();
    };
    let rest = &before_answer[start + THOUGHT_OPEN.len()..];
    let end = rest.find(THOUGHT_CLOSE).unwrap_or(rest.len());
    rest[..end].trim().to_string()
}
