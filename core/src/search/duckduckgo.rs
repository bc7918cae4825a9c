use crate::traits::{SearchHit, SearchService};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://api.duckduckgo.com";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

/// Either a single topic or a named group of topics.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Topic {
        #[serde(rename = "Text")]
        text: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

/// Keyword search over the DuckDuckGo Instant Answer API.
pub struct DuckDuckGoSearch {
    client: Client,
    base_url: String,
}

impl DuckDuckGoSearch {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent(concat!("sage/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::new()
    }
}

fn flatten_topics(topics: Vec<RelatedTopic>, out: &mut Vec<String>) {
    for topic in topics {
        match topic {
            RelatedTopic::Topic { text } => out.push(text),
            RelatedTopic::Group { topics } => flatten_topics(topics, out),
        }
    }
}

fn into_hits(answer: InstantAnswer, max_results: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    let heading = if answer.heading.is_empty() {
        "Answer".to_string()
    } else {
        answer.heading
    };

    if !answer.answer.trim().is_empty() {
        hits.push(SearchHit::new(heading.clone(), answer.answer.trim()));
    }
    if !answer.abstract_text.trim().is_empty() {
        hits.push(SearchHit::new(heading, answer.abstract_text.trim()));
    }

    let mut related = Vec::new();
    flatten_topics(answer.related_topics, &mut related);
    for text in related.into_iter().filter(|t| !t.trim().is_empty()) {
        let hit = match text.split_once(" - ") {
            Some((title, body)) => SearchHit::new(title.trim(), body.trim()),
            None => SearchHit::new(text.trim(), text.trim()),
        };
        hits.push(hit);
    }

    hits.truncate(max_results);
    hits
}

#[async_trait]
impl SearchService for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<SearchHit>> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .context("search request failed")?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("search returned HTTP {}", response.status()));
        }

        // The API serves JSON with a javascript content type.
        let body = response.text().await.context("could not read search response")?;
        let answer: InstantAnswer =
            serde_json::from_str(&body).context("malformed search response")?;

        let hits = into_hits(answer, max_results);
        tracing::debug!(query, hits = hits.len(), "search complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn maps_abstract_and_related_topics() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "rust language"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Heading": "Rust (programming language)",
                "AbstractText": "Rust is a systems programming language.",
                "Answer": "",
                "RelatedTopics": [
                    { "Text": "Cargo - The Rust package manager", "FirstURL": "https://x" },
                    { "Name": "Tools", "Topics": [
                        { "Text": "rustc - The Rust compiler", "FirstURL": "https://y" }
                    ]},
                    { "Text": "Ferris - The unofficial mascot", "FirstURL": "https://z" }
                ]
            })))
            .mount(&server)
            .await;

        let search = DuckDuckGoSearch::new().with_base_url(server.uri());
        let hits = search.search("rust language", 3).await.unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "Rust (programming language)");
        assert_eq!(hits[1], SearchHit::new("Cargo", "The Rust package manager"));
        assert_eq!(hits[2], SearchHit::new("rustc", "The Rust compiler"));
    }

    #[tokio::test]
    async fn empty_answer_yields_no_hits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"Heading":"","AbstractText":"","RelatedTopics":[]}"#,
            ))
            .mount(&server)
            .await;

        let search = DuckDuckGoSearch::new().with_base_url(server.uri());
        assert!(search.search("zzzz", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let search = DuckDuckGoSearch::new().with_base_url(server.uri());
        let err = search.search("x", 3).await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }
}
