use crate::agent::context::{ContextBuilder, DRAFT_SYSTEM_PROMPT, FINAL_SYSTEM_PROMPT, RetrievedFacts};
use crate::agent::directive::Directive;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::providers::ProviderGateway;
use crate::traits::memory::DEFAULT_CONTEXT_LIMIT;
use crate::traits::{Memory, MemorySource, SearchHit, SearchService};
use serde::Serialize;
use std::sync::Arc;

pub const MAX_SEARCH_CYCLES: usize = 3;
pub const DEFAULT_MAX_RESULTS: usize = 3;

/// Everything that happened during one `think` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReasoningTrace {
    pub user_input: String,
    pub draft_output: String,
    pub search_query: Option<String>,
    pub retrieved_facts: Vec<String>,
    pub final_answer: String,
    pub generation_calls: usize,
    pub retrieval_calls: usize,
}

/// Runs the draft / search / finalize protocol over a gateway, a memory
/// store and a keyword search service.
pub struct ReasoningOrchestrator {
    gateway: Arc<ProviderGateway>,
    memory: Arc<dyn Memory>,
    search: Arc<dyn SearchService>,
    max_iterations: usize,
    max_results: usize,
}

impl ReasoningOrchestrator {
    pub fn new(
        gateway: Arc<ProviderGateway>,
        memory: Arc<dyn Memory>,
        search: Arc<dyn SearchService>,
    ) -> Self {
        Self {
            gateway,
            memory,
            search,
            max_iterations: 1,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn from_config(
        gateway: Arc<ProviderGateway>,
        memory: Arc<dyn Memory>,
        search: Arc<dyn SearchService>,
        config: &Config,
    ) -> Self {
        Self::new(gateway, memory, search)
            .with_max_iterations(config.max_search_cycles)
            .with_max_results(config.search_max_results)
    }

    /// Number of retrieval cycles per call, clamped to `1..=3`.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.clamp(1, MAX_SEARCH_CYCLES);
        self
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max.max(1);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn memory(&self) -> &Arc<dyn Memory> {
        &self.memory
    }

    pub async fn think(&self, user_input: &str) -> String {
        self.think_traced(user_input).await.final_answer
    }

    pub async fn think_traced(&self, user_input: &str) -> ReasoningTrace {
        let memory_context = self
            .memory
            .context_string(user_input, DEFAULT_CONTEXT_LIMIT)
            .await;
        let context = ContextBuilder::new(user_input, &memory_context);

        let mut trace = ReasoningTrace {
            user_input: user_input.to_string(),
            ..Default::default()
        };

        let draft = self
            .gateway
            .generate_raw(&context.draft_prompt(), DRAFT_SYSTEM_PROMPT)
            .await;
        trace.generation_calls += 1;
        trace.draft_output = draft.clone();

        let mut output = draft;
        let mut facts: Vec<RetrievedFacts> = Vec::new();

        for cycle in 1..=self.max_iterations {
            let query = match Directive::parse(&output) {
                Directive::Search { query } => query,
                Directive::EmptySearch => {
                    tracing::warn!("model asked for a search without a query");
                    trace.final_answer = failure_note("", "empty search query", &output);
                    log_trace(&trace);
                    return trace;
                }
                _ => break,
            };
            trace.search_query.get_or_insert_with(|| query.clone());
            trace.retrieval_calls += 1;

            let summary = match self.retrieve(&query).await {
                Ok(summary) => summary,
                Err(e) => {
                    let reason = match e {
                        CoreError::Retrieval(reason) => reason,
                        other => other.to_string(),
                    };
                    tracing::warn!(query = %query, error = %reason, "retrieval failed");
                    trace.final_answer = failure_note(&query, &reason, &output);
                    log_trace(&trace);
                    return trace;
                }
            };

            if let Err(e) = self
                .memory
                .append(&query, &summary, MemorySource::WebSearch)
                .await
            {
                tracing::warn!(query = %query, error = %e, "could not remember search result");
            }

            trace.retrieved_facts.push(summary.clone());
            facts.push(RetrievedFacts { query, summary });

            let prompt = if cycle < self.max_iterations {
                context.refine_prompt(&facts)
            } else {
                context.final_prompt(&facts)
            };
            output = self.gateway.generate_raw(&prompt, FINAL_SYSTEM_PROMPT).await;
            trace.generation_calls += 1;
        }

        trace.final_answer = output;
        log_trace(&trace);
        trace
    }

    async fn retrieve(&self, query: &str) -> CoreResult<String> {
        let hits = self
            .search
            .search(query, self.max_results)
            .await
            .map_err(|e| CoreError::Retrieval(format!("{e:#}")))?;

        if hits.is_empty() {
            return Err(CoreError::Retrieval("no results".to_string()));
        }
        Ok(summarize(&hits[..hits.len().min(self.max_results)]))
    }
}

fn failure_note(query: &str, reason: &str, output: &str) -> String {
    format!("I tried to search for '{query}' but failed: {reason}. Here is what I know: {output}")
}

fn summarize(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| format!("- {}: {}", hit.title, hit.body))
        .collect::<Vec<_>>()
        .join("\n")
}

fn log_trace(trace: &ReasoningTrace) {
    tracing::debug!(
        search_query = ?trace.search_query,
        retrievals = trace.retrieval_calls,
        generations = trace.generation_calls,
        answer_len = trace.final_answer.len(),
        "reasoning complete"
    );
}
