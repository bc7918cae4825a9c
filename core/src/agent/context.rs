use crate::agent::directive::{ANSWER_CLOSE, ANSWER_OPEN, SEARCH_OPEN, THOUGHT_CLOSE, THOUGHT_OPEN};
use std::fmt::Write;

pub const DRAFT_SYSTEM_PROMPT: &str = "You are a smart autonomous agent.";
pub const FINAL_SYSTEM_PROMPT: &str = "You are an expert AI with access to real-time data.";

/// One retrieval cycle's worth of gathered knowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedFacts {
    pub query: String,
    pub summary: String,
}

/// Builds the prompts of the think/search/answer protocol.
pub struct ContextBuilder<'a> {
    user_input: &'a str,
    memory_context: &'a str,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(user_input: &'a str, memory_context: &'a str) -> Self {
        Self {
            user_input,
            memory_context,
        }
    }

    fn protocol_instruction(&self) -> String {
        format!(
            "Output exactly one of two formats.\n\n\
             Format 1 (if you need to search):\n\
             {SEARCH_OPEN} <query>]]\n\n\
             Format 2 (if you can answer):\n\
             {THOUGHT_OPEN}\n...your reasoning...\n{THOUGHT_CLOSE}\n\
             {ANSWER_OPEN}\n...your final response...\n{ANSWER_CLOSE}"
        )
    }

    fn memory_section(&self) -> &str {
        if self.memory_context.trim().is_empty() {
            "(no relevant memories)"
        } else {
            self.memory_context.trim_end()
        }
    }

    pub fn draft_prompt(&self) -> String {
        format!(
            "You are an advanced AI agent with access to persistent memory and web search.\n\n\
             User Request: {}\n\n\
             Memory Context:\n{}\n\n\
             First, analyze whether you have enough information to answer. \
             If you are missing critical information about recent events or specific libraries, request a search.\n\n\
             {}",
            self.user_input,
            self.memory_section(),
            self.protocol_instruction()
        )
    }

    /// Prompt for a cycle that may still search again.
    pub fn refine_prompt(&self, facts: &[RetrievedFacts]) -> String {
        format!(
            "User Request: {}\n\n{}\
             Memory Context:\n{}\n\n\
             If the information above is still insufficient, you may request one more search.\n\n\
             {}",
            self.user_input,
            render_facts(facts),
            self.memory_section(),
            self.protocol_instruction()
        )
    }

    pub fn final_prompt(&self, facts: &[RetrievedFacts]) -> String {
        format!(
            "User Request: {}\n\n{}\
             Memory Context:\n{}\n\n\
             Now provide a comprehensive answer.",
            self.user_input,
            render_facts(facts),
            self.memory_section()
        )
    }
}

fn render_facts(facts: &[RetrievedFacts]) -> String {
    let mut out = String::new();
    for fact in facts {
        let _ = write!(
            out,
            "New Information found via Search ({}):\n{}\n\n",
            fact.query, fact.summary
        );
    }
    out
}
