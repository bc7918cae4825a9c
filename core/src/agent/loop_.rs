use crate::agent::ToolRegistry;
use crate::providers::ProviderGateway;
use std::sync::Arc;

pub const DEFAULT_MAX_STEPS: usize = 5;
pub const MAX_STEPS_CAP: usize = 20;

pub const OBSERVATION_OPEN: &str = "[[OBSERVATION]]";
pub const OBSERVATION_CLOSE: &str = "[[/OBSERVATION]]";

/// Think / act / observe loop over the tool registry.
pub struct AutonomousAgent {
    gateway: Arc<ProviderGateway>,
    registry: Arc<ToolRegistry>,
    max_steps: usize,
}

impl AutonomousAgent {
    pub fn new(gateway: Arc<ProviderGateway>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            gateway,
            registry,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max.clamp(1, MAX_STEPS_CAP);
        self
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    fn system_prompt(&self, goal: &str) -> String {
        format!(
            "You are an autonomous AI developer working in the user's workspace.\n\n{}\nGoal: {}",
            self.registry.protocol_instructions(),
            goal
        )
    }

    pub async fn think_and_act(&self, goal: &str) -> String {
        let system_prompt = self.system_prompt(goal);
        let mut transcript = goal.to_string();
        let mut last_output = String::new();

        for step in 1..=self.max_steps {
            let output = match self.gateway.try_generate(&transcript, &system_prompt).await {
                Ok(output) => output,
                Err(e) => return e.to_string(),
            };

            let Some(invocation) = self.registry.run(&output).await else {
                tracing::info!(step, "agent finished");
                return output;
            };

            tracing::info!(step, tool = %invocation.tool_name, "agent step");
            let observation = invocation.result.unwrap_or_default();
            transcript.push_str("\n\n");
            transcript.push_str(output.trim());
            transcript.push_str(&format!(
                "\n\n{OBSERVATION_OPEN}\n{observation}\n{OBSERVATION_CLOSE}"
            ));
            last_output = output;
        }

        tracing::warn!(max_steps = self.max_steps, "agent stopped at step limit");
        format!(
            "{}\n\n(Stopped after {} steps without a final answer.)",
            last_output.trim(),
            self.max_steps
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ConfigService};
    use crate::memory::JsonMemory;
    use crate::providers::{ProviderConfig, ProviderFactory};
    use crate::traits::{ChatRequest, ChatResponse, Provider};
    use crate::vfs::LocalVfs;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Scripted {
        replies: Mutex<VecDeque<String>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Provider for Scripted {
        fn name(&self) -> &str {
            "Ollama"
        }

        async fn chat(&self, request: ChatRequest<'_>, _: &str, _: f64) -> anyhow::Result<ChatResponse> {
            let prompt = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            self.prompts.lock().unwrap().push(prompt);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "[[TOOL_CALL]]\nname: list_files\npath: .\n[[/TOOL_CALL]]".into());
            Ok(ChatResponse::text(reply))
        }
    }

    fn agent(tmp: &TempDir, replies: &[&str]) -> (AutonomousAgent, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let provider = Arc::new(Scripted {
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
            prompts: prompts.clone(),
        });
        let factory: ProviderFactory = Box::new(move |_: &ProviderConfig| {
            Ok(provider.clone() as Arc<dyn Provider>)
        });
        let config = Config {
            provider: "ollama".into(),
            ..Default::default()
        };
        let gateway = Arc::new(ProviderGateway::with_factory(
            Arc::new(ConfigService::new(config)),
            factory,
            |_| None,
        ));
        let registry = Arc::new(ToolRegistry::with_defaults(
            Arc::new(LocalVfs::new(tmp.path())),
            Arc::new(JsonMemory::open(tmp.path().join("m.json"))),
            Duration::from_secs(5),
        ));
        (AutonomousAgent::new(gateway, registry), prompts)
    }

    #[tokio::test]
    async fn executes_tool_then_answers() {
        let tmp = TempDir::new().unwrap();
        let (agent, prompts) = agent(
            &tmp,
            &[
                "[[TOOL_CALL]]\nname: write_file\npath: hello.txt\ncontent: hi there\n[[/TOOL_CALL]]",
                "Created hello.txt.",
            ],
        );

        let answer = agent.think_and_act("Create hello.txt").await;
        assert_eq!(answer, "Created hello.txt.");
        assert_eq!(std::fs::read_to_string(tmp.path().join("hello.txt")).unwrap(), "hi there");

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts[0], "Create hello.txt");
        assert!(prompts[1].contains("[[OBSERVATION]]\nSuccessfully wrote 8 bytes to hello.txt\n[[/OBSERVATION]]"));
    }

    #[tokio::test]
    async fn stops_at_step_cap() {
        let tmp = TempDir::new().unwrap();
        let (agent, prompts) = agent(&tmp, &[]);
        let agent = agent.with_max_steps(3);

        let answer = agent.think_and_act("loop forever").await;
        assert!(answer.ends_with("(Stopped after 3 steps without a final answer.)"));
        assert_eq!(prompts.lock().unwrap().len(), 3);
    }

    #[test]
    fn step_cap_is_clamped() {
        let tmp = TempDir::new().unwrap();
        let (agent, _) = agent(&tmp, &[]);
        assert_eq!(agent.max_steps(), DEFAULT_MAX_STEPS);
        assert_eq!(agent.with_max_steps(500).max_steps(), MAX_STEPS_CAP);
    }
}
