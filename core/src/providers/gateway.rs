use super::factory::{ProviderConfig, ProviderId, create_provider, process_env, resolve_provider_config};
use crate::config::ConfigService;
use crate::error::{CoreError, CoreResult};
use crate::traits::{ChatMessage, ChatRequest, Provider};
use std::sync::{Arc, PoisonError, RwLock};

pub type ProviderFactory =
    Box<dyn Fn(&ProviderConfig) -> anyhow::Result<Arc<dyn Provider>> + Send + Sync>;

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

struct ActiveProvider {
    config: ProviderConfig,
    backend: Result<Arc<dyn Provider>, String>,
}

/// Routes generation requests to exactly one active backend.
///
/// The active backend is captured at the start of each call, so a
/// concurrent [`switch_provider`](Self::switch_provider) only affects calls
/// made after it.
pub struct ProviderGateway {
    config: Arc<ConfigService>,
    factory: ProviderFactory,
    env: EnvLookup,
    active: RwLock<ActiveProvider>,
}

impl ProviderGateway {
    /// Gateway over the real HTTP backends, starting on the configured
    /// `provider` (OpenAI when unset or unknown).
    pub fn new(config: Arc<ConfigService>) -> Self {
        Self::with_factory(config, Box::new(create_provider), process_env)
    }

    pub fn with_factory(
        config: Arc<ConfigService>,
        factory: ProviderFactory,
        env: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        let initial = config
            .get("provider")
            .and_then(|p| match p.parse::<ProviderId>() {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!(error = %e, "falling back to default provider");
                    None
                }
            })
            .unwrap_or(ProviderId::OpenAI);

        let env: EnvLookup = Box::new(env);
        let active = build_active(&config, &factory, &env, initial);
        Self {
            config,
            factory,
            env,
            active: RwLock::new(active),
        }
    }

    /// Change the active backend. Never fails: an unconfigured backend is
    /// reported on the next generate call.
    pub fn switch_provider(&self, id: ProviderId) {
        let active = build_active(&self.config, &self.factory, &self.env, id);
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = active;
        tracing::info!(provider = %id, "switched provider");
    }

    pub fn active_provider(&self) -> ProviderId {
        self.read_active().0.provider_id
    }

    pub fn active_config(&self) -> ProviderConfig {
        self.read_active().0
    }

    fn read_active(&self) -> (ProviderConfig, Result<Arc<dyn Provider>, String>) {
        let guard = self.active.read().unwrap_or_else(PoisonError::into_inner);
        (guard.config.clone(), guard.backend.clone())
    }

    pub async fn try_generate(&self, prompt: &str, system_prompt: &str) -> CoreResult<String> {
        let (config, backend) = self.read_active();
        let provider_name = config.provider_id.display_name();

        let backend = backend.map_err(|reason| CoreError::ProviderUnavailable {
            provider: provider_name.to_string(),
            reason,
        })?;

        let mut messages = Vec::with_capacity(2);
        if !system_prompt.trim().is_empty() {
            messages.push(ChatMessage::system(system_prompt));
        }
        messages.push(ChatMessage::user(prompt));

        let temperature = self
            .config
            .get("temperature")
            .and_then(|t| t.parse::<f64>().ok())
            .unwrap_or(0.7);

        let started = std::time::Instant::now();
        let result = backend
            .chat(ChatRequest::new(&messages), &config.model_id, temperature)
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(response) => match response.text.filter(|t| !t.trim().is_empty()) {
                Some(text) => {
                    tracing::debug!(provider = provider_name, model = %config.model_id, duration_ms, "generation complete");
                    Ok(text)
                }
                None => Err(CoreError::ProviderCall {
                    provider: provider_name.to_string(),
                    message: "empty completion".to_string(),
                }),
            },
            Err(e) => {
                tracing::warn!(provider = provider_name, duration_ms, error = %format!("{e:#}"), "generation failed");
                Err(CoreError::provider_call(provider_name, &e))
            }
        }
    }

    /// Text-only form of [`try_generate`](Self::try_generate): failures come
    /// back as `"<Backend> Error: ..."`.
    pub async fn generate_raw(&self, prompt: &str, system_prompt: &str) -> String {
        self.try_generate(prompt, system_prompt)
            .await
            .unwrap_or_else(|e| e.to_string())
    }
}

fn build_active(
    config: &ConfigService,
    factory: &ProviderFactory,
    env: &EnvLookup,
    id: ProviderId,
) -> ActiveProvider {
    let provider_config = resolve_provider_config(config, id, |var| env(var));
    let backend = factory(&provider_config).map_err(|e| {
        tracing::warn!(provider = %id, error = %e, "provider not configured");
        format!("{e:#}")
    });
    ActiveProvider {
        config: provider_config,
        backend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::traits::ChatResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Echo {
        name: &'static str,
        seen: Arc<Mutex<Vec<(Vec<ChatMessage>, String)>>>,
    }

    #[async_trait]
    impl Provider for Echo {
        fn name(&self) -> &str {
            self.name
        }

        async fn chat(
            &self,
            request: ChatRequest<'_>,
            model: &str,
            _temperature: f64,
        ) -> anyhow::Result<ChatResponse> {
            self.seen
                .lock()
                .unwrap()
                .push((request.messages.to_vec(), model.to_string()));
            let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(ChatResponse::text(format!("{}:{}", self.name, last)))
        }
    }

    struct Failing;

    #[async_trait]
    impl Provider for Failing {
        fn name(&self) -> &str {
            "OpenAI"
        }

        async fn chat(&self, _: ChatRequest<'_>, _: &str, _: f64) -> anyhow::Result<ChatResponse> {
            Err(anyhow::anyhow!("503 Service Unavailable"))
        }
    }

    fn echo_factory(seen: Arc<Mutex<Vec<(Vec<ChatMessage>, String)>>>) -> ProviderFactory {
        Box::new(move |cfg: &ProviderConfig| {
            if cfg.provider_id.requires_credential() && cfg.credential.is_none() {
                anyhow::bail!("no credential");
            }
            let provider: Arc<dyn Provider> = Arc::new(Echo {
                name: cfg.provider_id.display_name(),
                seen: seen.clone(),
            });
            Ok(provider)
        })
    }

    fn config_with_openai_key() -> Arc<ConfigService> {
        Arc::new(ConfigService::new(Config {
            openai_key: "sk-stored".into(),
            openai_model: "gpt-4o-mini".into(),
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn routes_system_and_user_messages_to_active_backend() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let gateway =
            ProviderGateway::with_factory(config_with_openai_key(), echo_factory(seen.clone()), |_| None);

        assert_eq!(gateway.active_provider(), ProviderId::OpenAI);
        let text = gateway.generate_raw("hello", "be kind").await;
        assert_eq!(text, "OpenAI:hello");

        let seen = seen.lock().unwrap();
        let (messages, model) = &seen[0];
        assert_eq!(model, "gpt-4o-mini");
        assert_eq!(messages[0], ChatMessage::system("be kind"));
        assert_eq!(messages[1], ChatMessage::user("hello"));
    }

    #[tokio::test]
    async fn switching_to_unconfigured_backend_reports_unavailable() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let gateway =
            ProviderGateway::with_factory(config_with_openai_key(), echo_factory(seen), |_| None);

        gateway.switch_provider(ProviderId::Gemini);
        assert_eq!(gateway.active_provider(), ProviderId::Gemini);

        let err = gateway.try_generate("hi", "").await.unwrap_err();
        assert!(matches!(err, CoreError::ProviderUnavailable { .. }));
        assert!(gateway.generate_raw("hi", "").await.starts_with("Gemini Error:"));
    }

    #[tokio::test]
    async fn environment_credential_enables_backend() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let config = Arc::new(ConfigService::new(Config::default()));
        let gateway = ProviderGateway::with_factory(config, echo_factory(seen), |var| {
            (var == "GEMINI_API_KEY").then(|| "g-env".to_string())
        });

        gateway.switch_provider(ProviderId::Gemini);
        assert_eq!(gateway.generate_raw("q", "").await, "Gemini:q");
        assert_eq!(gateway.active_config().credential.as_deref(), Some("g-env"));
    }

    #[tokio::test]
    async fn backend_failure_is_prefixed_text() {
        let factory: ProviderFactory = Box::new(|_| Ok(Arc::new(Failing) as Arc<dyn Provider>));
        let gateway = ProviderGateway::with_factory(config_with_openai_key(), factory, |_| None);

        assert_eq!(
            gateway.generate_raw("hi", "").await,
            "OpenAI Error: 503 Service Unavailable"
        );
    }

    #[tokio::test]
    async fn unknown_configured_provider_falls_back_to_openai() {
        let config = Arc::new(ConfigService::new(Config {
            provider: "anthropic".into(),
            ..Default::default()
        }));
        let gateway = ProviderGateway::with_factory(config, echo_factory(Arc::default()), |_| None);
        assert_eq!(gateway.active_provider(), ProviderId::OpenAI);
    }
}
