//! Background execution of reasoning requests.
//!
//! A fixed pool of worker tasks drains a bounded queue. When the queue is
//! full, `submit` fails immediately with [`DispatchError::QueueFull`]; it
//! never blocks the caller. Each accepted prompt produces exactly one
//! `ai_response_ready` event, carrying either the answer or the failure
//! text.

use crate::agent::ReasoningOrchestrator;
use crate::events::bus::panic_message;
use crate::events::{AI_RESPONSE_READY, EventBus};
use futures_util::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("dispatch queue is full ({capacity} pending requests)")]
    QueueFull { capacity: usize },

    #[error("dispatcher has been shut down")]
    Closed,
}

pub struct Dispatcher {
    sender: Mutex<Option<mpsc::Sender<String>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    capacity: usize,
}

impl Dispatcher {
    /// Spawn `workers` tasks on the current tokio runtime.
    pub fn start(
        orchestrator: Arc<ReasoningOrchestrator>,
        bus: Arc<EventBus>,
        workers: usize,
        capacity: usize,
    ) -> Self {
        let workers = workers.max(1);
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel::<String>(capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let handles = (0..workers)
            .map(|worker| {
                let rx = rx.clone();
                let orchestrator = orchestrator.clone();
                let bus = bus.clone();
                tokio::spawn(async move {
                    loop {
                        let next = rx.lock().await.recv().await;
                        let Some(prompt) = next else {
                            break;
                        };
                        let answer = run_one(&orchestrator, &prompt, worker).await;
                        bus.publish(AI_RESPONSE_READY, Value::String(answer));
                    }
                    tracing::debug!(worker, "dispatch worker stopped");
                })
            })
            .collect();

        tracing::debug!(workers, capacity, "dispatcher started");
        Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
            capacity,
        }
    }

    /// Queue `prompt` for background reasoning and return immediately.
    pub fn submit(&self, prompt: impl Into<String>) -> Result<(), DispatchError> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            return Err(DispatchError::Closed);
        };

        match sender.try_send(prompt.into()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(capacity = self.capacity, "dispatch queue full, rejecting request");
                Err(DispatchError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Closed(_)) => Err(DispatchError::Closed),
        }
    }

    /// Stop accepting work and wait until everything already queued has
    /// been processed and published.
    pub async fn shutdown(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let handles = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "dispatch worker failed");
            }
        }
    }
}

async fn run_one(orchestrator: &ReasoningOrchestrator, prompt: &str, worker: usize) -> String {
    match AssertUnwindSafe(orchestrator.think(prompt)).catch_unwind().await {
        Ok(answer) => answer,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(worker, error = %message, "reasoning panicked");
            format!("Reasoning failed: {message}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ConfigService};
    use crate::memory::JsonMemory;
    use crate::providers::{ProviderConfig, ProviderFactory, ProviderGateway};
    use crate::traits::{ChatRequest, ChatResponse, Provider, SearchHit, SearchService};
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Slow {
        delay: Duration,
        panic_on: Option<&'static str>,
    }

    #[async_trait]
    impl Provider for Slow {
        fn name(&self) -> &str {
            "OpenAI"
        }

        async fn chat(&self, request: ChatRequest<'_>, _: &str, _: f64) -> anyhow::Result<ChatResponse> {
            let prompt = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            if let Some(trigger) = self.panic_on
                && prompt.contains(trigger)
            {
                panic!("provider blew up");
            }
            tokio::time::sleep(self.delay).await;
            Ok(ChatResponse::text("answer"))
        }
    }

    struct NoSearch;

    #[async_trait]
    impl SearchService for NoSearch {
        fn name(&self) -> &str {
            "none"
        }

        async fn search(&self, _: &str, _: usize) -> anyhow::Result<Vec<SearchHit>> {
            Ok(vec![])
        }
    }

    fn orchestrator(tmp: &TempDir, provider: Slow) -> Arc<ReasoningOrchestrator> {
        let provider = Arc::new(provider);
        let factory: ProviderFactory = Box::new(move |_: &ProviderConfig| {
            Ok(provider.clone() as Arc<dyn Provider>)
        });
        let gateway = Arc::new(ProviderGateway::with_factory(
            Arc::new(ConfigService::new(Config::default())),
            factory,
            |_| None,
        ));
        Arc::new(ReasoningOrchestrator::new(
            gateway,
            Arc::new(JsonMemory::open(tmp.path().join("m.json"))),
            Arc::new(NoSearch),
        ))
    }

    fn collect(bus: &EventBus) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        bus.subscribe(AI_RESPONSE_READY, move |e| {
            s.lock().unwrap().push(e.payload_text().unwrap_or_default().to_string())
        });
        seen
    }

    #[tokio::test]
    async fn full_queue_rejects_without_publishing() {
        let tmp = TempDir::new().unwrap();
        let bus = Arc::new(EventBus::new());
        let seen = collect(&bus);
        let provider = Slow {
            delay: Duration::from_millis(200),
            panic_on: None,
        };
        let dispatcher = Dispatcher::start(orchestrator(&tmp, provider), bus, 1, 1);

        let results: Vec<_> = (0..5).map(|i| dispatcher.submit(format!("q{i}"))).collect();
        let accepted = results.iter().filter(|r| r.is_ok()).count();
        assert!(results.contains(&Err(DispatchError::QueueFull { capacity: 1 })));

        dispatcher.shutdown().await;
        assert_eq!(seen.lock().unwrap().len(), accepted);
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_closed() {
        let tmp = TempDir::new().unwrap();
        let provider = Slow {
            delay: Duration::ZERO,
            panic_on: None,
        };
        let dispatcher =
            Dispatcher::start(orchestrator(&tmp, provider), Arc::new(EventBus::new()), 2, 4);
        dispatcher.shutdown().await;
        assert_eq!(dispatcher.submit("late"), Err(DispatchError::Closed));
    }

    #[tokio::test]
    async fn panic_is_published_as_error_text() {
        let tmp = TempDir::new().unwrap();
        let bus = Arc::new(EventBus::new());
        let seen = collect(&bus);
        let provider = Slow {
            delay: Duration::ZERO,
            panic_on: Some("explode"),
        };
        let dispatcher = Dispatcher::start(orchestrator(&tmp, provider), bus, 2, 8);

        dispatcher.submit("please explode").unwrap();
        dispatcher.submit("calm question").unwrap();
        dispatcher.shutdown().await;

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["Reasoning failed: provider blew up", "answer"]);
    }
}
