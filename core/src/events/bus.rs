//! Topic-based publish/subscribe.
//!
//! Subscribers are plain callbacks invoked synchronously on the publishing
//! thread, in the order they subscribed. The subscriber list for a topic is
//! snapshotted before delivery, so a callback may itself subscribe or
//! unsubscribe. A panicking callback is logged and skipped; the remaining
//! subscribers still receive the event.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

pub const AI_RESPONSE_READY: &str = "ai_response_ready";
pub const CONFIG_CHANGED: &str = "config_changed";
pub const VFS_WRITE: &str = "vfs_write";
pub const SERVICE_REGISTERED: &str = "service_registered";

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: Uuid,
    pub topic: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn payload_text(&self) -> Option<&str> {
        self.payload.as_str()
    }
}

pub type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<HashMap<String, Vec<(SubscriptionId, Callback)>>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subscribers = self.lock();
        let topics: HashMap<&str, usize> = subscribers
            .iter()
            .map(|(topic, subs)| (topic.as_str(), subs.len()))
            .collect();
        f.debug_struct("EventBus").field("topics", &topics).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<(SubscriptionId, Callback)>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe<F>(&self, topic: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()
            .entry(topic.to_string())
            .or_default()
            .push((id, Arc::new(callback)));
        tracing::debug!(topic, "event subscriber added");
        id
    }

    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let Some(subs) = subscribers.get_mut(topic) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|(sub_id, _)| *sub_id != id);
        before != subs.len()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock().get(topic).map_or(0, Vec::len)
    }

    /// Deliver `payload` to every current subscriber of `topic`.
    ///
    /// Returns the number of callbacks that completed without panicking.
    pub fn publish(&self, topic: &str, payload: Value) -> usize {
        let event = Event::new(topic, payload);
        let callbacks: Vec<Callback> = self
            .lock()
            .get(topic)
            .map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();

        let mut delivered = 0;
        for callback in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    tracing::error!(
                        topic,
                        event_id = %event.id,
                        error = %panic_message(panic.as_ref()),
                        "event subscriber failed"
                    );
                }
            }
        }

        tracing::trace!(topic, delivered, "event published");
        delivered
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
