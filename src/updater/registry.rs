//! Topic → callback registry.
//!
//! Pure in-memory bookkeeping. Fanout snapshots the callbacks for a topic
//! under the lock and invokes them after releasing it, so a callback may
//! register or unregister without deadlocking.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use tracing::{debug, error};
use uuid::Uuid;

use super::Topic;

/// Invoked when the topic it is registered under is notified.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`TopicRegistry::register`], only used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(Uuid);

impl CallbackId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Holds callbacks per topic, in registration order.
#[derive(Default)]
pub struct TopicRegistry {
    topics: Mutex<HashMap<Topic, Vec<(CallbackId, Callback)>>>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback under `topic` and return its fresh id.
    pub fn register(&self, topic: Topic, callback: Callback) -> CallbackId {
        let id = CallbackId::new();
        self.topics
            .lock()
            .unwrap()
            .entry(topic)
            .or_default()
            .push((id, callback));
        debug!(%id, ?topic, "registered update callback");
        id
    }

    /// Remove a callback. Unknown ids are ignored.
    pub fn unregister(&self, id: CallbackId, topic: Topic) {
        let mut topics = self.topics.lock().unwrap();
        if let Some(callbacks) = topics.get_mut(&topic) {
            callbacks.retain(|(existing, _)| *existing != id);
            if callbacks.is_empty() {
                topics.remove(&topic);
            }
            debug!(%id, ?topic, "unregistered update callback");
        }
    }

    /// Invoke every callback registered under `topic`.
    /// Returns the number of callbacks that ran to completion.
    pub fn notify(&self, topic: Topic) -> usize {
        let callbacks: Vec<(CallbackId, Callback)> = self
            .topics
            .lock()
            .unwrap()
            .get(&topic)
            .cloned()
            .unwrap_or_default();
        invoke(&callbacks)
    }

    /// Invoke every registered callback once, across all topics.
    pub fn notify_all(&self) -> usize {
        let callbacks: Vec<(CallbackId, Callback)> = self
            .topics
            .lock()
            .unwrap()
            .values()
            .flat_map(|callbacks| callbacks.iter().cloned())
            .collect();
        invoke(&callbacks)
    }

    /// Number of callbacks under `topic`.
    pub fn len(&self, topic: Topic) -> usize {
        self.topics
            .lock()
            .unwrap()
            .get(&topic)
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.topics.lock().unwrap().is_empty()
    }
}

/// A panicking callback must not starve the rest of the fanout.
fn invoke(callbacks: &[(CallbackId, Callback)]) -> usize {
    let mut ran = 0;
    for (id, callback) in callbacks {
        match catch_unwind(AssertUnwindSafe(|| callback())) {
            Ok(()) => ran += 1,
            Err(_) => error!(%id, "update callback panicked"),
        }
    }
    ran
}
