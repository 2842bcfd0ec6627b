//! Ordered multicast registry keyed by topic.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use super::dispatch::{Callback, invoke_all};
use super::Subscription;

struct Topics<T> {
    next_id: u64,
    by_topic: HashMap<String, Vec<(u64, Callback<T>)>>,
}

/// Callbacks grouped by topic name.
///
/// Delivery within a topic follows registration order. A topic is present
/// only while it has at least one callback.
pub struct TopicRegistry<T> {
    topics: Arc<Mutex<Topics<T>>>,
}

impl<T: 'static> TopicRegistry<T> {
    pub fn new() -> Self {
        Self {
            topics: Arc::new(Mutex::new(Topics {
                next_id: 0,
                by_topic: HashMap::new(),
            })),
        }
    }

    pub fn subscribe<F>(&self, topic: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let topic = topic.into();
        let id = {
            let mut topics = self.topics.lock();
            let id = topics.next_id;
            topics.next_id += 1;
            topics
                .by_topic
                .entry(topic.clone())
                .or_default()
                .push((id, Arc::new(callback)));
            id
        };

        let weak: Weak<Mutex<Topics<T>>> = Arc::downgrade(&self.topics);
        Subscription::new(move || {
            let Some(topics) = weak.upgrade() else {
                return;
            };
            let mut topics = topics.lock();
            if let Some(entries) = topics.by_topic.get_mut(&topic) {
                entries.retain(|(entry_id, _)| *entry_id != id);
                if entries.is_empty() {
                    topics.by_topic.remove(&topic);
                }
            }
        })
    }

    /// Deliver `value` to every callback registered for `topic`.
    ///
    /// Returns `(delivered, failed)`.
    pub fn dispatch(&self, topic: &str, value: &T) -> (usize, usize) {
        let snapshot: Vec<Callback<T>> = match self.topics.lock().by_topic.get(topic) {
            Some(entries) => entries.iter().map(|(_, callback)| callback.clone()).collect(),
            None => {
                trace!("No subscribers for topic {}", topic);
                return (0, 0);
            }
        };
        let failed = invoke_all(&snapshot, value, topic);
        (snapshot.len() - failed, failed)
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .by_topic
            .get(topic)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    /// Topics that currently have subscribers, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.lock().by_topic.keys().cloned().collect();
        names.sort();
        names
    }
}

impl<T: 'static> Default for TopicRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for TopicRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            topics: self.topics.clone(),
        }
    }
}
