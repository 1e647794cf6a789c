//! Embedded topic broker
//!
//! Topics are append-only logs. A subscription always starts at offset 0, so a
//! job that subscribes after records were published still sees all of them.
//! Deleting a topic closes it: subscribers drain what is left and then observe
//! end-of-stream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::debug;

use crate::error::{ClusterError, ClusterResult};

#[derive(Debug, Default)]
struct TopicState {
    records: Vec<String>,
    closed: bool,
}

#[derive(Debug, Default)]
struct TopicLog {
    state: Mutex<TopicState>,
    notify: Notify,
}

impl TopicLog {
    fn state(&self) -> MutexGuard<'_, TopicState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cheap-clone handle to a set of named topics
#[derive(Debug, Clone, Default)]
pub struct EmbeddedBroker {
    topics: Arc<Mutex<HashMap<String, Arc<TopicLog>>>>,
}

impl EmbeddedBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn topics(&self) -> MutexGuard<'_, HashMap<String, Arc<TopicLog>>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn topic(&self, topic: &str) -> ClusterResult<Arc<TopicLog>> {
        self.topics()
            .get(topic)
            .cloned()
            .ok_or_else(|| ClusterError::UnknownTopic { topic: topic.to_string() })
    }

    pub fn create_topic(&self, topic: &str) -> ClusterResult<()> {
        let mut topics = self.topics();
        if topics.contains_key(topic) {
            return Err(ClusterError::TopicExists { topic: topic.to_string() });
        }
        topics.insert(topic.to_string(), Arc::new(TopicLog::default()));
        debug!("📬 Created topic '{}'", topic);
        Ok(())
    }

    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics().contains_key(topic)
    }

    pub fn publish(&self, topic: &str, record: String) -> ClusterResult<()> {
        let log = self.topic(topic)?;
        {
            let mut state = log.state();
            if state.closed {
                return Err(ClusterError::TopicClosed { topic: topic.to_string() });
            }
            state.records.push(record);
        }
        log.notify.notify_waiters();
        Ok(())
    }

    pub fn subscribe(&self, topic: &str) -> ClusterResult<TopicSubscription> {
        Ok(TopicSubscription {
            topic: topic.to_string(),
            log: self.topic(topic)?,
            offset: 0,
        })
    }

    /// Remove and close a topic; existing subscribers drain and then end
    pub fn delete_topic(&self, topic: &str) -> ClusterResult<()> {
        let log = self
            .topics()
            .remove(topic)
            .ok_or_else(|| ClusterError::UnknownTopic { topic: topic.to_string() })?;
        log.state().closed = true;
        log.notify.notify_waiters();
        debug!("📪 Deleted topic '{}'", topic);
        Ok(())
    }
}

/// Reader over one topic, starting at its first record
#[derive(Debug)]
pub struct TopicSubscription {
    topic: String,
    log: Arc<TopicLog>,
    offset: usize,
}

impl TopicSubscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next record, or `None` once the topic is closed and drained
    ///
    /// Cancel safe: the offset only advances when a record is returned.
    pub async fn next(&mut self) -> Option<String> {
        loop {
            // Register before checking so a publish in between is not missed
            let notified = self.log.notify.notified();
            {
                let state = self.log.state();
                if let Some(record) = state.records.get(self.offset) {
                    self.offset += 1;
                    return Some(record.clone());
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }
}
