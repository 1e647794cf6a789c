//! Broker source server
//!
//! Owns one uniquely named topic on the embedded broker for the duration of a
//! run. Deleting the topic on teardown ends the job's input stream.

use async_trait::async_trait;
use uuid::Uuid;

use cluster::{EmbeddedBroker, SourceEndpoint};
use shared::{ComponentId, SourceKind, component_debug, component_info, component_warn};

use super::{ServerState, SourceServer};
use crate::error::{HarnessError, HarnessResult};

const COMPONENT: ComponentId = ComponentId::Source(SourceKind::Broker);

pub struct BrokerSourceServer {
    broker: EmbeddedBroker,
    topic: String,
    state: ServerState,
    created: bool,
}

impl BrokerSourceServer {
    pub fn new(broker: EmbeddedBroker, topic_prefix: &str) -> Self {
        Self::with_topic(broker, format!("{}-{}", topic_prefix, Uuid::new_v4().simple()))
    }

    /// Use a fixed topic name instead of a generated one
    pub fn with_topic(broker: EmbeddedBroker, topic: impl Into<String>) -> Self {
        Self {
            broker,
            topic: topic.into(),
            state: ServerState::Uninitialized,
            created: false,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl SourceServer for BrokerSourceServer {
    fn kind(&self) -> SourceKind {
        SourceKind::Broker
    }

    fn state(&self) -> ServerState {
        self.state
    }

    async fn setup(&mut self) -> HarnessResult<SourceEndpoint> {
        if self.state != ServerState::Uninitialized {
            return Err(HarnessError::ServerSetup {
                kind: SourceKind::Broker,
                reason: format!("server is already {:?}", self.state),
            });
        }
        self.broker
            .create_topic(&self.topic)
            .map_err(|e| HarnessError::ServerSetup {
                kind: SourceKind::Broker,
                reason: e.to_string(),
            })?;
        self.created = true;
        self.state = ServerState::Ready;

        component_info!(COMPONENT, "📬 Broker source ready on topic '{}'", self.topic);
        Ok(SourceEndpoint::Topic(self.topic.clone()))
    }

    async fn write_data(&mut self, records: &[String]) -> HarnessResult<()> {
        if self.state != ServerState::Ready {
            return Err(HarnessError::transport(format!("server is {:?}, not Ready", self.state)));
        }
        for record in records {
            self.broker
                .publish(&self.topic, record.clone())
                .map_err(|e| HarnessError::transport(e.to_string()))?;
        }
        component_debug!(COMPONENT, "📤 Published {} records to '{}'", records.len(), self.topic);
        Ok(())
    }

    async fn tear_down(&mut self) {
        if self.created {
            if let Err(e) = self.broker.delete_topic(&self.topic) {
                component_warn!(COMPONENT, "⚠️ Deleting topic '{}' failed: {}", self.topic, e);
            } else {
                component_info!(COMPONENT, "🧹 Topic '{}' deleted", self.topic);
            }
            self.created = false;
        }
        self.state = ServerState::Closed;
    }
}
