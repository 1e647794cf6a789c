//! Source servers
//!
//! A source server is the transient endpoint that feeds recorded input into
//! the job under test. Exactly one is live per orchestrator run; it is created
//! by the run driver and handed to the orchestrator explicitly.

pub mod broker;
pub mod tcp;

use async_trait::async_trait;
use tokio::runtime::Handle;

use cluster::{EmbeddedBroker, SourceEndpoint};
use shared::SourceKind;

use crate::config::HarnessConfig;
use crate::error::HarnessResult;

pub use broker::BrokerSourceServer;
pub use tcp::TcpSourceServer;

/// Lifecycle of a source server handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Uninitialized,
    Ready,
    Closed,
}

/// Protocol-polymorphic source server capability
#[mockall::automock]
#[async_trait]
pub trait SourceServer: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn state(&self) -> ServerState;

    /// Allocate the listening resource and return where jobs should read from
    ///
    /// Call exactly once per handle.
    async fn setup(&mut self) -> HarnessResult<SourceEndpoint>;

    /// Transmit records downstream in order
    ///
    /// Only valid while the server is `Ready`.
    async fn write_data(&mut self, records: &[String]) -> HarnessResult<()>;

    /// Release every resource; safe after a failed setup, never fails
    async fn tear_down(&mut self);
}

/// Build the source server variant for `kind`
pub fn source_server_for(
    kind: SourceKind,
    config: &HarnessConfig,
    runtime: Handle,
    broker: EmbeddedBroker,
) -> Box<dyn SourceServer> {
    match kind {
        SourceKind::Tcp => Box::new(TcpSourceServer::new(
            runtime,
            config.tcp_host.clone(),
            config.tcp_port,
            config.accept_timeout,
        )),
        SourceKind::Broker => Box::new(BrokerSourceServer::new(broker, &config.topic_prefix)),
    }
}
