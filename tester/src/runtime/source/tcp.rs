//! TCP source server
//!
//! Binds a listener, hands the first connecting client (the job's source
//! connector) to `write_data`, and writes one newline-terminated record per
//! line.

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use cluster::SourceEndpoint;
use shared::{ComponentId, SourceKind, component_debug, component_info, component_warn};

use super::{ServerState, SourceServer};
use crate::error::{HarnessError, HarnessResult};

const COMPONENT: ComponentId = ComponentId::Source(SourceKind::Tcp);

pub struct TcpSourceServer {
    runtime: Handle,
    host: String,
    port: u16,
    accept_timeout: Duration,
    state: ServerState,
    local_addr: Option<SocketAddr>,
    accept_task: Option<JoinHandle<()>>,
    incoming: Option<oneshot::Receiver<TcpStream>>,
    client: Option<TcpStream>,
}

impl TcpSourceServer {
    pub fn new(runtime: Handle, host: String, port: u16, accept_timeout: Duration) -> Self {
        Self {
            runtime,
            host,
            port,
            accept_timeout,
            state: ServerState::Uninitialized,
            local_addr: None,
            accept_task: None,
            incoming: None,
            client: None,
        }
    }

    /// Address the listener is bound to, once set up
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn setup_error(reason: impl Into<String>) -> HarnessError {
        HarnessError::ServerSetup {
            kind: SourceKind::Tcp,
            reason: reason.into(),
        }
    }

    async fn client(&mut self) -> HarnessResult<&mut TcpStream> {
        if self.client.is_none() {
            let incoming = self
                .incoming
                .take()
                .ok_or_else(|| HarnessError::transport("no client connection is pending"))?;
            let stream = match timeout(self.accept_timeout, incoming).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(_)) => return Err(HarnessError::transport("listener closed before a client connected")),
                Err(_) => {
                    return Err(HarnessError::transport(format!(
                        "no client connected within {:?}",
                        self.accept_timeout
                    )));
                }
            };
            self.client = Some(stream);
        }
        self.client
            .as_mut()
            .ok_or_else(|| HarnessError::transport("client connection lost"))
    }
}

#[async_trait]
impl SourceServer for TcpSourceServer {
    fn kind(&self) -> SourceKind {
        SourceKind::Tcp
    }

    fn state(&self) -> ServerState {
        self.state
    }

    async fn setup(&mut self) -> HarnessResult<SourceEndpoint> {
        if self.state != ServerState::Uninitialized {
            return Err(Self::setup_error(format!("server is already {:?}", self.state)));
        }

        let listener = TcpListener::bind((self.host.as_str(), self.port))
            .await
            .map_err(|e| Self::setup_error(format!("cannot bind {}:{}: {}", self.host, self.port, e)))?;
        let mut local_addr = listener
            .local_addr()
            .map_err(|e| Self::setup_error(format!("cannot read bound address: {e}")))?;
        if local_addr.ip().is_unspecified() {
            local_addr.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
        }

        let (tx, rx) = oneshot::channel();
        let accept_task = self.runtime.spawn(async move {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    component_debug!(COMPONENT, "🔌 Client connected from {}", peer);
                    let _ = tx.send(stream);
                }
                Err(e) => {
                    component_warn!(COMPONENT, "⚠️ Accept failed: {}", e);
                }
            }
        });

        self.local_addr = Some(local_addr);
        self.accept_task = Some(accept_task);
        self.incoming = Some(rx);
        self.state = ServerState::Ready;

        component_info!(COMPONENT, "📡 TCP source listening on {}", local_addr);
        Ok(SourceEndpoint::Tcp(local_addr))
    }

    async fn write_data(&mut self, records: &[String]) -> HarnessResult<()> {
        if self.state != ServerState::Ready {
            return Err(HarnessError::transport(format!("server is {:?}, not Ready", self.state)));
        }

        let client = self.client().await?;
        for record in records {
            client
                .write_all(format!("{record}\n").as_bytes())
                .await
                .map_err(|e| HarnessError::transport(format!("write failed: {e}")))?;
        }
        client
            .flush()
            .await
            .map_err(|e| HarnessError::transport(format!("flush failed: {e}")))?;

        component_debug!(COMPONENT, "📤 Wrote {} records", records.len());
        Ok(())
    }

    async fn tear_down(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
        self.incoming = None;
        if let Some(mut client) = self.client.take() {
            if let Err(e) = client.shutdown().await {
                component_warn!(COMPONENT, "⚠️ Closing client connection failed: {}", e);
            }
        }
        if self.state != ServerState::Closed {
            component_info!(COMPONENT, "🧹 TCP source closed");
        }
        self.state = ServerState::Closed;
    }
}
