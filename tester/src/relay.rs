//! Line relay
//!
//! Disposable fixture feeder: serves the lines of one file to the first
//! client that connects, then closes the connection and the listener.

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpListener;

use shared::{ComponentId, component_debug, component_info};

use crate::error::{HarnessError, HarnessResult};

const COMPONENT: ComponentId = ComponentId::Relay;

/// Port used when none is given
pub const DEFAULT_RELAY_PORT: u16 = 9999;

/// Serve the lines of `path` on `0.0.0.0:port`; returns the number of lines written
pub async fn relay_file(path: &Path, port: u16) -> HarnessResult<usize> {
    let file = File::open(path)
        .await
        .map_err(|e| HarnessError::fixture(path.display().to_string(), e.to_string()))?;

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    relay_lines(BufReader::new(file), listener).await
}

/// Serve `input` line by line to the first client accepted on `listener`
pub async fn relay_lines<R>(input: R, listener: TcpListener) -> HarnessResult<usize>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let local = listener.local_addr()?;
    component_info!(COMPONENT, "📡 Waiting for a client on {}", local);

    let (stream, peer) = listener.accept().await?;
    drop(listener);
    component_info!(COMPONENT, "🔗 Client {} connected", peer);

    let mut writer = BufWriter::new(stream);
    let mut lines = input.lines();
    let mut written = 0;
    while let Some(line) = lines.next_line().await? {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        written += 1;
    }
    writer.flush().await?;
    let mut stream = writer.into_inner();
    stream.shutdown().await?;

    component_debug!(COMPONENT, "Relayed {} lines to {}", written, peer);
    Ok(written)
}
