//! Unframed byte copy, used when framing is disabled for a direction.

use flowd_transport::Connection;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::endpoint::{InputEndpoint, OutputEndpoint};
use crate::process::SubprocessInput;

const CHUNK_SIZE: usize = 8 * 1024;

/// Copy one input connection to the subprocess chunk by chunk.
///
/// Ends at EOF or on error; raw inputs do not re-listen.
pub async fn run_raw_input<W>(mut endpoint: InputEndpoint, input: SubprocessInput<W>)
where
    W: AsyncWrite + Unpin,
{
    let port = endpoint.local_port().to_string();
    if let Some(conn) = endpoint.take_connection() {
        let peer = conn.peer().to_string();
        copy_chunks(conn, &port, &peer, &input).await;
    }
    endpoint.close();
    debug!(%port, "raw input closed");
}

async fn copy_chunks<R, W>(mut reader: R, port: &str, peer: &str, input: &SubprocessInput<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                info!(port, peer, "peer disconnected");
                return;
            }
            Ok(n) => n,
            Err(err) => {
                warn!(port, peer, error = %err, "read failed, closing raw input");
                return;
            }
        };
        if let Err(err) = input.write_raw(&buf[..n]).await {
            warn!(port, bytes = n, error = %err, "write to subprocess failed, closing raw input");
            return;
        }
        info!(port, bytes = n, peer, "in xfer");
    }
}

struct RawTarget<W> {
    port: String,
    writer: Option<W>,
}

/// Every output endpoint, fed with identical unframed chunks.
pub struct RawOutputs<W> {
    targets: Vec<RawTarget<W>>,
}

impl<W: AsyncWrite + Unpin> Default for RawOutputs<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: AsyncWrite + Unpin> RawOutputs<W> {
    pub fn new() -> Self {
        Self {
            targets: Vec::new(),
        }
    }

    pub fn add(&mut self, port: impl Into<String>, writer: W) {
        self.targets.push(RawTarget {
            port: port.into(),
            writer: Some(writer),
        });
    }

    /// Copy subprocess stdout to every open output until EOF.
    pub async fn run<R: AsyncRead + Unpin>(mut self, mut stdout: R) -> crate::error::Result<()> {
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = stdout.read(&mut buf).await?;
            if n == 0 {
                debug!("subprocess stdout closed");
                break;
            }
            self.broadcast(&buf[..n]).await;
        }
        self.close_all().await;
        Ok(())
    }

    async fn broadcast(&mut self, chunk: &[u8]) {
        for target in &mut self.targets {
            let Some(writer) = target.writer.as_mut() else {
                continue;
            };
            match writer.write_all(chunk).await {
                Ok(()) => info!(port = %target.port, bytes = chunk.len(), "out xfer"),
                Err(err) => {
                    warn!(port = %target.port, error = %err, "write to output failed, closing it");
                    target.writer = None;
                }
            }
        }
    }

    async fn close_all(&mut self) {
        for target in &mut self.targets {
            if let Some(mut writer) = target.writer.take() {
                let _ = writer.shutdown().await;
            }
        }
    }
}

impl RawOutputs<Connection> {
    pub fn from_endpoints(endpoints: impl IntoIterator<Item = OutputEndpoint>) -> Self {
        let mut outputs = Self::new();
        for mut endpoint in endpoints {
            if let Some(conn) = endpoint.take_connection() {
                outputs.add(endpoint.local_port(), conn);
            }
        }
        outputs
    }
}
