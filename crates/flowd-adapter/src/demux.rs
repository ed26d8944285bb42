//! Network to subprocess: one task per input endpoint.

use flowd_frame::{FlowdCodec, FrameError};
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, warn};

use crate::endpoint::InputEndpoint;
use crate::process::SubprocessInput;

/// Why a connection stopped delivering frames.
#[derive(Debug)]
pub enum StreamEnd {
    /// Clean end of stream between frames.
    Eof,
    /// Malformed bytes, a truncated trailing frame, or a read error.
    Failed(FrameError),
}

/// Forward frames from one input endpoint until it is closed for good.
///
/// After a clean disconnect a reconnectable endpoint re-listens on the same
/// address and serves the next peer; an ephemeral one is closed.
pub async fn run_input<W>(mut endpoint: InputEndpoint, input: SubprocessInput<W>)
where
    W: AsyncWrite + Unpin,
{
    let port = endpoint.local_port().to_string();
    while let Some(conn) = endpoint.take_connection() {
        let peer = conn.peer().to_string();
        match forward_frames(conn, &port, &peer, &input).await {
            StreamEnd::Eof if endpoint.reconnectable() => {
                info!(%port, %peer, "peer disconnected, re-listening");
                if let Err(err) = endpoint.relisten().await {
                    error!(%port, error = %err, "re-listen failed, closing input");
                }
            }
            StreamEnd::Eof => {
                info!(%port, %peer, "peer disconnected, closing ephemeral input");
            }
            StreamEnd::Failed(err) => {
                warn!(%port, %peer, error = %err, "bad input stream, closing input");
            }
        }
    }
    endpoint.close();
    debug!(%port, "input closed");
}

/// Decode frames from `reader` and write those addressed to `local_port`
/// to the subprocess.
pub async fn forward_frames<R, W>(
    reader: R,
    local_port: &str,
    peer: &str,
    input: &SubprocessInput<W>,
) -> StreamEnd
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut frames = FramedRead::new(reader, FlowdCodec::new());
    loop {
        let frame = match frames.next().await {
            None => return StreamEnd::Eof,
            Some(Err(err)) => return StreamEnd::Failed(err),
            Some(Ok(frame)) => frame,
        };

        if frame.port != local_port {
            warn!(
                port = local_port,
                frame_port = %frame.port,
                peer,
                "discarding frame addressed to another port"
            );
            continue;
        }

        debug!(port = local_port, kind = %frame.kind, subtype = %frame.subtype, "frame received");
        let bytes = frame.body.len();
        match input.send(frame).await {
            Ok(()) => info!(port = local_port, bytes, peer, "in xfer"),
            Err(err) => error!(
                port = local_port,
                bytes,
                error = %err,
                "write to subprocess failed, frame discarded"
            ),
        }
    }
}
