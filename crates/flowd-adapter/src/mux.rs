//! Subprocess to network: the single output task.

use std::collections::BTreeMap;

use flowd_frame::{FlowdCodec, Frame};
use flowd_transport::Connection;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use crate::endpoint::OutputEndpoint;
use crate::error::{AdapterError, Result};

struct Route<W> {
    remote_port: String,
    peer: String,
    /// `None` once a write failed.
    sink: Option<FramedWrite<W, FlowdCodec>>,
}

/// Routes subprocess frames to output endpoints by port.
///
/// Owns every output connection. Frames keep their order per endpoint.
pub struct OutputMux<W> {
    routes: BTreeMap<String, Route<W>>,
}

impl<W: AsyncWrite + Unpin> Default for OutputMux<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: AsyncWrite + Unpin> OutputMux<W> {
    pub fn new() -> Self {
        Self {
            routes: BTreeMap::new(),
        }
    }

    /// Route frames on `local_port` to `writer`, renamed to `remote_port`.
    pub fn add_route(
        &mut self,
        local_port: impl Into<String>,
        remote_port: impl Into<String>,
        peer: impl Into<String>,
        writer: W,
    ) {
        self.routes.insert(
            local_port.into(),
            Route {
                remote_port: remote_port.into(),
                peer: peer.into(),
                sink: Some(FramedWrite::new(writer, FlowdCodec::new())),
            },
        );
    }

    /// Number of routes still able to take frames.
    pub fn open_routes(&self) -> usize {
        self.routes.values().filter(|r| r.sink.is_some()).count()
    }

    /// Forward frames from the subprocess stdout until it ends.
    ///
    /// Clean end of stream is a normal stop. A malformed frame or a frame
    /// for an undeclared port is fatal. Every output is closed either way.
    pub async fn run<R: AsyncRead + Unpin>(mut self, stdout: R) -> Result<()> {
        let mut frames = FramedRead::new(stdout, FlowdCodec::new());
        let result = loop {
            match frames.next().await {
                None => {
                    debug!("subprocess stdout closed");
                    break Ok(());
                }
                Some(Err(err)) => break Err(AdapterError::SubprocessProtocol(err)),
                Some(Ok(frame)) => {
                    if let Err(err) = self.route(frame).await {
                        break Err(err);
                    }
                }
            }
        };

        if let Err(err) = &result {
            error!(error = %err, "output stream failed, closing all outputs");
        }
        self.close_all().await;
        result
    }

    async fn route(&mut self, mut frame: Frame) -> Result<()> {
        let Some(route) = self.routes.get_mut(&frame.port) else {
            return Err(AdapterError::UnroutableFrame(frame.port));
        };
        let Some(sink) = route.sink.as_mut() else {
            warn!(port = %frame.port, "output closed, discarding frame");
            return Ok(());
        };

        let local_port = std::mem::replace(&mut frame.port, route.remote_port.clone());
        let bytes = frame.body.len();
        debug!(port = %local_port, kind = %frame.kind, subtype = %frame.subtype, "frame sent");
        match sink.send(frame).await {
            Ok(()) => info!(
                port = %local_port,
                remote_port = %route.remote_port,
                bytes,
                peer = %route.peer,
                "out xfer"
            ),
            Err(err) => {
                warn!(
                    port = %local_port,
                    peer = %route.peer,
                    error = %err,
                    "write to output failed, closing it"
                );
                route.sink = None;
            }
        }
        Ok(())
    }

    async fn close_all(&mut self) {
        for (port, route) in &mut self.routes {
            if let Some(mut sink) = route.sink.take() {
                if let Err(err) = sink.close().await {
                    debug!(%port, error = %err, "output close failed");
                }
            }
        }
    }
}

impl OutputMux<Connection> {
    /// Build routes from connected output endpoints.
    pub fn from_endpoints(endpoints: impl IntoIterator<Item = OutputEndpoint>) -> Result<Self> {
        let mut mux = Self::new();
        for mut endpoint in endpoints {
            let conn = endpoint.take_connection().ok_or_else(|| {
                AdapterError::Task(format!("output {} is not connected", endpoint.local_port()))
            })?;
            let peer = conn.peer().to_string();
            mux.add_route(endpoint.local_port(), endpoint.remote_port(), peer, conn);
        }
        Ok(mux)
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use bytes::BytesMut;
    use flowd_frame::{encode_frame, FrameReader};
    use tokio::io::{AsyncReadExt, DuplexStream};

    use super::*;

    fn wire(frames: &[Frame]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for frame in frames {
            encode_frame(frame, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    async fn drain(mut reader: DuplexStream) -> Vec<Frame> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        FrameReader::new(out.as_slice())
            .collect::<flowd_frame::Result<_>>()
            .unwrap()
    }

    #[tokio::test]
    async fn routes_and_rewrites_ports() {
        let (a_writer, a_reader) = tokio::io::duplex(4096);
        let (c_writer, c_reader) = tokio::io::duplex(4096);
        let mut mux = OutputMux::new();
        mux.add_route("a", "b", "peer-a", a_writer);
        mux.add_route("c", "c", "peer-c", c_writer);

        let stdout = wire(&[
            Frame::data("X", "a", "1"),
            Frame::data("X", "c", "2"),
            Frame::data("X", "a", "3"),
        ]);
        mux.run(stdout.as_slice()).await.unwrap();

        let a = drain(a_reader).await;
        let c = drain(c_reader).await;
        assert_eq!(a.len(), 2);
        assert!(a.iter().all(|f| f.port == "b"));
        assert_eq!(a[0].body.as_ref(), b"1");
        assert_eq!(a[1].body.as_ref(), b"3");
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].port, "c");
    }

    #[tokio::test]
    async fn unroutable_frame_is_fatal_and_closes_outputs() {
        let (a_writer, a_reader) = tokio::io::duplex(4096);
        let mut mux = OutputMux::new();
        mux.add_route("a", "a", "peer-a", a_writer);

        let stdout = wire(&[
            Frame::data("X", "a", "before"),
            Frame::data("X", "nowhere", "lost"),
            Frame::data("X", "a", "after"),
        ]);
        let err = mux.run(stdout.as_slice()).await.unwrap_err();
        assert!(matches!(err, AdapterError::UnroutableFrame(ref port) if port == "nowhere"));

        // read_to_end returning proves the output was closed.
        let a = drain(a_reader).await;
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].body.as_ref(), b"before");
    }

    #[tokio::test]
    async fn malformed_stdout_is_fatal() {
        let mux: OutputMux<DuplexStream> = OutputMux::new();
        let err = mux.run(&b"not a frame\r\n\r\n"[..]).await.unwrap_err();
        assert!(matches!(err, AdapterError::SubprocessProtocol(_)));

        let mux: OutputMux<DuplexStream> = OutputMux::new();
        let err = mux
            .run(&b"data.X\r\nPort: a\r\nContent-Length: 9\r\n\r\nab"[..])
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::SubprocessProtocol(_)));
    }

    #[tokio::test]
    async fn write_failure_marks_route_closed() {
        let mut mux = OutputMux::new();
        mux.add_route("bad", "bad", "peer-bad", Failing);
        assert_eq!(mux.open_routes(), 1);

        mux.route(Frame::data("X", "bad", "1")).await.unwrap();
        assert_eq!(mux.open_routes(), 0);
        // Later frames for the closed route are discarded, not fatal.
        mux.route(Frame::data("X", "bad", "2")).await.unwrap();
    }

    struct Failing;

    impl AsyncWrite for Failing {
        fn poll_write(
            self: Pin<&mut Self>,
            _: &mut Context<'_>,
            _: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe)))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }
}
