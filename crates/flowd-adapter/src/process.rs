use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use flowd_frame::{FlowdCodec, Frame, FrameError};
use futures_util::SinkExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio_util::codec::FramedWrite;
use tracing::{info, warn};

use crate::error::{AdapterError, Result};

/// The running component process.
#[derive(Debug)]
pub struct Subprocess {
    child: Child,
    program: String,
}

impl Subprocess {
    /// Spawn `command` with piped stdin/stdout and inherited stderr.
    ///
    /// The child is killed when the returned handle is dropped.
    pub fn spawn(command: &[String]) -> Result<(Self, ChildStdin, ChildStdout)> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| AdapterError::Config("no subprocess command given".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AdapterError::Spawn {
                command: command.join(" "),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AdapterError::Task("subprocess stdin was not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AdapterError::Task("subprocess stdout was not piped".to_string()))?;

        info!(program = %program, pid = child.id(), "subprocess started");
        Ok((
            Self {
                child,
                program: program.clone(),
            },
            stdin,
            stdout,
        ))
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub async fn wait(&mut self) -> Result<ExitStatus> {
        let status = self.child.wait().await?;
        info!(program = %self.program, %status, "subprocess exited");
        Ok(status)
    }

    /// Kill the child and reap it.
    pub async fn kill(&mut self) {
        if let Err(err) = self.child.kill().await {
            warn!(program = %self.program, error = %err, "failed to kill subprocess");
        }
    }
}

/// The subprocess input, shared by every input task.
///
/// The lock is held for exactly one frame or one raw chunk, so writes
/// from different endpoints never interleave.
#[derive(Debug)]
pub struct SubprocessInput<W> {
    inner: Arc<Mutex<FramedWrite<W, FlowdCodec>>>,
}

impl<W> Clone for SubprocessInput<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: AsyncWrite + Unpin> SubprocessInput<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FramedWrite::new(writer, FlowdCodec::new()))),
        }
    }

    /// Encode and write one frame.
    pub async fn send(&self, frame: Frame) -> std::result::Result<(), FrameError> {
        let mut sink = self.inner.lock().await;
        sink.send(frame).await
    }

    /// Write one unframed chunk, bypassing the codec.
    pub async fn write_raw(&self, chunk: &[u8]) -> std::io::Result<()> {
        let mut sink = self.inner.lock().await;
        let writer = sink.get_mut();
        writer.write_all(chunk).await?;
        writer.flush().await
    }
}
