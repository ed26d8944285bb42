//! Turns configured endpoints into live connections, one task each.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::config::RetryPolicy;
use crate::endpoint::{InputEndpoint, OutputEndpoint};
use crate::error::{AdapterError, Result};

/// An endpoint that finished establishment.
#[derive(Debug)]
pub enum Established {
    Input(InputEndpoint),
    Output(OutputEndpoint),
}

/// Completion signal of one establishment task.
///
/// Fires at most once: the sending half is consumed by the send. Dropping
/// a `Readiness` aborts the task behind it.
#[derive(Debug)]
pub struct Readiness<T = Established> {
    label: String,
    rx: oneshot::Receiver<Result<T>>,
    task: AbortHandle,
}

impl<T> Readiness<T> {
    pub fn new(
        label: impl Into<String>,
        rx: oneshot::Receiver<Result<T>>,
        task: AbortHandle,
    ) -> Self {
        Self {
            label: label.into(),
            rx,
            task,
        }
    }

    /// `input <port>` or `output <port>`, for logs and timeout reports.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Wait for the signal.
    pub async fn wait(&mut self) -> Result<T> {
        match (&mut self.rx).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Task(format!(
                "{} establishment ended without a result",
                self.label
            ))),
        }
    }
}

impl<T> Drop for Readiness<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn the accept task of an input that is already listening.
pub fn spawn_accept(mut endpoint: InputEndpoint) -> Readiness {
    let label = format!("input {}", endpoint.local_port());
    let (tx, rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        let result = match endpoint.accept().await {
            Ok(()) => Ok(Established::Input(endpoint)),
            Err(err) => Err(AdapterError::Transport(err)),
        };
        let _ = tx.send(result);
    });
    Readiness::new(label, rx, task.abort_handle())
}

/// Spawn the dial task of an output.
pub fn spawn_dial(
    mut endpoint: OutputEndpoint,
    policy: RetryPolicy,
    dial_timeout: Duration,
) -> Readiness {
    let label = format!("output {}", endpoint.local_port());
    let (tx, rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        let result = match endpoint.connect(&policy, dial_timeout).await {
            Ok(()) => Ok(Established::Output(endpoint)),
            Err(err) => Err(err),
        };
        let _ = tx.send(result);
    });
    Readiness::new(label, rx, task.abort_handle())
}
