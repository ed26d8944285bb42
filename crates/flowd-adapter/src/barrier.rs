use std::collections::BTreeSet;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;
use tracing::{error, info};

use crate::error::{AdapterError, Result};
use crate::establish::Readiness;

/// Wait until every endpoint signaled readiness.
///
/// Signals are consumed in arrival order. The first error aborts the wait;
/// the remaining establishment tasks are aborted with it. With a timeout,
/// the error names the endpoints still pending.
pub async fn wait_ready<T>(
    pending: Vec<Readiness<T>>,
    timeout: Option<Duration>,
) -> Result<Vec<T>> {
    let total = pending.len();
    let mut remaining: BTreeSet<String> = pending.iter().map(|r| r.label().to_string()).collect();
    let mut signals: FuturesUnordered<_> = pending
        .into_iter()
        .map(|mut ready| async move {
            let result = ready.wait().await;
            (ready.label().to_string(), result)
        })
        .collect();
    let deadline = timeout.map(|t| (t, Instant::now() + t));

    info!(endpoints = total, "waiting for endpoints to connect");
    let mut ready = Vec::with_capacity(total);
    loop {
        let next = match deadline {
            Some((timeout, at)) => match tokio::time::timeout_at(at, signals.next()).await {
                Ok(next) => next,
                Err(_) => {
                    let pending: Vec<String> = remaining.into_iter().collect();
                    error!(?pending, "endpoints not ready in time");
                    return Err(AdapterError::ReadyTimeout { timeout, pending });
                }
            },
            None => signals.next().await,
        };
        let Some((label, result)) = next else {
            break;
        };

        remaining.remove(&label);
        match result {
            Ok(endpoint) => {
                info!(endpoint = %label, remaining = remaining.len(), "endpoint ready");
                ready.push(endpoint);
            }
            Err(err) => {
                error!(endpoint = %label, error = %err, "endpoint failed to connect");
                return Err(err);
            }
        }
    }

    info!(endpoints = total, "all endpoints connected");
    Ok(ready)
}
