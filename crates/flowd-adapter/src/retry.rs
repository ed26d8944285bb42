use std::future::Future;

use flowd_transport::TransportError;
use tracing::{debug, error, warn};

use crate::config::RetryPolicy;
use crate::error::{AdapterError, Result};

/// Run `attempt` until it succeeds, fails permanently, or the policy runs out.
///
/// `attempt` receives the 1-based attempt number. Transient failures are
/// retried after `policy.delay`; anything else is returned immediately as
/// [`AdapterError::Transport`].
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    port: &str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, TransportError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut n = 1;
    loop {
        let err = match attempt(n).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let transient = err.is_transient();
        if !transient {
            error!(port, attempt = n, transient, error = %err, "dial failed permanently");
            return Err(AdapterError::Transport(err));
        }
        if n >= max_attempts {
            error!(port, attempt = n, transient, error = %err, "dial attempts exhausted");
            return Err(AdapterError::DialExhausted {
                port: port.to_string(),
                attempts: n,
                source: err,
            });
        }

        if n > policy.warn_after {
            warn!(port, attempt = n, transient, error = %err, "dial failed, retrying");
        } else {
            debug!(port, attempt = n, transient, error = %err, "dial failed, retrying");
        }
        tokio::time::sleep(policy.delay).await;
        n += 1;
    }
}
