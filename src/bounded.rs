//! Timeout-bounded calls into synchronous capabilities.
//!
//! Judges and embedders are blocking traits. Async callers run them on tokio's
//! blocking pool and race them against a deadline. A timed-out call keeps
//! running on its worker thread; its result is discarded.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Run `f` on the blocking pool, failing with [`Error::Timeout`] after `timeout`.
pub async fn call_blocking<T, F>(what: &str, timeout: Duration, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(f);
    match tokio::time::timeout(timeout, task).await {
        Err(_) => {
            tracing::warn!(call = what, ?timeout, "capability call timed out");
            Err(Error::Timeout {
                what: what.to_string(),
                after: timeout,
            })
        }
        Ok(Err(join)) => Err(Error::Backend {
            what: what.to_string(),
            message: format!("worker aborted: {join}"),
        }),
        Ok(Ok(Err(e))) => Err(Error::Backend {
            what: what.to_string(),
            message: format!("{e:#}"),
        }),
        Ok(Ok(Ok(value))) => Ok(value),
    }
}

/// Block on an async operation from inside a synchronous capability.
///
/// Capabilities are invoked from tokio's blocking pool, where entering the
/// runtime handle is allowed.
pub fn block_on_runtime<F: Future>(fut: F) -> anyhow::Result<F::Output> {
    let handle = tokio::runtime::Handle::try_current()
        .map_err(|e| anyhow::anyhow!("no tokio runtime available: {e}"))?;
    Ok(handle.block_on(fut))
}
