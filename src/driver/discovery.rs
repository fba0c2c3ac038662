//! Parallel probing of independent endpoints. Each candidate runs in its own
//! task with its own deadline; a dead or stalled endpoint only costs its own
//! slot and never delays or fails the others.
use std::{
    fmt,
    future::Future,
    mem,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tracing::debug;

use crate::device::{AccessContext, DeviceResult};

/// Slack on top of the probe deadline before a task is abandoned outright.
/// Covers probes that ignore their context.
pub const PROBE_GRACE: Duration = Duration::from_millis(50);

/// Probes every candidate concurrently and returns the successes tagged with
/// the candidate's index, in index order. Failures are logged and dropped.
pub async fn probe_all<C, T, F, Fut>(
    candidates: Vec<C>,
    timeout: Duration,
    probe: F,
) -> Vec<(usize, T)>
where
    C: fmt::Display + Send + 'static,
    T: Send + 'static,
    F: Fn(C, AccessContext) -> Fut,
    Fut: Future<Output = DeviceResult<T>> + Send + 'static,
{
    let found: Arc<Mutex<Vec<(usize, T)>>> =
        Arc::new(Mutex::new(Vec::with_capacity(candidates.len())));
    let mut tasks = Vec::with_capacity(candidates.len());
    for (index, candidate) in candidates.into_iter().enumerate() {
        let label = candidate.to_string();
        let attempt = probe(candidate, AccessContext::with_timeout(timeout));
        let found = Arc::clone(&found);
        tasks.push(tokio::spawn(async move {
            match tokio::time::timeout(timeout + PROBE_GRACE, attempt).await {
                Ok(Ok(result)) => found
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push((index, result)),
                Ok(Err(err)) => debug!(candidate = %label, error = %err, "probe failed"),
                Err(_) => debug!(candidate = %label, "probe abandoned after deadline"),
            }
        }));
    }
    for task in tasks {
        if let Err(err) = task.await {
            debug!(error = %err, "probe task did not complete");
        }
    }
    let mut found = mem::take(&mut *found.lock().unwrap_or_else(PoisonError::into_inner));
    found.sort_by_key(|(index, _)| *index);
    found
}
