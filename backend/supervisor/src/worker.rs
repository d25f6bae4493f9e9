use anyhow::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;

/// Consecutive-failure count per worker name, shared with the health monitor.
pub type ErrorCounters = Arc<RwLock<HashMap<String, u32>>>;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { timeout_secs: 3_600, max_retries: 3, backoff_secs: 300 }
    }
}

/// Runs `step` on a fixed period until `is_running` clears. Each tick is
/// wrapped in a timeout and retried per `policy` before the iteration is
/// abandoned; the worker's error counter is zeroed on success and
/// incremented once per exhausted iteration, never per retry attempt.
pub async fn run_periodic_worker<F, Fut>(
    name: &str,
    period_secs: u64,
    policy: RetryPolicy,
    is_running: Arc<AtomicBool>,
    counters: ErrorCounters,
    mut step: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut interval = tokio::time::interval(Duration::from_secs(period_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    while is_running.load(Ordering::SeqCst) {
        tokio::select! {
            _ = interval.tick() => {},
            _ = poll_until_stopped(&is_running) => break,
        }
        if !is_running.load(Ordering::SeqCst) {
            break;
        }
        match run_with_retry(name, &policy, &mut step).await {
            Ok(()) => {
                counters.write().await.insert(name.to_string(), 0);
            }
            Err(err) => {
                warn!(worker = name, error = %err, "worker iteration failed after retries, will run again next period");
                *counters.write().await.entry(name.to_string()).or_insert(0) += 1;
            }
        }
    }
}

/// Bounds how long a worker can sit inside a long period's `interval.tick()`
/// after shutdown is requested; polling beats adding a broadcast channel
/// just to wake one `select!` arm.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

async fn poll_until_stopped(is_running: &AtomicBool) {
    while is_running.load(Ordering::SeqCst) {
        tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
    }
}

async fn run_with_retry<F, Fut>(name: &str, policy: &RetryPolicy, step: &mut F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut attempt = 0;
    loop {
        let outcome = tokio::time::timeout(Duration::from_secs(policy.timeout_secs), step()).await;
        let failure = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => err,
            Err(_) => anyhow::anyhow!("worker step timed out after {}s", policy.timeout_secs),
        };
        if attempt >= policy.max_retries {
            return Err(failure);
        }
        attempt += 1;
        warn!(worker = name, attempt, error = %failure, "worker step failed, retrying");
        tokio::time::sleep(Duration::from_secs(policy.backoff_secs)).await;
    }
}
