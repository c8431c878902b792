// SPDX-License-Identifier: MIT
//! Synthetic work used to produce slow and CPU-bound telemetry signatures.
use std::thread;
use std::time::{Duration, Instant};

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    #[error("operation was cancelled")]
    Cancelled,
    #[error("worker failed: {0}")]
    Worker(#[from] JoinError),
}

/// Suspend for `duration`, returning early with [`WorkloadError::Cancelled`].
pub async fn delay(duration: Duration, token: &CancellationToken) -> Result<(), WorkloadError> {
    tokio::select! {
        _ = token.cancelled() => Err(WorkloadError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Busy-spin every available core for `duration`.
///
/// Spinners run on the blocking pool and poll `token` on every iteration; the first
/// failure is returned once all of them have stopped.
pub async fn burn_cpu(duration: Duration, token: &CancellationToken) -> Result<(), WorkloadError> {
    let workers = thread::available_parallelism().map_or(1, |n| n.get());
    tracing::debug!(workers, millis = duration.as_millis() as u64, "burning cpu");

    let mut set = JoinSet::new();
    for _ in 0..workers {
        let token = token.clone();
        set.spawn_blocking(move || spin(duration, &token));
    }

    let mut outcome = Ok(());
    while let Some(joined) = set.join_next().await {
        if let Err(e) = joined.map_err(WorkloadError::from).and_then(|spun| spun) {
            outcome = outcome.and(Err(e));
        }
    }
    outcome
}

fn spin(duration: Duration, token: &CancellationToken) -> Result<(), WorkloadError> {
    let started = Instant::now();
    loop {
        if token.is_cancelled() {
            return Err(WorkloadError::Cancelled);
        }
        if started.elapsed() >= duration {
            return Ok(());
        }
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::assert_ok;

    use super::*;

    #[tokio::test]
    async fn delay_waits_for_the_full_duration() {
        let token = CancellationToken::new();
        let started = Instant::now();
        assert_ok!(delay(Duration::from_millis(10), &token).await);
        assert!(started.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn delay_aborts_on_cancellation() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let result = delay(Duration::from_secs(30), &token).await;
        assert!(matches!(result, Err(WorkloadError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn burn_cpu_runs_for_the_requested_time() {
        let token = CancellationToken::new();
        let started = Instant::now();
        assert_ok!(burn_cpu(Duration::from_millis(20), &token).await);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn burn_cpu_stops_when_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let result = burn_cpu(Duration::from_secs(30), &token).await;
        assert!(matches!(result, Err(WorkloadError::Cancelled)));
    }
}
