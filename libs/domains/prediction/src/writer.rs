//! Bounded background pool for cache repopulation

use futures::future::BoxFuture;
use observability::PredictionMetrics;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::WriterConfig;
use crate::error::CacheError;

struct Job {
    kind: &'static str,
    work: BoxFuture<'static, Result<(), CacheError>>,
}

#[derive(Default)]
struct WriterState {
    pending: AtomicUsize,
    idle: Notify,
    closed: AtomicBool,
}

impl WriterState {
    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Decrements the pending count even if a job panics
struct PendingGuard(Arc<WriterState>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.finish_one();
    }
}

/// Runs cache writes off the request path.
///
/// A bounded queue feeds a dispatcher that runs at most `workers` jobs at
/// once. Submitting never waits: when the queue is full the job is dropped
/// and counted. Each job has its own deadline, unrelated to the request that
/// produced it.
pub struct CacheWriter {
    tx: mpsc::Sender<Job>,
    state: Arc<WriterState>,
}

impl CacheWriter {
    /// Start the dispatcher on the current runtime
    pub fn spawn(config: &WriterConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let state = Arc::new(WriterState::default());
        let permits = Arc::new(Semaphore::new(config.workers.max(1)));

        tokio::spawn(dispatch(rx, permits, state.clone(), config.job_timeout));

        Self { tx, state }
    }

    /// Queue a write. Returns false when the job was dropped.
    pub fn submit<F>(&self, kind: &'static str, work: F) -> bool
    where
        F: Future<Output = Result<(), CacheError>> + Send + 'static,
    {
        if self.state.closed.load(Ordering::Acquire) {
            debug!(kind, "cache writer closed, dropping job");
            PredictionMetrics::record_cache_write_dropped(kind);
            return false;
        }

        self.state.pending.fetch_add(1, Ordering::AcqRel);
        let job = Job {
            kind,
            work: Box::pin(work),
        };

        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(e) => {
                self.state.finish_one();
                let reason = match e {
                    mpsc::error::TrySendError::Full(_) => "queue full",
                    mpsc::error::TrySendError::Closed(_) => "dispatcher stopped",
                };
                warn!(kind, reason, "dropping cache write");
                PredictionMetrics::record_cache_write_dropped(kind);
                false
            }
        }
    }

    /// Jobs queued or running
    pub fn pending(&self) -> usize {
        self.state.pending.load(Ordering::Acquire)
    }

    /// Wait until every job submitted so far has finished
    pub async fn flush(&self) {
        loop {
            let notified = self.state.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop accepting jobs and drain the rest, giving up after `grace`.
    ///
    /// Returns whether the queue drained in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.state.closed.store(true, Ordering::Release);
        let pending = self.pending();
        info!(pending, "draining cache writer");

        match tokio::time::timeout(grace, self.flush()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    pending = self.pending(),
                    "cache writer did not drain before shutdown"
                );
                false
            }
        }
    }
}

async fn dispatch(
    mut rx: mpsc::Receiver<Job>,
    permits: Arc<Semaphore>,
    state: Arc<WriterState>,
    job_timeout: Duration,
) {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            job = rx.recv() => {
                let Some(job) = job else { break };
                let guard = PendingGuard(state.clone());
                let Ok(permit) = permits.clone().acquire_owned().await else {
                    break;
                };
                tasks.spawn(async move {
                    let _permit = permit;
                    let _guard = guard;
                    run_job(job, job_timeout).await;
                });
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "cache write task panicked");
                }
            }
        }
    }

    while tasks.join_next().await.is_some() {}
    debug!("cache writer dispatcher stopped");
}

async fn run_job(job: Job, job_timeout: Duration) {
    let kind = job.kind;
    match tokio::time::timeout(job_timeout, job.work).await {
        Ok(Ok(())) => debug!(kind, "cache write done"),
        Ok(Err(e)) => {
            warn!(kind, error = %e, "cache write failed");
            PredictionMetrics::record_cache_write_failure(kind);
        }
        Err(_) => {
            warn!(kind, timeout_ms = job_timeout.as_millis() as u64, "cache write timed out");
            PredictionMetrics::record_cache_write_failure(kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn config(queue_capacity: usize, workers: usize) -> WriterConfig {
        WriterConfig {
            queue_capacity,
            workers,
            job_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_flush_waits_for_jobs() {
        let writer = CacheWriter::spawn(&config(16, 2));
        let done = Arc::new(AtomicU32::new(0));

        for _ in 0..5 {
            let done = done.clone();
            assert!(writer.submit("entity", async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));
        }

        writer.flush().await;
        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert_eq!(writer.pending(), 0);
    }

    #[tokio::test]
    async fn test_flush_on_idle_writer_returns() {
        let writer = CacheWriter::spawn(&config(4, 1));
        writer.flush().await;
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let writer = CacheWriter::spawn(&config(1, 1));
        let gate = Arc::new(Notify::new());

        // Occupies the only worker
        let g = gate.clone();
        writer.submit("response", async move {
            g.notified().await;
            Ok(())
        });
        tokio::task::yield_now().await;

        let mut accepted = 0;
        for _ in 0..10 {
            if writer.submit("entity", async { Ok(()) }) {
                accepted += 1;
            }
        }
        assert!(accepted < 10);

        gate.notify_one();
        writer.flush().await;
        assert_eq!(writer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_and_slow_jobs_do_not_wedge_pool() {
        let writer = CacheWriter::spawn(&config(8, 1));
        let done = Arc::new(AtomicU32::new(0));

        writer.submit("entity", async { Err(CacheError::Backend("down".into())) });
        writer.submit("entity", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        let d = done.clone();
        writer.submit("response", async move {
            d.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        writer.flush().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_workers_cap_concurrency() {
        let writer = CacheWriter::spawn(&config(32, 2));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let running = running.clone();
            let peak = peak.clone();
            writer.submit("entity", async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
        }

        writer.flush().await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_shutdown_drains_then_rejects() {
        let writer = CacheWriter::spawn(&config(8, 2));
        let done = Arc::new(AtomicU32::new(0));

        let d = done.clone();
        writer.submit("response", async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            d.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(writer.shutdown(Duration::from_secs(5)).await);
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(!writer.submit("response", async { Ok(()) }));
    }
}
