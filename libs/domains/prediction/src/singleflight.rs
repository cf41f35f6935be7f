//! Collapse concurrent identical work into one execution

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// The shared computation ended without producing a value
#[derive(Debug, Clone, Error)]
#[error("in-flight computation was cancelled")]
pub struct FlightCancelled;

type Flight<V> = Shared<BoxFuture<'static, Result<V, FlightCancelled>>>;

/// One in-flight computation per key.
///
/// The first caller for a key runs the work; callers that arrive while it is
/// running await the same result. The entry is dropped once it finishes, so
/// the next call after completion starts fresh.
pub struct SingleFlight<K, V> {
    inflight: Mutex<HashMap<K, (u64, Flight<V>)>>,
    generation: AtomicU64,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `make()` unless an execution for `key` is already in flight.
    ///
    /// The work is spawned so a caller that gives up does not cancel it for
    /// the others. Fails only when that task is cancelled, which happens
    /// while the runtime shuts down.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> Result<V, FlightCancelled>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let (generation, shared, leader) = {
            let mut inflight = self.lock();
            match inflight.get(&key) {
                Some((generation, shared)) => (*generation, shared.clone(), false),
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                    let handle = tokio::spawn(make());
                    let shared = async move {
                        match handle.await {
                            Ok(value) => Ok(value),
                            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                            Err(_) => Err(FlightCancelled),
                        }
                    }
                    .boxed()
                    .shared();
                    inflight.insert(key.clone(), (generation, shared.clone()));
                    (generation, shared, true)
                }
            }
        };

        let _guard = leader.then(|| Cleanup {
            flight: self,
            key: key.clone(),
            generation,
        });

        let value = shared.await;
        self.forget(&key, generation);
        value
    }

    /// Keys with work in flight
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn forget(&self, key: &K, generation: u64) {
        let mut inflight = self.lock();
        if inflight.get(key).is_some_and(|(g, _)| *g == generation) {
            inflight.remove(key);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, (u64, Flight<V>)>> {
        self.inflight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Removes the leader's entry even when the leader is dropped mid-await
struct Cleanup<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    flight: &'a SingleFlight<K, V>,
    key: K,
    generation: u64,
}

impl<K, V> Drop for Cleanup<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.flight.forget(&self.key, self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_execution() {
        let flight = Arc::new(SingleFlight::<String, u32>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let calls = (0..8).map(|_| {
            let flight = flight.clone();
            let runs = runs.clone();
            async move {
                flight
                    .run("f2".to_string(), move || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        7
                    })
                    .await
            }
        });

        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(|v| matches!(v, Ok(7))));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_sequential_calls_run_again() {
        let flight = SingleFlight::<&'static str, usize>::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let runs = runs.clone();
            flight
                .run("k", move || async move { runs.fetch_add(1, Ordering::SeqCst) })
                .await
                .unwrap();
        }

        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_collapse() {
        let flight = SingleFlight::<u8, u8>::new();

        let (a, b) = tokio::join!(
            flight.run(1, || async { 10 }),
            flight.run(2, || async { 20 })
        );

        assert_eq!((a.unwrap(), b.unwrap()), (10, 20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_leader_does_not_cancel_followers() {
        let flight = Arc::new(SingleFlight::<u8, &'static str>::new());

        let leader = {
            let flight = flight.clone();
            tokio::spawn(async move {
                flight
                    .run(1, || async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        "done"
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let follower = {
            let flight = flight.clone();
            tokio::spawn(async move { flight.run(1, || async { "second" }).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        leader.abort();

        assert_eq!(follower.await.unwrap().unwrap(), "done");
    }

    #[test]
    fn test_runtime_shutdown_cancels_waiters_without_panicking() {
        let flight = Arc::new(SingleFlight::<u8, u8>::new());
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        let waiter = {
            let flight = flight.clone();
            async move {
                flight
                    .run(1, || async {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        1
                    })
                    .await
            }
        };

        // Start the flight, then tear the runtime down under it
        let pending = runtime.block_on(async {
            let mut waiter = Box::pin(waiter);
            let first = futures::poll!(waiter.as_mut());
            assert!(first.is_pending());
            waiter
        });
        drop(runtime);

        let outcome = futures::executor::block_on(pending);
        assert!(matches!(outcome, Err(FlightCancelled)));
    }
}
