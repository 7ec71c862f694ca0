//! Bounded fan-out of independent work units onto the tokio runtime.
//!
//! Every unit is spawned as its own task so units run in parallel on the
//! runtime's worker threads, while `buffer_unordered` caps how many are
//! in flight. Tasks not yet spawned when the caller stops polling are
//! never started; tasks already running are aborted when their handle
//! is dropped.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::{JoinError, JoinHandle};
use tracing::{Instrument, Span};

use wx_common::{StoreError, StoreResult};

/// Handle to a spawned worker that aborts the task when dropped.
pub struct WorkerHandle<T> {
    inner: JoinHandle<StoreResult<T>>,
}

impl<T> Drop for WorkerHandle<T> {
    fn drop(&mut self) {
        self.inner.abort();
    }
}

impl<T> Future for WorkerHandle<T> {
    type Output = StoreResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(e) => Err(join_error(e)),
        })
    }
}

fn join_error(e: JoinError) -> StoreError {
    if e.is_panic() {
        StoreError::Internal(format!("worker panicked: {}", e))
    } else {
        StoreError::Internal(format!("worker cancelled: {}", e))
    }
}

/// Spawn one unit of work inside `span`.
pub fn spawn_worker<F, T>(span: Span, work: F) -> WorkerHandle<T>
where
    F: Future<Output = StoreResult<T>> + Send + 'static,
    T: Send + 'static,
{
    WorkerHandle {
        inner: tokio::spawn(work.instrument(span)),
    }
}

/// Run every unit with at most `limit` in flight, stopping at the first
/// failure. Remaining units are cancelled.
///
/// Results come back in completion order.
pub async fn try_fan_out<I, F, T>(work: I, limit: usize) -> StoreResult<Vec<T>>
where
    I: IntoIterator<Item = (Span, F)>,
    I::IntoIter: Send,
    F: Future<Output = StoreResult<T>> + Send + 'static,
    T: Send + 'static,
{
    stream::iter(work)
        .map(|(span, unit)| spawn_worker(span, unit))
        .buffer_unordered(limit.max(1))
        .try_collect()
        .await
}

/// Run every unit to completion with at most `limit` in flight and
/// return each outcome next to the key it was submitted with, in
/// completion order.
pub async fn fan_out_all<I, K, F, T>(work: I, limit: usize) -> Vec<(K, StoreResult<T>)>
where
    I: IntoIterator<Item = (K, Span, F)>,
    I::IntoIter: Send,
    K: Send + 'static,
    F: Future<Output = StoreResult<T>> + Send + 'static,
    T: Send + 'static,
{
    stream::iter(work)
        .map(|(key, span, unit)| {
            let handle = spawn_worker(span, unit);
            async move { (key, handle.await) }
        })
        .buffer_unordered(limit.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_limit_caps_in_flight_workers() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let work: Vec<_> = (0..20)
            .map(|i| {
                let running = running.clone();
                let peak = peak.clone();
                let unit = async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(i)
                };
                (Span::none(), unit)
            })
            .collect();

        let mut results = try_fan_out(work, 3).await.unwrap();
        results.sort();
        assert_eq!(results, (0..20).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_first_error_stops_fan_out() {
        let started = Arc::new(AtomicUsize::new(0));

        let work: Vec<_> = (0..50)
            .map(|i| {
                let started = started.clone();
                let unit = async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    if i == 0 {
                        Err(StoreError::Transient("boom".into()))
                    } else {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(i)
                    }
                };
                (Span::none(), unit)
            })
            .collect();

        let err = try_fan_out(work, 2).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(started.load(Ordering::SeqCst) < 50);
    }

    #[tokio::test]
    async fn test_fan_out_all_collects_every_outcome() {
        let work: Vec<_> = (0..6)
            .map(|i| {
                let unit = async move {
                    if i % 2 == 0 {
                        Ok(i)
                    } else {
                        Err(StoreError::NotFound(i.to_string()))
                    }
                };
                (i, Span::none(), unit)
            })
            .collect();

        let outcomes = fan_out_all(work, 4).await;
        assert_eq!(outcomes.len(), 6);
        for (key, outcome) in outcomes {
            assert_eq!(outcome.is_ok(), key % 2 == 0);
        }
    }

    #[tokio::test]
    async fn test_panicking_worker_is_internal_error() {
        let work = vec![("only", Span::none(), async {
            if true {
                panic!("worker blew up");
            }
            Ok(())
        })];

        let outcomes = fan_out_all(work, 1).await;
        assert_eq!(outcomes[0].0, "only");
        assert!(matches!(outcomes[0].1, Err(StoreError::Internal(_))));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let work: Vec<(Span, std::future::Ready<StoreResult<u8>>)> = Vec::new();
        assert!(try_fan_out(work, 0).await.unwrap().is_empty());
    }
}
