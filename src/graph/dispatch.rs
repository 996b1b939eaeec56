use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Runs `f` once per item on a worker pool bounded to `concurrency` concurrent
/// tasks, waiting for every dispatch to complete before returning — the
/// runtime's fan-out/fan-in contract (§4.1, §5).
///
/// A panic inside one dispatch is caught and turned into `None` at that
/// item's slot; siblings keep running (§4.1 failure policy, §7 kind 5). Once
/// `cancel` is triggered, dispatches that haven't started yet are skipped
/// (their slot is `None`) but in-flight ones are allowed to finish — callers
/// on a hard deadline should additionally race this future against a
/// `tokio::time::timeout`.
///
/// Results are returned in item order (not completion order) so call sites
/// can zip them back against their inputs; the *outer* append-reducer fields
/// these feed still concatenate in completion order once a caller flattens
/// them, matching §5's ordering guarantee.
pub async fn fan_out<T, R, F, Fut>(items: Vec<T>, concurrency: usize, cancel: CancellationToken, f: F) -> Vec<Option<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let f = Arc::new(f);
    let mut handles = Vec::with_capacity(items.len());

    for item in items {
        let semaphore = semaphore.clone();
        let cancel = cancel.clone();
        let f = f.clone();
        handles.push(tokio::spawn(async move {
            if cancel.is_cancelled() {
                return None;
            }
            let _permit = semaphore.acquire().await.ok()?;
            if cancel.is_cancelled() {
                return None;
            }
            Some(f(item).await)
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(value) => results.push(value),
            Err(join_error) => {
                warn!(error = %join_error, "worker dispatch panicked; treating as a failed finding");
                results.push(None);
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fan_out_runs_every_item_and_preserves_order() {
        let items = vec![1, 2, 3, 4, 5];
        let results = fan_out(items, 2, CancellationToken::new(), |i| async move { i * 10 }).await;
        assert_eq!(results, vec![Some(10), Some(20), Some(30), Some(40), Some(50)]);
    }

    #[tokio::test]
    async fn fan_out_isolates_a_panicking_worker() {
        let items = vec![1, 2, 3];
        let results = fan_out(items, 3, CancellationToken::new(), |i| async move {
            if i == 2 {
                panic!("boom");
            }
            i
        })
        .await;
        assert_eq!(results, vec![Some(1), None, Some(3)]);
    }

    #[tokio::test]
    async fn fan_out_skips_unstarted_work_after_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let items = vec![1, 2, 3];
        let results = fan_out(items, 3, cancel, |i| async move { i }).await;
        assert_eq!(results, vec![None, None, None]);
    }
}
