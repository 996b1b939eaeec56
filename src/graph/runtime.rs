use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::EngineError;
use crate::events::{EventSink, ScanEvent};

/// Shared context the outer Scan Graph and inner Threat Graph both run
/// under: the event sink (§4.9), the worker-pool concurrency bound (§5), and
/// a cancellation token tied to the scan-wide deadline (§5 Cancellation).
///
/// `GraphRuntime` itself does not encode the node DAG — the outer and inner
/// pipelines are each a concrete sequence of async stage functions (see
/// `crate::scan` and `crate::threat`) that call into this runtime's
/// `stage_deadline` / `emit` / dispatch helpers. That mirrors how the graph
/// is actually driven: a fixed topology with conditional branches, not an
/// open-ended interpreter.
#[derive(Clone)]
pub struct GraphRuntime {
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    concurrency: usize,
    per_stage_deadline: Duration,
}

impl GraphRuntime {
    pub fn new(sink: Arc<dyn EventSink>, concurrency: usize, per_stage_deadline: Duration) -> Self {
        Self {
            sink,
            cancel: CancellationToken::new(),
            concurrency: concurrency.max(1),
            per_stage_deadline,
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn emit(&self, event: ScanEvent) {
        self.sink.emit(event);
    }

    /// Races `fut` against both the scan-wide cancellation token and the
    /// per-stage deadline (§5 Cancellation and timeouts). On timeout, the
    /// cancel token is triggered so any in-flight dispatches started from
    /// `fut` observe it on their next check.
    pub async fn run_stage<F, T>(&self, stage: &str, fut: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled(format!("scan cancelled before stage {stage}")));
        }

        tokio::select! {
            result = fut => result,
            _ = tokio::time::sleep(self.per_stage_deadline) => {
                warn!(stage, deadline_s = self.per_stage_deadline.as_secs(), "stage deadline elapsed");
                self.cancel.cancel();
                Err(EngineError::Timeout(format!("stage '{stage}' exceeded its {}s deadline", self.per_stage_deadline.as_secs())))
            }
            _ = self.cancel.cancelled() => {
                Err(EngineError::Cancelled(format!("scan cancelled during stage {stage}")))
            }
        }
    }

    pub fn log_stage_enter(&self, scan_id: &str, node: &str) {
        info!(scan_id, node, "node entered");
    }

    pub fn log_stage_exit(&self, scan_id: &str, node: &str) {
        info!(scan_id, node, "node exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::sink::NullSink;

    #[tokio::test]
    async fn run_stage_returns_inner_result_when_fast() {
        let rt = GraphRuntime::new(Arc::new(NullSink), 4, Duration::from_secs(5));
        let result = rt.run_stage("test", async { Ok::<_, EngineError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn run_stage_times_out_and_cancels() {
        let rt = GraphRuntime::new(Arc::new(NullSink), 4, Duration::from_millis(10));
        let result = rt
            .run_stage("slow", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, EngineError>(())
            })
            .await;
        assert!(matches!(result, Err(EngineError::Timeout(_))));
        assert!(rt.cancel_token().is_cancelled());
    }

    #[tokio::test]
    async fn run_stage_short_circuits_if_already_cancelled() {
        let rt = GraphRuntime::new(Arc::new(NullSink), 4, Duration::from_secs(5));
        rt.cancel_token().cancel();
        let result = rt.run_stage("test", async { Ok::<_, EngineError>(()) }).await;
        assert!(matches!(result, Err(EngineError::Cancelled(_))));
    }
}
