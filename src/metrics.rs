// Ideaflow - Run metrics.
//
// In-process counters for one workflow run: LLM request count, token usage,
// latency, and fan-out instance states.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Shared metrics collector. Cloning shares the same counters.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<RwLock<MetricsInner>>,
    start_time: Instant,
}

#[derive(Default)]
struct MetricsInner {
    llm_requests: u64,
    prompt_tokens: u64,
    completion_tokens: u64,
    llm_total_ms: u64,
    /// Structured replies that failed validation.
    invalid_outputs: u64,
    succeeded: u64,
    skipped: u64,
    failed: u64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsReport {
    pub elapsed_ms: u64,
    pub llm_requests: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub avg_llm_ms: u64,
    pub invalid_outputs: u64,
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MetricsInner::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an LLM call.
    pub async fn record_llm_call(
        &self,
        prompt_tokens: usize,
        completion_tokens: usize,
        duration: Duration,
    ) {
        let mut m = self.inner.write().await;
        m.llm_requests += 1;
        m.prompt_tokens += prompt_tokens as u64;
        m.completion_tokens += completion_tokens as u64;
        m.llm_total_ms += duration.as_millis() as u64;
    }

    pub async fn record_invalid_output(&self) {
        self.inner.write().await.invalid_outputs += 1;
    }

    /// Record the final state of one fan-out instance.
    pub async fn record_instance(&self, state: crate::workflow::TaskState) {
        use crate::workflow::TaskState;

        let mut m = self.inner.write().await;
        match state {
            TaskState::Success => m.succeeded += 1,
            TaskState::Skipped => m.skipped += 1,
            TaskState::Failed => m.failed += 1,
        }
    }

    pub async fn report(&self) -> MetricsReport {
        let m = self.inner.read().await;
        let avg_llm_ms = if m.llm_requests > 0 {
            m.llm_total_ms / m.llm_requests
        } else {
            0
        };

        MetricsReport {
            elapsed_ms: self.start_time.elapsed().as_millis() as u64,
            llm_requests: m.llm_requests,
            prompt_tokens: m.prompt_tokens,
            completion_tokens: m.completion_tokens,
            total_tokens: m.prompt_tokens + m.completion_tokens,
            avg_llm_ms,
            invalid_outputs: m.invalid_outputs,
            succeeded: m.succeeded,
            skipped: m.skipped,
            failed: m.failed,
        }
    }
}
