use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::traits::invoker::{CommandSpec, InvokeError, ProcessInvoker, ProcessOutput};

/// Answers every command with the same result after a fixed delay,
/// recording how many calls overlapped.
#[derive(Debug, Clone)]
pub struct InvokerStub {
    result: Result<ProcessOutput, InvokeError>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl InvokerStub {
    pub fn new(result: Result<ProcessOutput, InvokeError>, delay: Duration) -> Self {
        Self {
            result,
            delay,
            calls: Arc::default(),
            in_flight: Arc::default(),
            peak_in_flight: Arc::default(),
        }
    }

    pub fn succeeding(delay: Duration) -> Self {
        Self::new(
            Ok(ProcessOutput {
                exit_code: Some(0),
                duration: delay,
                ..Default::default()
            }),
            delay,
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ProcessInvoker for InvokerStub {
    #[tracing::instrument(skip(self, _stdin))]
    async fn run(
        &self,
        command: &CommandSpec,
        working_dir: &Path,
        _stdin: &[u8],
        _timeout: Duration,
    ) -> Result<ProcessOutput, InvokeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        tracing::debug!("Stub result: {:?}", self.result);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.result.clone()
    }
}
