//! Per-request cancellation and timeout.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Cancellation signal and optional timeout override for one public call.
///
/// The timeout applies to each attempt and never exceeds the configured
/// request timeout.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancellation: CancellationToken,
    timeout: Option<Duration>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tie the request to an existing cancellation token.
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            timeout: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Timeout for one attempt, bounded by `ceiling`.
    pub fn attempt_timeout(&self, ceiling: Duration) -> Duration {
        match self.timeout {
            Some(timeout) => timeout.min(ceiling),
            None => ceiling,
        }
    }
}
