//! Retry policy for transient store failures.
//!
//! A policy is an ordered list of rules. The first rule whose predicate matches
//! a failure decides how long to wait; a failure no rule matches propagates
//! immediately. The policy holds no mutable state: the delay is a function of
//! the retry number and the failure alone, so one policy can serve any number
//! of concurrent callers.

use std::future::Future;
use std::time::Duration;

use common::{AppError, AppResult, ConnectionConfig};
use rand::Rng;

use crate::context::RequestContext;

/// Predicate over a failure class.
pub type FailurePredicate = fn(&AppError) -> bool;

/// How long to wait before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base * 2^retry` plus random jitter
    Exponential,
    /// The server's retry-after hint when present, exponential otherwise
    ServerHintOrExponential,
}

/// One (failure class, backoff) pair.
#[derive(Debug, Clone)]
pub struct RetryRule {
    pub name: &'static str,
    pub matches: FailurePredicate,
    pub backoff: Backoff,
}

impl RetryRule {
    pub fn new(name: &'static str, matches: FailurePredicate, backoff: Backoff) -> Self {
        Self {
            name,
            matches,
            backoff,
        }
    }
}

fn is_rate_limited(err: &AppError) -> bool {
    matches!(err, AppError::RateLimited { .. })
}

fn is_transient(err: &AppError) -> bool {
    err.is_transient()
}

// Failures the store reports before executing anything.
fn is_rejected_before_execution(err: &AppError) -> bool {
    matches!(err, AppError::ServiceUnavailable(_) | AppError::Gone(_))
}

/// Retry policy applied to every store call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    rules: Vec<RetryRule>,
    max_retries: u32,
    base_delay: Duration,
    max_jitter: Duration,
    attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Policy for point operations and queries.
    ///
    /// Retries rate limiting (honoring server hints), timeouts, gone/stale
    /// session, retry-with, service unavailable and transport failures.
    pub fn new(max_retries: u32, attempt_timeout: Duration) -> Self {
        Self {
            rules: vec![
                RetryRule::new("rate-limited", is_rate_limited, Backoff::ServerHintOrExponential),
                RetryRule::new("transient", is_transient, Backoff::Exponential),
            ],
            max_retries,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_secs(1),
            attempt_timeout,
        }
    }

    /// Policy for transactional batches.
    ///
    /// A batch that timed out may or may not have committed, so only failures
    /// that guarantee nothing ran are retried.
    pub fn for_batches(max_retries: u32, attempt_timeout: Duration) -> Self {
        Self {
            rules: vec![
                RetryRule::new("rate-limited", is_rate_limited, Backoff::ServerHintOrExponential),
                RetryRule::new("not-executed", is_rejected_before_execution, Backoff::Exponential),
            ],
            ..Self::new(max_retries, attempt_timeout)
        }
    }

    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config.retry_attempts, config.request_timeout())
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts for a failure that keeps recurring.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// First rule matching the failure, if any.
    pub fn rule_for(&self, err: &AppError) -> Option<&RetryRule> {
        self.rules.iter().find(|rule| (rule.matches)(err))
    }

    /// Exponential delay before retry number `retry` (1-based), without jitter.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(16));
        self.base_delay.saturating_mul(factor)
    }

    /// Delay before retry number `retry` for a failure matched by `rule`.
    pub fn delay_for(&self, rule: &RetryRule, retry: u32, err: &AppError) -> Duration {
        match (rule.backoff, err.retry_after()) {
            (Backoff::ServerHintOrExponential, Some(hint)) => hint,
            _ => self.backoff_delay(retry) + self.jitter(),
        }
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }

    /// Run `attempt` until it succeeds, fails permanently, exhausts the retry
    /// budget or the request is cancelled.
    ///
    /// Each attempt is bounded by the request's attempt timeout; expiry counts
    /// as a `Timeout` failure. When the budget runs out the last failure is
    /// returned as-is.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        ctx: &RequestContext,
        mut attempt: F,
    ) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let timeout = ctx.attempt_timeout(self.attempt_timeout);
        let mut retry = 0u32;

        loop {
            if ctx.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = ctx.cancellation().cancelled() => return Err(AppError::Cancelled),
                result = tokio::time::timeout(timeout, attempt()) => match result {
                    Ok(result) => result,
                    Err(_) => Err(AppError::Timeout(format!(
                        "{} did not complete within {:?}",
                        operation, timeout
                    ))),
                },
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let Some(rule) = self.rule_for(&err) else {
                return Err(err);
            };

            if retry >= self.max_retries {
                tracing::warn!(
                    operation,
                    attempts = retry + 1,
                    error = %err,
                    "Retry budget exhausted"
                );
                return Err(err);
            }

            retry += 1;
            let delay = self.delay_for(rule, retry, &err);
            tracing::warn!(
                operation,
                rule = rule.name,
                retry,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient store failure, retrying"
            );

            tokio::select! {
                biased;
                _ = ctx.cancellation().cancelled() => return Err(AppError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
