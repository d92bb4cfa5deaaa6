// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::PlatformError;

/// Explicit retry policy for upstream calls, applied at the call site so the
/// control flow stays visible in tests.
///
/// - `RateLimited` sleeps for the parsed retry-after plus a small constant.
/// - Repeated 5xx responses take the longer fixed `server_error_cooldown`.
/// - Other transient errors back off exponentially from `base_delay`, capped
///   at `max_delay`.
/// - `NotFound` / `Forbidden` abort immediately; retrying cannot change the
///   answer.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub server_error_cooldown: Duration,
    /// Padding added on top of a parsed retry-after.
    pub rate_limit_padding: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(120),
            server_error_cooldown: Duration::from_secs(240),
            rate_limit_padding: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            server_error_cooldown: Duration::ZERO,
            rate_limit_padding: Duration::ZERO,
        }
    }

    /// Run `op` under this policy. The final error is returned once the
    /// attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, PlatformError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PlatformError>>,
    {
        let mut delay = self.base_delay;
        let mut last_err = None;

        for attempt in 1..=self.max_attempts.max(1) {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => {
                    let sleep_for = match &err {
                        PlatformError::RateLimited { retry_after } => {
                            *retry_after + self.rate_limit_padding
                        }
                        PlatformError::Server { .. } => self.server_error_cooldown,
                        _ => delay,
                    };
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        %err,
                        ?sleep_for,
                        "transient platform error, backing off"
                    );
                    last_err = Some(err);
                    if attempt < self.max_attempts {
                        tokio::time::sleep(sleep_for).await;
                        delay = (delay * 2).min(self.max_delay);
                    }
                }
            }
        }
        Err(last_err.unwrap_or(PlatformError::Network("retry budget spent".into())))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);
        let out = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, PlatformError>(7) }
            })
            .await
            .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);
        let out = policy
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(PlatformError::Network("flaky".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(out, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn aborts_on_not_found_without_retry() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(5);
        let err = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(PlatformError::NotFound) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::NotFound));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_attempts_returns_last_error() {
        let policy = RetryPolicy::immediate(2);
        let err = policy
            .run(|| async { Err::<(), _>(PlatformError::Server { status: 502 }) })
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Server { status: 502 }));
    }
}
