// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use thiserror::Error;

/// Semantic error kinds for upstream calls. The processor branches on these:
/// transient kinds roll into the job retry counter, `NotFound`/`Forbidden`
/// complete the affected job as a no-op, the rest bubble up to the
/// supervisor.
#[derive(Debug, Error, Clone)]
pub enum PlatformError {
    #[error("resource not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("server error: HTTP {status}")]
    Server { status: u16 },

    #[error("request failed: {0}")]
    Network(String),

    #[error("api error {code}: {message}")]
    Api { code: String, message: String },

    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl PlatformError {
    /// Errors worth retrying after a delay. `Forbidden` and `NotFound` are
    /// deliberate exclusions: retrying them repeats the same answer.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlatformError::RateLimited { .. }
                | PlatformError::Server { .. }
                | PlatformError::Network(_)
        )
    }

    /// Parse a structured rate-limit message of the upstream form
    /// ("… 9 minutes …" / "… 42 seconds …") into a retry-after duration.
    pub fn rate_limited_from_message(message: &str) -> Self {
        let mut retry_after = Duration::from_secs(60);
        let words: Vec<&str> = message.split_whitespace().collect();
        for pair in words.windows(2) {
            if let Ok(n) = pair[0].parse::<u64>() {
                if pair[1].starts_with("second") {
                    retry_after = Duration::from_secs(n);
                    break;
                }
                if pair[1].starts_with("minute") {
                    retry_after = Duration::from_secs(n * 60);
                    break;
                }
            }
        }
        PlatformError::RateLimited { retry_after }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(PlatformError::Server { status: 503 }.is_transient());
        assert!(PlatformError::Network("timeout".into()).is_transient());
        assert!(!PlatformError::NotFound.is_transient());
        assert!(!PlatformError::Forbidden.is_transient());
    }

    #[test]
    fn parses_rate_limit_seconds() {
        let err = PlatformError::rate_limited_from_message(
            "Take a break for 42 seconds before trying again.",
        );
        assert!(matches!(
            err,
            PlatformError::RateLimited { retry_after } if retry_after == Duration::from_secs(42)
        ));
    }

    #[test]
    fn parses_rate_limit_minutes() {
        let err = PlatformError::rate_limited_from_message("try again in 9 minutes");
        assert!(matches!(
            err,
            PlatformError::RateLimited { retry_after } if retry_after == Duration::from_secs(540)
        ));
    }

    #[test]
    fn unparseable_message_gets_default_wait() {
        let err = PlatformError::rate_limited_from_message("slow down");
        assert!(matches!(
            err,
            PlatformError::RateLimited { retry_after } if retry_after == Duration::from_secs(60)
        ));
    }
}
