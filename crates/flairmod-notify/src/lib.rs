// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Outbound operator notifications.
//!
//! The engine reports through the [`Notifier`] trait: plaintext status lines
//! for lifecycle events and typed [`FailureEvent`]s when a job exhausts its
//! retries. Delivery is fire-and-forget — a notification must never take a
//! pipeline down, so failures are logged and swallowed here.
mod embed;
mod webhook;

pub use embed::{build_post_embed, post_flair_webhook};
pub use webhook::WebhookNotifier;

use async_trait::async_trait;

/// A job that gave up: sent to the operator channel, then force-completed.
#[derive(Debug, Clone)]
pub struct FailureEvent {
    pub submission_id: String,
    pub subreddit: String,
    pub error: String,
    /// Action kinds that were still pending at giveup time.
    pub pending: Vec<String>,
}

impl FailureEvent {
    /// Human-readable form used by the webhook sink.
    pub fn render(&self) -> String {
        format!(
            "Giving up on [submission {id}](https://redd.it/{id}) in /r/{sub} after repeated failures.\n\n\
             Last error: {err}\n\nStill pending: {pending}",
            id = self.submission_id,
            sub = self.subreddit,
            err = self.error,
            pending = if self.pending.is_empty() {
                "none".to_string()
            } else {
                self.pending.join(", ")
            },
        )
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// One plaintext status line (startup, task restarts, config reloads).
    async fn status(&self, message: &str);

    /// A job-level giveup.
    async fn failure(&self, event: &FailureEvent);
}

/// Sink for deployments without a configured operator channel.
#[derive(Debug, Default, Clone)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn status(&self, _message: &str) {}
    async fn failure(&self, _event: &FailureEvent) {}
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_render_names_submission_and_pending() {
        let event = FailureEvent {
            submission_id: "p1".into(),
            subreddit: "pics".into(),
            error: "server error: HTTP 503".into(),
            pending: vec!["comment".into(), "ban".into()],
        };
        let text = event.render();
        assert!(text.contains("https://redd.it/p1"));
        assert!(text.contains("/r/pics"));
        assert!(text.contains("comment, ban"));
    }

    #[test]
    fn failure_render_with_no_pending() {
        let event = FailureEvent {
            submission_id: "p1".into(),
            subreddit: "pics".into(),
            error: "x".into(),
            pending: vec![],
        };
        assert!(event.render().contains("Still pending: none"));
    }
}
