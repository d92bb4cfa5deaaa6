// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Inbox handler: operator-facing convenience commands and mod invitations.
//!
//! Recognized subjects are `list` (moderator-only flair templates of a
//! community) and `auto` (a starter configuration). Invitation messages are
//! accepted when the operator enabled auto-accept, otherwise surfaced on the
//! status channel. Every message is marked read whether or not a reply goes
//! out, and replies to blocked or vanished senders fail silently.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use regex::Regex;
use tracing::{debug, info, warn};

use flairmod_config::Config;
use flairmod_notify::Notifier;
use flairmod_platform::{InboxMessage, Platform, PlatformError};

use crate::starter::{render_starter_pm, starter_config};

/// The platform's system account; its mail is informational only.
const SYSTEM_ACCOUNT: &str = "reddit";

pub struct MessageHandler {
    platform: Arc<dyn Platform>,
    notifier: Arc<dyn Notifier>,
    config: Arc<Config>,
    subreddit_name: Regex,
}

impl MessageHandler {
    pub fn new(
        platform: Arc<dyn Platform>,
        notifier: Arc<dyn Notifier>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            platform,
            notifier,
            config,
            subreddit_name: Regex::new(r"^[A-Za-z0-9_]{3,21}$").expect("static regex"),
        }
    }

    /// Sweep the inbox forever.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("inbox handler starting");
        loop {
            self.poll_inbox().await?;
            tokio::time::sleep(Duration::from_secs(self.config.processor.inbox_interval_secs))
                .await;
        }
    }

    /// One pass over the unread inbox. Public so tests can drive it.
    pub async fn poll_inbox(&self) -> anyhow::Result<()> {
        let messages = self
            .platform
            .unread_messages()
            .await
            .context("reading inbox")?;
        for message in messages {
            self.handle_message(&message).await;
        }
        Ok(())
    }

    async fn handle_message(&self, message: &InboxMessage) {
        // Comment replies share the inbox; they are not commands.
        if message.was_comment {
            self.mark_read_quietly(message).await;
            return;
        }
        if message.author.as_deref() == Some(SYSTEM_ACCOUNT) {
            debug!("skipping system mail");
            self.mark_read_quietly(message).await;
            return;
        }
        if self.is_mod_invite(message) {
            self.handle_mod_invite(message).await;
            return;
        }

        let response = self.command_response(message).await;
        self.mark_read_quietly(message).await;
        if let Err(err) = self.platform.reply_message(&message.id, &response).await {
            match err {
                // Blocked senders and vanished messages are not our problem.
                PlatformError::Forbidden | PlatformError::NotFound => {
                    debug!(message_id = message.id, "reply suppressed")
                }
                err => warn!(message_id = message.id, %err, "inbox reply failed"),
            }
        }
    }

    fn is_mod_invite(&self, message: &InboxMessage) -> bool {
        message.subject.to_lowercase().contains("invitation to moderate")
            || message.body.starts_with("gadzooks!")
    }

    async fn handle_mod_invite(&self, message: &InboxMessage) {
        let Some(subreddit) = message.subreddit.clone() else {
            self.mark_read_quietly(message).await;
            return;
        };
        if self.config.auto_accept_mod_invites {
            match self.platform.accept_mod_invite(&subreddit).await {
                Ok(()) => {
                    info!(subreddit, "accepted moderator invitation");
                    self.notifier
                        .status(&format!("Accepted moderator invitation for /r/{subreddit}"))
                        .await;
                }
                Err(PlatformError::NotFound) => {
                    debug!(subreddit, "stale moderator invitation");
                }
                Err(err) => {
                    warn!(subreddit, %err, "accepting moderator invitation failed");
                }
            }
        } else {
            info!(subreddit, "moderator invitation received, auto-accept disabled");
            self.notifier
                .status(&format!(
                    "Received moderator invitation for /r/{subreddit} but auto-accept is disabled"
                ))
                .await;
        }
        self.mark_read_quietly(message).await;
    }

    /// Resolve a command message into the reply text.
    async fn command_response(&self, message: &InboxMessage) -> String {
        let Some(subreddit) = message.body.split_whitespace().next() else {
            return usage();
        };
        if !self.subreddit_name.is_match(subreddit) {
            return "Invalid subreddit name. Names are 3-21 characters: letters, numbers \
                    and underscores."
                .to_string();
        }

        match message.subject.to_lowercase().as_str() {
            "list" => self.list_response(subreddit).await,
            "auto" => self.auto_response(subreddit).await,
            _ => usage(),
        }
    }

    async fn list_response(&self, subreddit: &str) -> String {
        match self.platform.am_moderator(subreddit).await {
            Ok(false) => format!("You are not a moderator of /r/{subreddit}."),
            Err(PlatformError::NotFound) => format!("Subreddit /r/{subreddit} not found."),
            Err(err) => {
                warn!(subreddit, %err, "flair template listing failed");
                format!("Could not read flair templates for /r/{subreddit}, try again later.")
            }
            Ok(true) => match self.platform.link_flair_templates(subreddit).await {
                Ok(templates) => {
                    let lines: Vec<String> = templates
                        .iter()
                        .filter(|t| t.mod_only)
                        .map(|t| format!("{}: {}", t.text, t.id))
                        .collect();
                    if lines.is_empty() {
                        format!("No mod-only flair templates found for /r/{subreddit}.")
                    } else {
                        format!(
                            "Mod-only flair templates for /r/{subreddit}:\n\n{}",
                            lines.join("\n\n")
                        )
                    }
                }
                Err(err) => {
                    warn!(subreddit, %err, "flair template listing failed");
                    format!("Could not read flair templates for /r/{subreddit}, try again later.")
                }
            },
        }
    }

    async fn auto_response(&self, subreddit: &str) -> String {
        match self.platform.am_moderator(subreddit).await {
            Ok(false) => format!("You are not a moderator of /r/{subreddit}."),
            Err(PlatformError::NotFound) => format!("Subreddit /r/{subreddit} not found."),
            Err(err) => {
                warn!(subreddit, %err, "starter config failed");
                format!("Could not generate a configuration for /r/{subreddit}, try again later.")
            }
            Ok(true) => match starter_config(&self.platform, subreddit).await {
                Ok(config) => render_starter_pm(subreddit, &config),
                Err(PlatformError::NotFound) => format!("Subreddit /r/{subreddit} not found."),
                Err(err) => {
                    warn!(subreddit, %err, "starter config failed");
                    format!(
                        "Could not generate a configuration for /r/{subreddit}, try again later."
                    )
                }
            },
        }
    }

    async fn mark_read_quietly(&self, message: &InboxMessage) {
        if let Err(err) = self.platform.mark_read(&message.id).await {
            warn!(message_id = message.id, %err, "mark-read failed");
        }
    }
}

fn usage() -> String {
    "Unknown command. Available commands: 'list <community>', 'auto <community>'.".to_string()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use flairmod_notify::NullNotifier;
    use flairmod_platform::{FlairTemplate, MockPlatform};

    fn handler(mock: &MockPlatform, auto_accept: bool) -> MessageHandler {
        MessageHandler::new(
            Arc::new(mock.clone()),
            Arc::new(NullNotifier),
            Arc::new(Config {
                auto_accept_mod_invites: auto_accept,
                ..Default::default()
            }),
        )
    }

    fn message(subject: &str, body: &str) -> InboxMessage {
        InboxMessage {
            id: "msg1".into(),
            author: Some("mod_person".into()),
            subject: subject.into(),
            body: body.into(),
            subreddit: None,
            was_comment: false,
        }
    }

    #[tokio::test]
    async fn list_replies_with_mod_only_templates() {
        let mock = MockPlatform::new("fh-bot");
        mock.moderate("pics");
        mock.add_flair_template(
            "pics",
            FlairTemplate {
                id: "g1".into(),
                text: "Rule 1".into(),
                mod_only: true,
            },
        );
        mock.add_flair_template(
            "pics",
            FlairTemplate {
                id: "g2".into(),
                text: "User".into(),
                mod_only: false,
            },
        );
        mock.add_inbox_message(message("list", "pics"));

        handler(&mock, false).poll_inbox().await.unwrap();

        let replies = mock.calls_matching("reply_message msg1");
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("Rule 1: g1"));
        assert!(!replies[0].contains("g2"));
        assert_eq!(mock.calls_matching("mark_read msg1").len(), 1);
    }

    #[tokio::test]
    async fn list_for_unmoderated_community_declines() {
        let mock = MockPlatform::new("fh-bot");
        mock.add_inbox_message(message("list", "otherplace"));
        handler(&mock, false).poll_inbox().await.unwrap();
        let replies = mock.calls_matching("reply_message msg1");
        assert!(replies[0].contains("not a moderator"));
    }

    #[tokio::test]
    async fn auto_replies_with_starter_configuration() {
        let mock = MockPlatform::new("fh-bot");
        mock.moderate("pics");
        mock.add_flair_template(
            "pics",
            FlairTemplate {
                id: "g1".into(),
                text: "Rule 1".into(),
                mod_only: true,
            },
        );
        mock.add_inbox_message(message("auto", "pics"));
        handler(&mock, false).poll_inbox().await.unwrap();
        let replies = mock.calls_matching("reply_message msg1");
        assert!(replies[0].contains("GeneralConfiguration"));
        assert!(replies[0].contains("g1"));
    }

    #[tokio::test]
    async fn invalid_subreddit_name_is_rejected() {
        let mock = MockPlatform::new("fh-bot");
        mock.add_inbox_message(message("list", "no/pe"));
        handler(&mock, false).poll_inbox().await.unwrap();
        let replies = mock.calls_matching("reply_message msg1");
        assert!(replies[0].contains("Invalid subreddit name"));
    }

    #[tokio::test]
    async fn unknown_subject_gets_usage_line() {
        let mock = MockPlatform::new("fh-bot");
        mock.add_inbox_message(message("halp", "pics"));
        handler(&mock, false).poll_inbox().await.unwrap();
        let replies = mock.calls_matching("reply_message msg1");
        assert!(replies[0].contains("Available commands"));
    }

    #[tokio::test]
    async fn invite_accepted_when_enabled() {
        let mock = MockPlatform::new("fh-bot");
        let mut invite = message("invitation to moderate /r/newplace", "please join");
        invite.subreddit = Some("newplace".into());
        mock.add_inbox_message(invite);

        handler(&mock, true).poll_inbox().await.unwrap();
        assert_eq!(mock.calls_matching("accept_mod_invite newplace").len(), 1);
        assert_eq!(mock.calls_matching("mark_read msg1").len(), 1);
        // No command reply for invitations.
        assert!(mock.calls_matching("reply_message").is_empty());
    }

    #[tokio::test]
    async fn invite_left_alone_when_disabled() {
        let mock = MockPlatform::new("fh-bot");
        let mut invite = message("Invitation to moderate /r/newplace", "please join");
        invite.subreddit = Some("newplace".into());
        mock.add_inbox_message(invite);

        handler(&mock, false).poll_inbox().await.unwrap();
        assert!(mock.calls_matching("accept_mod_invite").is_empty());
        assert_eq!(mock.calls_matching("mark_read msg1").len(), 1);
    }

    #[tokio::test]
    async fn system_mail_is_marked_read_and_skipped() {
        let mock = MockPlatform::new("fh-bot");
        let mut m = message("anything", "whatever");
        m.author = Some(SYSTEM_ACCOUNT.into());
        mock.add_inbox_message(m);
        handler(&mock, false).poll_inbox().await.unwrap();
        assert_eq!(mock.calls_matching("mark_read msg1").len(), 1);
        assert!(mock.calls_matching("reply_message").is_empty());
    }

    #[tokio::test]
    async fn blocked_sender_reply_fails_silently() {
        let mock = MockPlatform::new("fh-bot");
        mock.add_inbox_message(message("list", "pics"));
        mock.fail_next("reply_message", PlatformError::Forbidden);
        handler(&mock, false).poll_inbox().await.unwrap();
        assert_eq!(mock.calls_matching("mark_read msg1").len(), 1);
    }

    #[tokio::test]
    async fn messages_are_not_reprocessed_after_read() {
        let mock = MockPlatform::new("fh-bot");
        mock.add_inbox_message(message("list", "pics"));
        let h = handler(&mock, false);
        h.poll_inbox().await.unwrap();
        h.poll_inbox().await.unwrap();
        assert_eq!(mock.calls_matching("reply_message msg1").len(), 1);
    }
}
