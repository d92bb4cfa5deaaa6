// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Starter-configuration generator for the `auto` message command.
//!
//! Produces a syntactically valid configuration covering the community's
//! moderator-only flair templates with every toggle off, so pasting it into
//! the wiki can never trigger actions by accident.

use std::sync::Arc;

use flairmod_platform::{Platform, PlatformError};
use flairmod_rules::{
    CommentRule, FlairRule, GeneralConfiguration, SubredditConfig, UsernoteRule,
};

/// Message-length ceiling for private replies.
pub const MAX_PM_LENGTH: usize = 10_000;

/// Build a defaults-off configuration from the community's moderator-only
/// flair templates.
pub async fn starter_config(
    platform: &Arc<dyn Platform>,
    subreddit: &str,
) -> Result<SubredditConfig, PlatformError> {
    let templates = platform.link_flair_templates(subreddit).await?;

    let general = GeneralConfiguration {
        notes: "This is an auto-generated configuration. Every toggle starts as false so \
                pasting it cannot trigger actions; review each flair and enable what you need."
            .to_string(),
        header: "Hi /u/{{author}}, thanks for contributing to /r/{{subreddit}}. \
                 Unfortunately, your post was removed as it violates our rules:"
            .to_string(),
        footer: "Please read the rules of /r/{{subreddit}} before posting again. Questions? \
                 [Message the moderators](https://www.reddit.com/message/compose?to=/r/{{subreddit}})."
            .to_string(),
        usernote_type_name: "flair_helper_note".to_string(),
        removal_comment_type: "public_as_subreddit".to_string(),
        ..Default::default()
    };

    let flairs = templates
        .into_iter()
        .filter(|t| t.mod_only)
        .map(|t| FlairRule {
            template_id: t.id,
            notes: t.text.clone(),
            modlog_reason: format!("Violated Rule: {}", t.text),
            comment: CommentRule {
                body: format!("Removed for violating rule: {}", t.text),
                ..Default::default()
            },
            usernote: UsernoteRule {
                enabled: false,
                note: format!("Removed: {}", t.text),
            },
            ..Default::default()
        })
        .collect();

    Ok(SubredditConfig { general, flairs })
}

/// Render the private-message reply carrying the starter config. When the
/// full reply exceeds the platform's message ceiling, trailing flair rules
/// are dropped until it fits.
pub fn render_starter_pm(subreddit: &str, config: &SubredditConfig) -> String {
    let mut config = config.clone();
    let mut reply = render_once(subreddit, &config);
    while reply.chars().count() > MAX_PM_LENGTH && !config.flairs.is_empty() {
        config.flairs.pop();
        reply = render_once(subreddit, &config);
    }
    reply
}

fn render_once(subreddit: &str, config: &SubredditConfig) -> String {
    format!(
        "Here's a sample configuration for /r/{subreddit} which you can place in \
         [https://www.reddit.com/r/{subreddit}/wiki/{page}]\
         (https://www.reddit.com/r/{subreddit}/wiki/{page})\n\n\
         All options start as false so the generated configuration cannot cause trouble; \
         review it carefully and enable the actions you want per flair.\n\n\
         ```json\n{json}\n```\n\n\
         Be sure to remove entries that should not trigger actions (announcements, notices, \
         news and similar).",
        page = crate::ingest::CONFIG_PAGE,
        json = config.pretty_json(),
    )
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
