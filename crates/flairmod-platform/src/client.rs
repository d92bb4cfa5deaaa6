// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::{
    error::PlatformError,
    types::{
        AuthoredItem, CommentInfo, FlairTemplate, InboxMessage, ModLogEntry, ModeratorInfo,
        RemovalCommentKind, Submission, UserFlairInfo,
    },
};

pub type ModLogStream = Pin<Box<dyn Stream<Item = Result<ModLogEntry, PlatformError>> + Send>>;

/// Capability handle for the forum platform, threaded into every component
/// by construction. Object-safe so the engine can hold `Arc<dyn Platform>`.
///
/// Per-call timeouts and connection reuse belong to the implementation; the
/// callers own the retry policy.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Account name the client is authenticated as.
    fn bot_username(&self) -> &str;

    /// Communities this account moderates.
    async fn moderated_subreddits(&self) -> Result<Vec<String>, PlatformError>;

    /// The unified mod-log across all moderated communities, newest first,
    /// skipping entries that existed before the call.
    async fn mod_log_stream(&self) -> Result<ModLogStream, PlatformError>;

    // ── Submissions ──────────────────────────────────────────────────────────

    async fn submission(&self, id: &str) -> Result<Submission, PlatformError>;
    async fn submission_comments(&self, id: &str) -> Result<Vec<CommentInfo>, PlatformError>;
    async fn approve_submission(&self, id: &str) -> Result<(), PlatformError>;
    async fn remove_submission(
        &self,
        id: &str,
        spam: bool,
        mod_note: &str,
    ) -> Result<(), PlatformError>;
    async fn lock_submission(&self, id: &str) -> Result<(), PlatformError>;
    async fn unlock_submission(&self, id: &str) -> Result<(), PlatformError>;
    async fn spoiler_submission(&self, id: &str) -> Result<(), PlatformError>;
    async fn unspoiler_submission(&self, id: &str) -> Result<(), PlatformError>;
    /// Set the post flair text/css; empty strings clear it.
    async fn set_post_flair(
        &self,
        id: &str,
        text: &str,
        css_class: &str,
    ) -> Result<(), PlatformError>;
    /// Attach a standalone mod-log note to a submission.
    async fn create_mod_note(&self, id: &str, note: &str) -> Result<(), PlatformError>;
    /// Deliver the formatted removal reason with the configured visibility.
    async fn send_removal_message(
        &self,
        id: &str,
        message: &str,
        kind: RemovalCommentKind,
    ) -> Result<(), PlatformError>;
    /// Reply to a submission; returns the new comment id.
    async fn reply_to_submission(&self, id: &str, body: &str) -> Result<String, PlatformError>;

    // ── Comments ─────────────────────────────────────────────────────────────

    async fn distinguish_comment(&self, id: &str, sticky: bool) -> Result<(), PlatformError>;
    async fn lock_comment(&self, id: &str) -> Result<(), PlatformError>;
    async fn remove_comment(&self, id: &str) -> Result<(), PlatformError>;

    // ── Users within a community ─────────────────────────────────────────────

    async fn ban_user(
        &self,
        subreddit: &str,
        user: &str,
        message: &str,
        reason: &str,
        duration_days: Option<u32>,
    ) -> Result<(), PlatformError>;
    async fn unban_user(&self, subreddit: &str, user: &str) -> Result<(), PlatformError>;
    async fn set_user_flair(
        &self,
        subreddit: &str,
        user: &str,
        text: &str,
        css_class: &str,
    ) -> Result<(), PlatformError>;
    async fn set_user_flair_template(
        &self,
        subreddit: &str,
        user: &str,
        template_id: &str,
    ) -> Result<(), PlatformError>;
    async fn user_flair(
        &self,
        subreddit: &str,
        user: &str,
    ) -> Result<Option<UserFlairInfo>, PlatformError>;
    async fn add_contributor(&self, subreddit: &str, user: &str) -> Result<(), PlatformError>;
    async fn remove_contributor(&self, subreddit: &str, user: &str)
        -> Result<(), PlatformError>;

    // ── User history (nuke sweep) ────────────────────────────────────────────

    async fn user_comments(&self, user: &str) -> Result<Vec<AuthoredItem>, PlatformError>;
    async fn user_submissions(&self, user: &str) -> Result<Vec<AuthoredItem>, PlatformError>;
    async fn remove_user_submission(&self, id: &str) -> Result<(), PlatformError>;

    // ── Community metadata ───────────────────────────────────────────────────

    async fn moderators(&self, subreddit: &str) -> Result<Vec<ModeratorInfo>, PlatformError>;
    async fn am_moderator(&self, subreddit: &str) -> Result<bool, PlatformError>;
    async fn link_flair_templates(
        &self,
        subreddit: &str,
    ) -> Result<Vec<FlairTemplate>, PlatformError>;
    async fn accept_mod_invite(&self, subreddit: &str) -> Result<(), PlatformError>;

    // ── Wiki ─────────────────────────────────────────────────────────────────

    async fn wiki_page(&self, subreddit: &str, page: &str) -> Result<String, PlatformError>;
    async fn edit_wiki_page(
        &self,
        subreddit: &str,
        page: &str,
        content: &str,
        reason: &str,
    ) -> Result<(), PlatformError>;
    /// Author of the latest revision, `None` when the history is empty.
    async fn wiki_revision_author(
        &self,
        subreddit: &str,
        page: &str,
    ) -> Result<Option<String>, PlatformError>;

    // ── Messaging ────────────────────────────────────────────────────────────

    async fn unread_messages(&self) -> Result<Vec<InboxMessage>, PlatformError>;
    async fn mark_read(&self, message_id: &str) -> Result<(), PlatformError>;
    async fn reply_message(&self, message_id: &str, body: &str) -> Result<(), PlatformError>;
    async fn send_message_to_user(
        &self,
        user: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), PlatformError>;
    async fn send_message_to_subreddit(
        &self,
        subreddit: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), PlatformError>;
}
