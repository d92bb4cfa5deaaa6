// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Scriptable in-memory [`Platform`] double.
//!
//! Tests seed the world (submissions, wiki pages, moderators, inbox), feed
//! mod-log entries through [`MockPlatform::push_mod_log`], and assert on the
//! recorded call log plus the mutated state afterwards. Single failures are
//! injected per method name with [`MockPlatform::fail_next`], which makes
//! retry and crash-resume paths reproducible.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{
    client::{ModLogStream, Platform},
    error::PlatformError,
    types::{
        AuthoredItem, CommentInfo, FlairTemplate, InboxMessage, ModLogEntry, ModeratorInfo,
        RemovalCommentKind, Submission, UserFlairInfo,
    },
};

#[derive(Default)]
struct State {
    moderated: Vec<String>,
    submissions: HashMap<String, Submission>,
    comments: HashMap<String, Vec<CommentInfo>>,
    wiki: HashMap<(String, String), String>,
    wiki_authors: HashMap<(String, String), String>,
    moderators: HashMap<String, Vec<ModeratorInfo>>,
    flair_templates: HashMap<String, Vec<FlairTemplate>>,
    user_flairs: HashMap<(String, String), UserFlairInfo>,
    user_comments: HashMap<String, Vec<AuthoredItem>>,
    user_submissions: HashMap<String, Vec<AuthoredItem>>,
    inbox: Vec<InboxMessage>,
    read_messages: HashSet<String>,
    banned: HashMap<(String, String), Option<u32>>,
    contributors: HashSet<(String, String)>,
    calls: Vec<String>,
    fail_next: HashMap<&'static str, VecDeque<PlatformError>>,
    comment_counter: u64,
}

/// In-memory platform double with a scriptable world.
#[derive(Clone, Default)]
pub struct MockPlatform {
    username: String,
    state: Arc<Mutex<State>>,
    mod_log_tx: Arc<Mutex<Option<mpsc::UnboundedSender<ModLogEntry>>>>,
    mod_log_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<ModLogEntry>>>>,
}

impl MockPlatform {
    pub fn new(username: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            username: username.to_string(),
            state: Arc::default(),
            mod_log_tx: Arc::new(Mutex::new(Some(tx))),
            mod_log_rx: Arc::new(Mutex::new(Some(rx))),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("mock state lock")
    }

    fn gate(&self, method: &'static str) -> Result<(), PlatformError> {
        let mut state = self.lock();
        if let Some(queue) = state.fail_next.get_mut(method) {
            if let Some(err) = queue.pop_front() {
                state.calls.push(format!("{method}!err"));
                return Err(err);
            }
        }
        Ok(())
    }

    fn record(&self, line: String) {
        self.lock().calls.push(line);
    }

    // ── World setup ──────────────────────────────────────────────────────────

    pub fn moderate(&self, subreddit: &str) {
        self.lock().moderated.push(subreddit.to_string());
    }

    pub fn add_submission(&self, submission: Submission) {
        let mut state = self.lock();
        state.submissions.insert(submission.id.clone(), submission);
    }

    pub fn add_comment(&self, submission_id: &str, comment: CommentInfo) {
        self.lock()
            .comments
            .entry(submission_id.to_string())
            .or_default()
            .push(comment);
    }

    pub fn set_wiki(&self, subreddit: &str, page: &str, content: &str) {
        self.lock()
            .wiki
            .insert((subreddit.to_string(), page.to_string()), content.to_string());
    }

    pub fn set_wiki_author(&self, subreddit: &str, page: &str, author: &str) {
        self.lock()
            .wiki_authors
            .insert((subreddit.to_string(), page.to_string()), author.to_string());
    }

    pub fn add_moderator(&self, subreddit: &str, name: &str, permissions: &[&str]) {
        self.lock()
            .moderators
            .entry(subreddit.to_string())
            .or_default()
            .push(ModeratorInfo {
                name: name.to_string(),
                permissions: permissions.iter().map(|p| p.to_string()).collect(),
            });
    }

    pub fn add_flair_template(&self, subreddit: &str, template: FlairTemplate) {
        self.lock()
            .flair_templates
            .entry(subreddit.to_string())
            .or_default()
            .push(template);
    }

    pub fn set_user_flair_info(&self, subreddit: &str, user: &str, info: UserFlairInfo) {
        self.lock()
            .user_flairs
            .insert((subreddit.to_string(), user.to_string()), info);
    }

    pub fn add_user_comment(&self, user: &str, item: AuthoredItem) {
        self.lock()
            .user_comments
            .entry(user.to_string())
            .or_default()
            .push(item);
    }

    pub fn add_user_submission(&self, user: &str, item: AuthoredItem) {
        self.lock()
            .user_submissions
            .entry(user.to_string())
            .or_default()
            .push(item);
    }

    pub fn add_inbox_message(&self, message: InboxMessage) {
        self.lock().inbox.push(message);
    }

    /// Queue a single failure for the next call of `method`.
    pub fn fail_next(&self, method: &'static str, err: PlatformError) {
        self.lock().fail_next.entry(method).or_default().push_back(err);
    }

    /// Feed one mod-log entry into the stream.
    pub fn push_mod_log(&self, entry: ModLogEntry) {
        if let Some(tx) = self.mod_log_tx.lock().expect("mock modlog lock").as_ref() {
            let _ = tx.send(entry);
        }
    }

    /// Drop the sender so the mod-log stream ends.
    pub fn close_mod_log(&self) {
        self.mod_log_tx.lock().expect("mock modlog lock").take();
    }

    // ── Inspection ───────────────────────────────────────────────────────────

    /// Flat call log, one `method arg…` line per platform call.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn submission_state(&self, id: &str) -> Option<Submission> {
        self.lock().submissions.get(id).cloned()
    }

    pub fn ban_duration(&self, subreddit: &str, user: &str) -> Option<Option<u32>> {
        self.lock()
            .banned
            .get(&(subreddit.to_string(), user.to_string()))
            .copied()
    }

    pub fn is_contributor(&self, subreddit: &str, user: &str) -> bool {
        self.lock()
            .contributors
            .contains(&(subreddit.to_string(), user.to_string()))
    }

    pub fn wiki_content(&self, subreddit: &str, page: &str) -> Option<String> {
        self.lock()
            .wiki
            .get(&(subreddit.to_string(), page.to_string()))
            .cloned()
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn bot_username(&self) -> &str {
        &self.username
    }

    async fn moderated_subreddits(&self) -> Result<Vec<String>, PlatformError> {
        self.gate("moderated_subreddits")?;
        Ok(self.lock().moderated.clone())
    }

    async fn mod_log_stream(&self) -> Result<ModLogStream, PlatformError> {
        self.gate("mod_log_stream")?;
        let rx = self
            .mod_log_rx
            .lock()
            .expect("mock modlog lock")
            .take()
            .ok_or_else(|| PlatformError::Network("mod log stream already taken".into()))?;
        Ok(UnboundedReceiverStream::new(rx).map(Ok).boxed())
    }

    async fn submission(&self, id: &str) -> Result<Submission, PlatformError> {
        self.gate("submission")?;
        self.lock()
            .submissions
            .get(id)
            .cloned()
            .ok_or(PlatformError::NotFound)
    }

    async fn submission_comments(&self, id: &str) -> Result<Vec<CommentInfo>, PlatformError> {
        self.gate("submission_comments")?;
        Ok(self.lock().comments.get(id).cloned().unwrap_or_default())
    }

    async fn approve_submission(&self, id: &str) -> Result<(), PlatformError> {
        self.gate("approve_submission")?;
        self.record(format!("approve_submission {id}"));
        if let Some(s) = self.lock().submissions.get_mut(id) {
            s.removed = false;
        }
        Ok(())
    }

    async fn remove_submission(
        &self,
        id: &str,
        spam: bool,
        mod_note: &str,
    ) -> Result<(), PlatformError> {
        self.gate("remove_submission")?;
        self.record(format!("remove_submission {id} spam={spam} note={mod_note}"));
        if let Some(s) = self.lock().submissions.get_mut(id) {
            s.removed = true;
        }
        Ok(())
    }

    async fn lock_submission(&self, id: &str) -> Result<(), PlatformError> {
        self.gate("lock_submission")?;
        self.record(format!("lock_submission {id}"));
        if let Some(s) = self.lock().submissions.get_mut(id) {
            s.locked = true;
        }
        Ok(())
    }

    async fn unlock_submission(&self, id: &str) -> Result<(), PlatformError> {
        self.gate("unlock_submission")?;
        self.record(format!("unlock_submission {id}"));
        if let Some(s) = self.lock().submissions.get_mut(id) {
            s.locked = false;
        }
        Ok(())
    }

    async fn spoiler_submission(&self, id: &str) -> Result<(), PlatformError> {
        self.gate("spoiler_submission")?;
        self.record(format!("spoiler_submission {id}"));
        if let Some(s) = self.lock().submissions.get_mut(id) {
            s.spoiler = true;
        }
        Ok(())
    }

    async fn unspoiler_submission(&self, id: &str) -> Result<(), PlatformError> {
        self.gate("unspoiler_submission")?;
        self.record(format!("unspoiler_submission {id}"));
        if let Some(s) = self.lock().submissions.get_mut(id) {
            s.spoiler = false;
        }
        Ok(())
    }

    async fn set_post_flair(
        &self,
        id: &str,
        text: &str,
        css_class: &str,
    ) -> Result<(), PlatformError> {
        self.gate("set_post_flair")?;
        self.record(format!("set_post_flair {id} text={text} css={css_class}"));
        if let Some(s) = self.lock().submissions.get_mut(id) {
            s.link_flair_text = (!text.is_empty()).then(|| text.to_string());
            s.link_flair_css_class = (!css_class.is_empty()).then(|| css_class.to_string());
            if text.is_empty() && css_class.is_empty() {
                s.link_flair_template_id = None;
            }
        }
        Ok(())
    }

    async fn create_mod_note(&self, id: &str, note: &str) -> Result<(), PlatformError> {
        self.gate("create_mod_note")?;
        self.record(format!("create_mod_note {id} note={note}"));
        Ok(())
    }

    async fn send_removal_message(
        &self,
        id: &str,
        message: &str,
        kind: RemovalCommentKind,
    ) -> Result<(), PlatformError> {
        self.gate("send_removal_message")?;
        self.record(format!(
            "send_removal_message {id} kind={} message={message}",
            kind.as_str()
        ));
        Ok(())
    }

    async fn reply_to_submission(&self, id: &str, body: &str) -> Result<String, PlatformError> {
        self.gate("reply_to_submission")?;
        let comment_id = {
            let mut state = self.lock();
            state.comment_counter += 1;
            format!("c{}", state.comment_counter)
        };
        self.record(format!("reply_to_submission {id} comment={comment_id} body={body}"));
        Ok(comment_id)
    }

    async fn distinguish_comment(&self, id: &str, sticky: bool) -> Result<(), PlatformError> {
        self.gate("distinguish_comment")?;
        self.record(format!("distinguish_comment {id} sticky={sticky}"));
        Ok(())
    }

    async fn lock_comment(&self, id: &str) -> Result<(), PlatformError> {
        self.gate("lock_comment")?;
        self.record(format!("lock_comment {id}"));
        Ok(())
    }

    async fn remove_comment(&self, id: &str) -> Result<(), PlatformError> {
        self.gate("remove_comment")?;
        self.record(format!("remove_comment {id}"));
        Ok(())
    }

    async fn ban_user(
        &self,
        subreddit: &str,
        user: &str,
        message: &str,
        reason: &str,
        duration_days: Option<u32>,
    ) -> Result<(), PlatformError> {
        self.gate("ban_user")?;
        self.record(format!(
            "ban_user {subreddit} {user} duration={duration_days:?} reason={reason} message={message}"
        ));
        self.lock()
            .banned
            .insert((subreddit.to_string(), user.to_string()), duration_days);
        Ok(())
    }

    async fn unban_user(&self, subreddit: &str, user: &str) -> Result<(), PlatformError> {
        self.gate("unban_user")?;
        self.record(format!("unban_user {subreddit} {user}"));
        self.lock()
            .banned
            .remove(&(subreddit.to_string(), user.to_string()));
        Ok(())
    }

    async fn set_user_flair(
        &self,
        subreddit: &str,
        user: &str,
        text: &str,
        css_class: &str,
    ) -> Result<(), PlatformError> {
        self.gate("set_user_flair")?;
        self.record(format!("set_user_flair {subreddit} {user} text={text} css={css_class}"));
        self.lock().user_flairs.insert(
            (subreddit.to_string(), user.to_string()),
            UserFlairInfo {
                text: text.to_string(),
                css_class: css_class.to_string(),
            },
        );
        Ok(())
    }

    async fn set_user_flair_template(
        &self,
        subreddit: &str,
        user: &str,
        template_id: &str,
    ) -> Result<(), PlatformError> {
        self.gate("set_user_flair_template")?;
        self.record(format!(
            "set_user_flair_template {subreddit} {user} template={template_id}"
        ));
        Ok(())
    }

    async fn user_flair(
        &self,
        subreddit: &str,
        user: &str,
    ) -> Result<Option<UserFlairInfo>, PlatformError> {
        self.gate("user_flair")?;
        Ok(self
            .lock()
            .user_flairs
            .get(&(subreddit.to_string(), user.to_string()))
            .cloned())
    }

    async fn add_contributor(&self, subreddit: &str, user: &str) -> Result<(), PlatformError> {
        self.gate("add_contributor")?;
        self.record(format!("add_contributor {subreddit} {user}"));
        self.lock()
            .contributors
            .insert((subreddit.to_string(), user.to_string()));
        Ok(())
    }

    async fn remove_contributor(
        &self,
        subreddit: &str,
        user: &str,
    ) -> Result<(), PlatformError> {
        self.gate("remove_contributor")?;
        self.record(format!("remove_contributor {subreddit} {user}"));
        self.lock()
            .contributors
            .remove(&(subreddit.to_string(), user.to_string()));
        Ok(())
    }

    async fn user_comments(&self, user: &str) -> Result<Vec<AuthoredItem>, PlatformError> {
        self.gate("user_comments")?;
        Ok(self.lock().user_comments.get(user).cloned().unwrap_or_default())
    }

    async fn user_submissions(&self, user: &str) -> Result<Vec<AuthoredItem>, PlatformError> {
        self.gate("user_submissions")?;
        Ok(self
            .lock()
            .user_submissions
            .get(user)
            .cloned()
            .unwrap_or_default())
    }

    async fn remove_user_submission(&self, id: &str) -> Result<(), PlatformError> {
        self.gate("remove_user_submission")?;
        self.record(format!("remove_user_submission {id}"));
        Ok(())
    }

    async fn moderators(&self, subreddit: &str) -> Result<Vec<ModeratorInfo>, PlatformError> {
        self.gate("moderators")?;
        Ok(self.lock().moderators.get(subreddit).cloned().unwrap_or_default())
    }

    async fn am_moderator(&self, subreddit: &str) -> Result<bool, PlatformError> {
        self.gate("am_moderator")?;
        Ok(self.lock().moderated.iter().any(|s| s == subreddit))
    }

    async fn link_flair_templates(
        &self,
        subreddit: &str,
    ) -> Result<Vec<FlairTemplate>, PlatformError> {
        self.gate("link_flair_templates")?;
        Ok(self
            .lock()
            .flair_templates
            .get(subreddit)
            .cloned()
            .unwrap_or_default())
    }

    async fn accept_mod_invite(&self, subreddit: &str) -> Result<(), PlatformError> {
        self.gate("accept_mod_invite")?;
        self.record(format!("accept_mod_invite {subreddit}"));
        self.lock().moderated.push(subreddit.to_string());
        Ok(())
    }

    async fn wiki_page(&self, subreddit: &str, page: &str) -> Result<String, PlatformError> {
        self.gate("wiki_page")?;
        self.lock()
            .wiki
            .get(&(subreddit.to_string(), page.to_string()))
            .cloned()
            .ok_or(PlatformError::NotFound)
    }

    async fn edit_wiki_page(
        &self,
        subreddit: &str,
        page: &str,
        content: &str,
        reason: &str,
    ) -> Result<(), PlatformError> {
        self.gate("edit_wiki_page")?;
        self.record(format!("edit_wiki_page {subreddit}/{page} reason={reason}"));
        self.lock()
            .wiki
            .insert((subreddit.to_string(), page.to_string()), content.to_string());
        Ok(())
    }

    async fn wiki_revision_author(
        &self,
        subreddit: &str,
        page: &str,
    ) -> Result<Option<String>, PlatformError> {
        self.gate("wiki_revision_author")?;
        Ok(self
            .lock()
            .wiki_authors
            .get(&(subreddit.to_string(), page.to_string()))
            .cloned())
    }

    async fn unread_messages(&self) -> Result<Vec<InboxMessage>, PlatformError> {
        self.gate("unread_messages")?;
        let state = self.lock();
        Ok(state
            .inbox
            .iter()
            .filter(|m| !state.read_messages.contains(&m.id))
            .cloned()
            .collect())
    }

    async fn mark_read(&self, message_id: &str) -> Result<(), PlatformError> {
        self.gate("mark_read")?;
        self.record(format!("mark_read {message_id}"));
        self.lock().read_messages.insert(message_id.to_string());
        Ok(())
    }

    async fn reply_message(&self, message_id: &str, body: &str) -> Result<(), PlatformError> {
        self.gate("reply_message")?;
        self.record(format!("reply_message {message_id} body={body}"));
        Ok(())
    }

    async fn send_message_to_user(
        &self,
        user: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), PlatformError> {
        self.gate("send_message_to_user")?;
        self.record(format!("send_message_to_user {user} subject={subject} body={body}"));
        Ok(())
    }

    async fn send_message_to_subreddit(
        &self,
        subreddit: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), PlatformError> {
        self.gate("send_message_to_subreddit")?;
        self.record(format!(
            "send_message_to_subreddit {subreddit} subject={subject} body={body}"
        ));
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_and_mutates_state() {
        let mock = MockPlatform::new("fh-bot");
        mock.add_submission(Submission {
            id: "p1".into(),
            ..Default::default()
        });
        mock.remove_submission("p1", false, "note").await.unwrap();
        assert!(mock.submission_state("p1").unwrap().removed);
        assert_eq!(mock.calls_matching("remove_submission").len(), 1);
    }

    #[tokio::test]
    async fn fail_next_injects_one_error() {
        let mock = MockPlatform::new("fh-bot");
        mock.add_submission(Submission {
            id: "p1".into(),
            ..Default::default()
        });
        mock.fail_next("lock_submission", PlatformError::Server { status: 503 });
        assert!(mock.lock_submission("p1").await.is_err());
        assert!(mock.lock_submission("p1").await.is_ok());
    }

    #[tokio::test]
    async fn missing_submission_is_not_found() {
        let mock = MockPlatform::new("fh-bot");
        assert!(matches!(
            mock.submission("nope").await,
            Err(PlatformError::NotFound)
        ));
    }

    #[tokio::test]
    async fn mod_log_stream_delivers_pushed_entries() {
        let mock = MockPlatform::new("fh-bot");
        mock.push_mod_log(ModLogEntry {
            action: "editflair".into(),
            ..Default::default()
        });
        mock.close_mod_log();
        let mut stream = mock.mod_log_stream().await.unwrap();
        let entry = stream.next().await.unwrap().unwrap();
        assert_eq!(entry.action, "editflair");
        assert!(stream.next().await.is_none());
    }
}
