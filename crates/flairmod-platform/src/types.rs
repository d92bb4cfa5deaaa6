// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// A submission and the state the processor needs to act on it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Submission {
    /// Base-36 id without the `t3_` prefix.
    pub id: String,
    pub title: String,
    /// `None` once the account is deleted.
    pub author: Option<String>,
    pub author_id: Option<String>,
    #[serde(default)]
    pub author_is_suspended: bool,
    /// Markdown body; empty for link posts.
    pub selftext: String,
    pub permalink: String,
    /// Link target; equals the permalink for self posts.
    pub url: String,
    pub domain: String,
    pub subreddit: String,
    pub subreddit_id: String,
    pub score: i64,
    pub over_18: bool,
    /// Creation time, epoch seconds UTC.
    pub created_utc: i64,
    pub removed: bool,
    pub locked: bool,
    pub spoiler: bool,
    pub link_flair_text: Option<String>,
    pub link_flair_css_class: Option<String>,
    pub link_flair_template_id: Option<String>,
    pub author_flair_text: Option<String>,
    pub author_flair_css_class: Option<String>,
    pub author_flair_template_id: Option<String>,
    /// `(reason, count)` pairs.
    #[serde(default)]
    pub user_reports: Vec<(String, i64)>,
    /// `(moderator, reason)` pairs.
    #[serde(default)]
    pub mod_reports: Vec<(String, String)>,
}

/// A comment under a submission, as seen by the comment-nuke action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentInfo {
    pub id: String,
    pub removed: bool,
    /// `Some("moderator")` for distinguished mod comments.
    pub distinguished: Option<String>,
}

/// A recent comment or submission authored by a user, for the cross-community
/// nuke sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthoredItem {
    pub id: String,
    pub subreddit: String,
    pub removed: bool,
}

/// One entry of the unified moderation log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModLogEntry {
    /// Action name as reported upstream, e.g. `editflair`, `wikirevise`.
    pub action: String,
    pub mod_name: String,
    pub subreddit: String,
    /// Prefixed fullname of the target (`t3_…` for submissions).
    pub target_fullname: Option<String>,
    pub details: Option<String>,
}

impl ModLogEntry {
    /// Submission id when the entry targets a submission.
    pub fn submission_id(&self) -> Option<&str> {
        self.target_fullname
            .as_deref()
            .and_then(|f| f.strip_prefix("t3_"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlairTemplate {
    pub id: String,
    pub text: String,
    pub mod_only: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModeratorInfo {
    pub name: String,
    /// Permission names; `all` grants everything.
    pub permissions: Vec<String>,
}

impl ModeratorInfo {
    pub fn has_permission(&self, perm: &str) -> bool {
        self.permissions.iter().any(|p| p == perm || p == "all")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserFlairInfo {
    pub text: String,
    pub css_class: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboxMessage {
    pub id: String,
    /// `None` for system-sent mail.
    pub author: Option<String>,
    pub subject: String,
    pub body: String,
    /// Set on community-sent mail such as moderator invitations.
    pub subreddit: Option<String>,
    /// Comment replies arrive in the same inbox; the handler skips them.
    #[serde(default)]
    pub was_comment: bool,
}

/// How a removal message is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalCommentKind {
    Public,
    Private,
    PrivateExposed,
    PublicAsSubreddit,
}

impl RemovalCommentKind {
    /// Parse the configured string; blank or unrecognized values fall back to
    /// `public_as_subreddit`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "public" => RemovalCommentKind::Public,
            "private" => RemovalCommentKind::Private,
            "private_exposed" => RemovalCommentKind::PrivateExposed,
            _ => RemovalCommentKind::PublicAsSubreddit,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalCommentKind::Public => "public",
            RemovalCommentKind::Private => "private",
            RemovalCommentKind::PrivateExposed => "private_exposed",
            RemovalCommentKind::PublicAsSubreddit => "public_as_subreddit",
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_id_strips_prefix() {
        let entry = ModLogEntry {
            target_fullname: Some("t3_abc123".into()),
            ..Default::default()
        };
        assert_eq!(entry.submission_id(), Some("abc123"));

        let comment = ModLogEntry {
            target_fullname: Some("t1_xyz".into()),
            ..Default::default()
        };
        assert_eq!(comment.submission_id(), None);
    }

    #[test]
    fn all_permission_grants_everything() {
        let m = ModeratorInfo {
            name: "m1".into(),
            permissions: vec!["all".into()],
        };
        assert!(m.has_permission("config"));
        assert!(m.has_permission("wiki"));
    }

    #[test]
    fn removal_kind_falls_back() {
        assert_eq!(RemovalCommentKind::parse("private"), RemovalCommentKind::Private);
        assert_eq!(RemovalCommentKind::parse(""), RemovalCommentKind::PublicAsSubreddit);
        assert_eq!(
            RemovalCommentKind::parse("shouted"),
            RemovalCommentKind::PublicAsSubreddit
        );
    }
}
