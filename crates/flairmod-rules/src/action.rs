// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::schema::FlairRule;

/// The closed vocabulary of per-submission actions. The persistent queue
/// stores these by name; nothing else is ever inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Approve,
    Remove,
    ModlogReason,
    Lock,
    Spoiler,
    ClearPostFlair,
    SendToWebhook,
    Comment,
    Ban,
    Unban,
    UserFlair,
    Usernote,
    Contributor,
    Nuke,
    NukeUserComments,
}

impl ActionKind {
    /// Stable storage name, shared with the queue table.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Approve => "approve",
            ActionKind::Remove => "remove",
            ActionKind::ModlogReason => "modlogReason",
            ActionKind::Lock => "lock",
            ActionKind::Spoiler => "spoiler",
            ActionKind::ClearPostFlair => "clearPostFlair",
            ActionKind::SendToWebhook => "sendToWebhook",
            ActionKind::Comment => "comment",
            ActionKind::Ban => "ban",
            ActionKind::Unban => "unban",
            ActionKind::UserFlair => "userFlair",
            ActionKind::Usernote => "usernote",
            ActionKind::Contributor => "contributor",
            ActionKind::Nuke => "nuke",
            ActionKind::NukeUserComments => "nukeUserComments",
        }
    }

    /// Actions that touch the author rather than the submission. These are
    /// short-circuited to completed when the author is deleted or suspended.
    pub fn is_author_scoped(&self) -> bool {
        matches!(
            self,
            ActionKind::Comment
                | ActionKind::Ban
                | ActionKind::Unban
                | ActionKind::UserFlair
                | ActionKind::Usernote
                | ActionKind::Contributor
                | ActionKind::Nuke
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "approve" => ActionKind::Approve,
            "remove" => ActionKind::Remove,
            "modlogReason" => ActionKind::ModlogReason,
            "lock" => ActionKind::Lock,
            "spoiler" => ActionKind::Spoiler,
            "clearPostFlair" => ActionKind::ClearPostFlair,
            "sendToWebhook" => ActionKind::SendToWebhook,
            "comment" => ActionKind::Comment,
            "ban" => ActionKind::Ban,
            "unban" => ActionKind::Unban,
            "userFlair" => ActionKind::UserFlair,
            "usernote" => ActionKind::Usernote,
            "contributor" => ActionKind::Contributor,
            "nuke" => ActionKind::Nuke,
            "nukeUserComments" => ActionKind::NukeUserComments,
            other => return Err(format!("unknown action kind: {other}")),
        })
    }
}

/// Expand a matched rule into the set of action rows to enqueue.
///
/// A non-empty `modlogReason` only becomes its own row when `remove` is off;
/// with `remove` on, the removal call itself carries the mod-note and the
/// extra row would never do work.
pub fn actions_for_rule(rule: &FlairRule) -> Vec<ActionKind> {
    let mut actions = Vec::new();
    if rule.approve {
        actions.push(ActionKind::Approve);
    }
    if rule.remove {
        actions.push(ActionKind::Remove);
    }
    if !rule.modlog_reason.trim().is_empty() && !rule.remove {
        actions.push(ActionKind::ModlogReason);
    }
    if rule.lock {
        actions.push(ActionKind::Lock);
    }
    if rule.spoiler {
        actions.push(ActionKind::Spoiler);
    }
    if rule.clear_post_flair {
        actions.push(ActionKind::ClearPostFlair);
    }
    if rule.comment.enabled {
        actions.push(ActionKind::Comment);
    }
    if rule.nuke_user_comments {
        actions.push(ActionKind::NukeUserComments);
    }
    if rule.usernote.enabled {
        actions.push(ActionKind::Usernote);
    }
    if rule.contributor.enabled {
        actions.push(ActionKind::Contributor);
    }
    if rule.user_flair.enabled {
        actions.push(ActionKind::UserFlair);
    }
    if rule.ban.enabled {
        actions.push(ActionKind::Ban);
    }
    if rule.unban {
        actions.push(ActionKind::Unban);
    }
    if rule.nuke.enabled {
        actions.push(ActionKind::Nuke);
    }
    if rule.send_to_webhook {
        actions.push(ActionKind::SendToWebhook);
    }
    actions
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_storage_names() {
        let all = [
            ActionKind::Approve,
            ActionKind::Remove,
            ActionKind::ModlogReason,
            ActionKind::Lock,
            ActionKind::Spoiler,
            ActionKind::ClearPostFlair,
            ActionKind::SendToWebhook,
            ActionKind::Comment,
            ActionKind::Ban,
            ActionKind::Unban,
            ActionKind::UserFlair,
            ActionKind::Usernote,
            ActionKind::Contributor,
            ActionKind::Nuke,
            ActionKind::NukeUserComments,
        ];
        for kind in all {
            assert_eq!(kind.as_str().parse::<ActionKind>().unwrap(), kind);
        }
        assert!("shadowban".parse::<ActionKind>().is_err());
    }

    #[test]
    fn modlog_reason_folds_into_remove() {
        let mut rule = FlairRule {
            template_id: "g".into(),
            remove: true,
            modlog_reason: "rule 1".into(),
            ..Default::default()
        };
        let actions = actions_for_rule(&rule);
        assert!(actions.contains(&ActionKind::Remove));
        assert!(!actions.contains(&ActionKind::ModlogReason));

        rule.remove = false;
        let actions = actions_for_rule(&rule);
        assert_eq!(actions, vec![ActionKind::ModlogReason]);
    }

    #[test]
    fn disabled_rule_yields_no_actions() {
        let rule = FlairRule {
            template_id: "g".into(),
            ..Default::default()
        };
        assert!(actions_for_rule(&rule).is_empty());
    }

    #[test]
    fn full_rule_yields_full_set() {
        let rule = FlairRule {
            template_id: "g".into(),
            approve: true,
            remove: true,
            lock: true,
            spoiler: true,
            clear_post_flair: true,
            modlog_reason: "r".into(),
            comment: crate::CommentRule {
                enabled: true,
                ..Default::default()
            },
            nuke_user_comments: true,
            usernote: crate::UsernoteRule {
                enabled: true,
                ..Default::default()
            },
            contributor: crate::ContributorRule {
                enabled: true,
                ..Default::default()
            },
            user_flair: crate::UserFlairRule {
                enabled: true,
                ..Default::default()
            },
            ban: crate::BanRule {
                enabled: true,
                ..Default::default()
            },
            unban: true,
            send_to_webhook: true,
            nuke: crate::NukeRule {
                enabled: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let actions = actions_for_rule(&rule);
        assert_eq!(actions.len(), 14);
        assert!(!actions.contains(&ActionKind::ModlogReason));
    }
}
