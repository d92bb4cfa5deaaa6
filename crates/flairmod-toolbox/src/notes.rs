// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use flairmod_platform::Platform;
use flairmod_rules::BanTag;

use crate::blob::{compress_blob, decompress_blob};
use crate::ToolboxError;

/// Wiki page carrying the notes document.
pub const NOTES_PAGE: &str = "usernotes";
/// Prefix marking notes written by this bot.
pub const NOTE_PREFIX: &str = "[FH] ";
/// Note-text prefix of the escalating-ban history entries.
pub const BAN_HISTORY_PREFIX: &str = "FH-Ban-";

const DOCUMENT_VERSION: i64 = 6;

/// One per-user note. `m` and `w` index into the document's `constants`
/// tables; `l` is the shorthand submission link (`l,<id>`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub n: String,
    /// Epoch seconds.
    pub t: i64,
    pub m: usize,
    pub l: String,
    pub w: usize,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserNotes {
    #[serde(default)]
    pub ns: Vec<Note>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Inflated blob content: username → notes.
pub type NotesBlob = BTreeMap<String, UserNotes>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Constants {
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The outer wiki document. Fields this bot does not understand ride along
/// untouched in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsernotesDocument {
    pub ver: i64,
    #[serde(default)]
    pub constants: Constants,
    #[serde(default)]
    pub blob: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for UsernotesDocument {
    fn default() -> Self {
        Self {
            ver: DOCUMENT_VERSION,
            constants: Constants::default(),
            blob: String::new(),
            extra: serde_json::Map::new(),
        }
    }
}

impl UsernotesDocument {
    /// Index of `name` in the users table, appending when new.
    fn user_index(&mut self, name: &str) -> usize {
        match self.constants.users.iter().position(|u| u == name) {
            Some(i) => i,
            None => {
                self.constants.users.push(name.to_string());
                self.constants.users.len() - 1
            }
        }
    }

    /// Index of `category` in the warnings table, appending when new.
    /// No category means the default index 0.
    fn warning_index(&mut self, category: Option<&str>) -> usize {
        match category {
            None => 0,
            Some(cat) => match self.constants.warnings.iter().position(|w| w == cat) {
                Some(i) => i,
                None => {
                    self.constants.warnings.push(cat.to_string());
                    self.constants.warnings.len() - 1
                }
            },
        }
    }
}

/// Append-only notes writer with per-community serialization.
///
/// The wiki page is one read-modify-write blob, so concurrent appends for the
/// same community would lose notes; a per-community async lock rules that
/// out. Different communities append in parallel.
pub struct ToolboxNotes {
    platform: Arc<dyn Platform>,
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ToolboxNotes {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self {
            platform,
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn community_lock(&self, subreddit: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .expect("toolbox lock map")
            .entry(subreddit.to_string())
            .or_default()
            .clone()
    }

    async fn load_document(&self, subreddit: &str) -> Result<UsernotesDocument, ToolboxError> {
        match self.platform.wiki_page(subreddit, NOTES_PAGE).await {
            Ok(content) if content.trim().is_empty() => Ok(UsernotesDocument::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            // A community without the page yet starts from a fresh document.
            Err(flairmod_platform::PlatformError::NotFound) => {
                Ok(UsernotesDocument::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Append one note for `user`, prefixed `[FH] `, linked to the
    /// submission, attributed to `mod_name` under `category`.
    pub async fn append(
        &self,
        subreddit: &str,
        user: &str,
        note_text: &str,
        submission_id: &str,
        mod_name: &str,
        category: Option<&str>,
    ) -> Result<(), ToolboxError> {
        let lock = self.community_lock(subreddit);
        let _guard = lock.lock().await;

        let mut document = self.load_document(subreddit).await?;
        let mod_index = document.user_index(mod_name);
        let warning_index = document.warning_index(category);

        let mut notes = match decompress_blob(&document.blob) {
            Ok(notes) => notes,
            Err(err) => {
                // Same recovery the shared tool applies: a corrupt blob reads
                // as empty rather than blocking all future notes.
                warn!(subreddit, %err, "unreadable usernotes blob, starting fresh");
                NotesBlob::new()
            }
        };

        notes.entry(user.to_string()).or_default().ns.push(Note {
            n: format!("{NOTE_PREFIX}{note_text}"),
            t: Utc::now().timestamp(),
            m: mod_index,
            l: format!("l,{submission_id}"),
            w: warning_index,
            extra: serde_json::Map::new(),
        });

        document.blob = compress_blob(&notes)?;
        let content = serde_json::to_string(&document)?;
        let reason = format!("note added on user {user} via flairmod");
        self.platform
            .edit_wiki_page(subreddit, NOTES_PAGE, &content, &reason)
            .await?;
        debug!(subreddit, user, "usernote appended");
        Ok(())
    }

    /// Prior ban durations recorded for `user`, parsed from `[FH] FH-Ban-…`
    /// notes. Unreadable pages and blobs read as no history.
    pub async fn read_ban_history(
        &self,
        subreddit: &str,
        user: &str,
    ) -> Result<Vec<BanTag>, ToolboxError> {
        let document = self.load_document(subreddit).await?;
        let notes = match decompress_blob(&document.blob) {
            Ok(notes) => notes,
            Err(err) => {
                warn!(subreddit, %err, "unreadable usernotes blob, no ban history");
                return Ok(Vec::new());
            }
        };
        let Some(user_notes) = notes.get(user) else {
            return Ok(Vec::new());
        };
        let tags = user_notes
            .ns
            .iter()
            .filter_map(|note| note.n.strip_prefix(NOTE_PREFIX))
            .filter_map(|text| text.strip_prefix(BAN_HISTORY_PREFIX))
            // The recorded text may carry trailing words; the duration is the
            // first token after the prefix.
            .filter_map(|suffix| suffix.split_whitespace().next())
            .filter_map(BanTag::parse)
            .collect();
        Ok(tags)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use flairmod_platform::MockPlatform;

    fn notes(platform: &MockPlatform) -> ToolboxNotes {
        ToolboxNotes::new(Arc::new(platform.clone()))
    }

    #[tokio::test]
    async fn append_creates_document_on_missing_page() {
        let mock = MockPlatform::new("fh-bot");
        let toolbox = notes(&mock);
        toolbox
            .append("pics", "alice", "rule 1", "p1", "m1", Some("spamwatch"))
            .await
            .unwrap();

        let content = mock.wiki_content("pics", NOTES_PAGE).unwrap();
        let document: UsernotesDocument = serde_json::from_str(&content).unwrap();
        assert_eq!(document.ver, 6);
        assert_eq!(document.constants.users, vec!["m1".to_string()]);
        assert_eq!(document.constants.warnings, vec!["spamwatch".to_string()]);

        let blob = decompress_blob(&document.blob).unwrap();
        let note = &blob["alice"].ns[0];
        assert_eq!(note.n, "[FH] rule 1");
        assert_eq!(note.l, "l,p1");
        assert_eq!(note.m, 0);
        assert_eq!(note.w, 0);
    }

    #[tokio::test]
    async fn appends_accumulate_in_order() {
        let mock = MockPlatform::new("fh-bot");
        let toolbox = notes(&mock);
        for i in 1..=3 {
            toolbox
                .append("pics", "alice", &format!("note {i}"), "p1", "m1", None)
                .await
                .unwrap();
        }
        let content = mock.wiki_content("pics", NOTES_PAGE).unwrap();
        let document: UsernotesDocument = serde_json::from_str(&content).unwrap();
        let blob = decompress_blob(&document.blob).unwrap();
        let texts: Vec<&str> = blob["alice"].ns.iter().map(|n| n.n.as_str()).collect();
        assert_eq!(texts, vec!["[FH] note 1", "[FH] note 2", "[FH] note 3"]);
    }

    #[tokio::test]
    async fn constants_are_reused_not_duplicated() {
        let mock = MockPlatform::new("fh-bot");
        let toolbox = notes(&mock);
        toolbox
            .append("pics", "alice", "a", "p1", "m1", Some("cat"))
            .await
            .unwrap();
        toolbox
            .append("pics", "bob", "b", "p2", "m1", Some("cat"))
            .await
            .unwrap();
        let content = mock.wiki_content("pics", NOTES_PAGE).unwrap();
        let document: UsernotesDocument = serde_json::from_str(&content).unwrap();
        assert_eq!(document.constants.users.len(), 1);
        assert_eq!(document.constants.warnings.len(), 1);
    }

    #[tokio::test]
    async fn ban_history_parses_only_ban_notes() {
        let mock = MockPlatform::new("fh-bot");
        let toolbox = notes(&mock);
        toolbox.append("pics", "alice", "FH-Ban-3", "p1", "m1", None).await.unwrap();
        toolbox.append("pics", "alice", "regular note", "p2", "m1", None).await.unwrap();
        toolbox.append("pics", "alice", "FH-Ban-7", "p3", "m1", None).await.unwrap();
        toolbox
            .append("pics", "alice", "FH-Ban-permanent", "p4", "m1", None)
            .await
            .unwrap();

        let history = toolbox.read_ban_history("pics", "alice").await.unwrap();
        assert_eq!(
            history,
            vec![BanTag::Days(3), BanTag::Days(7), BanTag::Permanent]
        );
    }

    #[tokio::test]
    async fn history_for_unknown_user_is_empty() {
        let mock = MockPlatform::new("fh-bot");
        let toolbox = notes(&mock);
        assert!(toolbox.read_ban_history("pics", "ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn foreign_document_fields_survive_append() {
        let mock = MockPlatform::new("fh-bot");
        let existing = serde_json::json!({
            "ver": 6,
            "constants": {"users": ["othermod"], "warnings": ["abuse"]},
            "blob": "",
            "lastsaved": 12345
        });
        mock.set_wiki("pics", NOTES_PAGE, &existing.to_string());

        let toolbox = notes(&mock);
        toolbox.append("pics", "alice", "x", "p1", "m1", Some("abuse")).await.unwrap();

        let content = mock.wiki_content("pics", NOTES_PAGE).unwrap();
        let document: UsernotesDocument = serde_json::from_str(&content).unwrap();
        assert_eq!(document.extra.get("lastsaved").and_then(|v| v.as_i64()), Some(12345));
        assert_eq!(document.constants.users, vec!["othermod", "m1"]);
        // Existing warning index reused.
        assert_eq!(document.constants.warnings, vec!["abuse"]);
    }
}
