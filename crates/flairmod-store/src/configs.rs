// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use flairmod_rules::SubredditConfig;

use crate::StoreError;

/// Persistent cache of active per-community configurations (one row per
/// community, canonical JSON value).
pub struct ConfigStore {
    conn: Mutex<Connection>,
}

impl ConfigStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    /// Transient store for tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS configs (
                 subreddit TEXT PRIMARY KEY,
                 config    TEXT)",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Upsert the active configuration for a community. The swap is atomic:
    /// readers observe either the old or the new value, never a mix.
    pub fn put(&self, subreddit: &str, config: &SubredditConfig) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("config store lock");
        conn.execute(
            "INSERT OR REPLACE INTO configs VALUES (?1, ?2)",
            params![subreddit, config.canonical_json()],
        )?;
        Ok(())
    }

    /// Fetch and parse a community's configuration. A row that no longer
    /// parses (schema drift, manual tampering) reads as absent, matching the
    /// behavior of an uncached community.
    pub fn get(&self, subreddit: &str) -> Result<Option<SubredditConfig>, StoreError> {
        match self.get_canonical(subreddit)? {
            None => Ok(None),
            Some(text) => match SubredditConfig::from_json(&text) {
                Ok(cfg) => Ok(Some(cfg)),
                Err(err) => {
                    warn!(subreddit, %err, "cached config is unreadable, treating as absent");
                    Ok(None)
                }
            },
        }
    }

    /// The stored canonical JSON, used by the ingest diff.
    pub fn get_canonical(&self, subreddit: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().expect("config store lock");
        let row = conn
            .query_row(
                "SELECT config FROM configs WHERE subreddit = ?1",
                params![subreddit],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_communities(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().expect("config store lock");
        let mut stmt = conn.prepare("SELECT subreddit FROM configs ORDER BY subreddit")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        let conn = self.conn.lock().expect("config store lock");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM configs", [], |row| row.get(0))?;
        Ok(count == 0)
    }

    pub fn remove(&self, subreddit: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("config store lock");
        conn.execute("DELETE FROM configs WHERE subreddit = ?1", params![subreddit])?;
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
