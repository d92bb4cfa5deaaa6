// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use tracing::warn;

use flairmod_rules::ActionKind;

use crate::StoreError;

/// One schedulable unit: all pending rows that share a submission id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingJob {
    pub submission_id: String,
    pub mod_name: String,
    pub flair_guid: String,
}

/// Durable queue of per-submission action rows.
///
/// Rows are appended when a flair assignment is classified and flip
/// `completed` 0→1 as the processor works through them; fully-completed
/// groups are garbage-collected. Every mutator is idempotent so the
/// at-least-once processor can retry freely.
pub struct ActionStore {
    conn: Mutex<Connection>,
}

impl ActionStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    /// Transient store for tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS actions (
                 submission_id TEXT,
                 action        TEXT,
                 completed     INTEGER,
                 mod_name      TEXT,
                 flair_guid    TEXT)",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Enqueue one row per action for a classified flair assignment.
    ///
    /// A kind that already has a pending row for this submission is skipped,
    /// which keeps the call idempotent under classifier retries.
    pub fn insert_batch(
        &self,
        submission_id: &str,
        actions: &[ActionKind],
        mod_name: &str,
        flair_guid: &str,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().expect("action store lock");
        let tx = conn.transaction()?;
        for action in actions {
            tx.execute(
                "INSERT INTO actions (submission_id, action, completed, mod_name, flair_guid)
                 SELECT ?1, ?2, 0, ?3, ?4
                 WHERE NOT EXISTS (
                     SELECT 1 FROM actions
                     WHERE submission_id = ?1 AND action = ?2 AND completed = 0)",
                params![submission_id, action.as_str(), mod_name, flair_guid],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Distinct submissions that still have pending rows, with the acting
    /// moderator and the flair that triggered them.
    pub fn pending_jobs(&self) -> Result<Vec<PendingJob>, StoreError> {
        let conn = self.conn.lock().expect("action store lock");
        let mut stmt = conn.prepare(
            "SELECT DISTINCT submission_id, mod_name, flair_guid
             FROM actions WHERE completed = 0",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PendingJob {
                    submission_id: row.get(0)?,
                    mod_name: row.get(1)?,
                    flair_guid: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Pending kinds for one submission. Rows whose stored name no longer
    /// parses are skipped with a warning; they cannot be executed anyway.
    pub fn pending_actions(&self, submission_id: &str) -> Result<Vec<ActionKind>, StoreError> {
        let conn = self.conn.lock().expect("action store lock");
        let mut stmt = conn.prepare(
            "SELECT action FROM actions WHERE submission_id = ?1 AND completed = 0",
        )?;
        let names = stmt
            .query_map(params![submission_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names
            .into_iter()
            .filter_map(|name| match ActionKind::from_str(&name) {
                Ok(kind) => Some(kind),
                Err(err) => {
                    warn!(submission_id, %err, "dropping unreadable action row");
                    None
                }
            })
            .collect())
    }

    pub fn mark_completed(
        &self,
        submission_id: &str,
        action: ActionKind,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("action store lock");
        conn.execute(
            "UPDATE actions SET completed = 1 WHERE submission_id = ?1 AND action = ?2",
            params![submission_id, action.as_str()],
        )?;
        Ok(())
    }

    /// Force-complete every row of a job. Used when the job is escalated
    /// after exhausting its retries, and when the target vanished upstream.
    pub fn mark_all_completed(&self, submission_id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("action store lock");
        conn.execute(
            "UPDATE actions SET completed = 1 WHERE submission_id = ?1",
            params![submission_id],
        )?;
        Ok(())
    }

    pub fn is_completed(
        &self,
        submission_id: &str,
        action: ActionKind,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().expect("action store lock");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM actions
             WHERE submission_id = ?1 AND action = ?2 AND completed = 1",
            params![submission_id, action.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// A job is done when it has at least one row and none of them pending.
    pub fn job_done(&self, submission_id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().expect("action store lock");
        let (total, pending): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), SUM(CASE WHEN completed = 0 THEN 1 ELSE 0 END)
             FROM actions WHERE submission_id = ?1",
            params![submission_id],
            |row| Ok((row.get(0)?, row.get::<_, Option<i64>>(1)?.unwrap_or(0))),
        )?;
        Ok(total > 0 && pending == 0)
    }

    /// Delete the completed rows of a job.
    pub fn gc_completed(&self, submission_id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("action store lock");
        conn.execute(
            "DELETE FROM actions WHERE submission_id = ?1 AND completed = 1",
            params![submission_id],
        )?;
        Ok(())
    }

    /// Total pending rows across all jobs, for the status view.
    pub fn pending_count(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock().expect("action store lock");
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM actions WHERE completed = 0", [], |row| {
                row.get(0)
            })?;
        Ok(count as u64)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
