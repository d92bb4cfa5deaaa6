// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Durable state behind the action engine: one table of cached community
//! configurations and one append-mostly queue of pending action rows.
//!
//! Both stores serialize access through a single writer lock. Statements are
//! microsecond-scale; overall throughput is gated by upstream API calls, not
//! by storage, so a coarse lock keeps the correctness story trivial.
mod actions;
mod configs;

pub use actions::{ActionStore, PendingJob};
pub use configs::ConfigStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
