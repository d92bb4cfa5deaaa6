// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Community configuration model for the flair-driven action engine.
//!
//! A community configures the bot through a wiki page holding a JSON array:
//! the first element carries the `GeneralConfiguration` record, every further
//! element is one [`FlairRule`] keyed by its flair template id. Legacy YAML
//! documents are converted to the same shape by [`legacy::convert_yaml_config`].
//!
//! Everything in this crate is pure data and pure functions — no I/O — so the
//! ingest pipeline and the action processor can share it freely.
mod action;
mod ban;
mod legacy;
mod placeholders;
mod sanitize;
mod schema;

pub use action::{actions_for_rule, ActionKind};
pub use ban::{next_escalation_step, BanStep, BanTag};
pub use legacy::convert_yaml_config;
pub use placeholders::{expand_template, PlaceholderMap};
pub use sanitize::{sanitize_ban_note, sanitize_modlog_reason, truncate_chars, unescape_newlines};
pub use schema::*;
