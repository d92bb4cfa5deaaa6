// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! `{{name}}` placeholder expansion for removal messages, ban text and user
//! flair.
//!
//! Substitution is a single left-to-right scan: each `{{…}}` token is looked
//! up once and replaced literally with no escaping; unknown tokens pass
//! through verbatim. Values never get re-scanned, so a value containing
//! `{{…}}` cannot trigger a second expansion.

use std::collections::HashMap;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Duration, Utc};

/// Resolved placeholder values for one submission-processing pass.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderMap {
    values: HashMap<String, String>,
}

impl PlaceholderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Add the time placeholders: `time_*` for the current instant and
    /// `created_*` for the submission, both shifted by `utc_offset` hours.
    /// `*_custom` expands with the strftime-style `custom_time_format`, or to
    /// an empty string when no format is configured.
    pub fn insert_times(
        &mut self,
        now: DateTime<Utc>,
        created: DateTime<Utc>,
        utc_offset: i64,
        custom_time_format: &str,
    ) {
        let shift = Duration::hours(utc_offset);
        for (prefix, instant) in [("time", now + shift), ("created", created + shift)] {
            self.insert(format!("{prefix}_unix"), instant.timestamp().to_string());
            self.insert(
                format!("{prefix}_iso"),
                instant.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string(),
            );
            self.insert(
                format!("{prefix}_custom"),
                format_custom(instant, custom_time_format),
            );
        }
    }

    /// Expand every known `{{name}}` token in `template`.
    pub fn expand(&self, template: &str) -> String {
        expand_template(template, &self.values)
    }
}

/// Render with a community-supplied strftime format. The format string is
/// untrusted wiki input, so parse errors yield an empty value instead of the
/// panic chrono's `Display` would raise.
fn format_custom(instant: DateTime<Utc>, format: &str) -> String {
    if format.is_empty() {
        return String::new();
    }
    let items: Vec<Item> = StrftimeItems::new(format).collect();
    if items.iter().any(|i| matches!(i, Item::Error)) {
        return String::new();
    }
    instant.format_with_items(items.into_iter()).to_string()
}

/// Single-scan substitution. Unknown tokens and stray braces are copied
/// through unchanged.
pub fn expand_template(template: &str, values: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = &after[..end];
                match values.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(name);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated token: emit the remainder as-is.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
