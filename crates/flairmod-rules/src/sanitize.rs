// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Text cleanup applied during legacy conversion and before mod-note writes.
//! The sanitizer always runs before truncation, and truncation counts
//! characters, not bytes.

use std::sync::OnceLock;

use regex::Regex;

fn ban_note_charset() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9\s\-_.,]").expect("static regex"))
}

fn modlog_reason_charset() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9\s\-_.,/\\]").expect("static regex"))
}

/// Truncate to at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Ban mod-note: strip everything outside `[A-Za-z0-9 \-_.,]`, trim, cap at
/// 100 characters.
pub fn sanitize_ban_note(raw: &str) -> String {
    let cleaned = ban_note_charset().replace_all(raw, "");
    truncate_chars(cleaned.trim(), 100)
}

/// Mod-log reason: strip everything outside `[A-Za-z0-9 \-_.,/\\]`, collapse
/// newlines to spaces and runs of double spaces to single, trim, cap at 250
/// characters.
pub fn sanitize_modlog_reason(raw: &str) -> String {
    let mut cleaned = modlog_reason_charset().replace_all(raw, "").into_owned();
    cleaned = cleaned.replace('\n', " ");
    while cleaned.contains("  ") {
        cleaned = cleaned.replace("  ", " ");
    }
    truncate_chars(cleaned.trim(), 250)
}

/// Replace literal `\n` escape sequences with real newlines in every string
/// value of the parsed document. Wiki editors routinely paste JSON with
/// escaped newlines inside already-quoted strings.
pub fn unescape_newlines(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) => {
            if s.contains("\\n") {
                *s = s.replace("\\n", "\n");
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                unescape_newlines(item);
            }
        }
        serde_json::Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                unescape_newlines(v);
            }
        }
        _ => {}
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ban_note_strips_and_truncates() {
        assert_eq!(sanitize_ban_note("Rule #1: <spam>!"), "Rule 1 spam");
        let long = "a".repeat(150);
        assert_eq!(sanitize_ban_note(&long).chars().count(), 100);
    }

    #[test]
    fn ban_note_truncates_after_sanitizing() {
        // 99 kept chars + stripped junk + 5 more kept chars: the cap applies
        // to the cleaned text, so chars past the junk still make it in.
        let raw = format!("{}<<<<{}", "a".repeat(99), "b".repeat(5));
        let out = sanitize_ban_note(&raw);
        assert_eq!(out.chars().count(), 100);
        assert!(out.ends_with('b'));
    }

    #[test]
    fn modlog_reason_collapses_whitespace() {
        assert_eq!(
            sanitize_modlog_reason("line one\nline   two"),
            "line one line two"
        );
    }

    #[test]
    fn modlog_reason_keeps_slashes() {
        assert_eq!(sanitize_modlog_reason("r/example \\ rule/3"), "r/example \\ rule/3");
    }

    #[test]
    fn modlog_reason_caps_at_250() {
        let long = "x".repeat(400);
        assert_eq!(sanitize_modlog_reason(&long).chars().count(), 250);
    }

    #[test]
    fn unescape_rewrites_nested_strings() {
        let mut v: serde_json::Value = serde_json::json!([
            {"GeneralConfiguration": {"header": "line1\\nline2"}},
            {"templateId": "g", "comment": {"body": "a\\nb"}}
        ]);
        unescape_newlines(&mut v);
        assert_eq!(
            v[0]["GeneralConfiguration"]["header"].as_str().unwrap(),
            "line1\nline2"
        );
        assert_eq!(v[1]["comment"]["body"].as_str().unwrap(), "a\nb");
    }
}
