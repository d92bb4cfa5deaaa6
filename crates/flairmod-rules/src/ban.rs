// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Escalating-ban step selection.
//!
//! A rule may configure `duration` as an integer ladder such as `1,3,7,14,0`.
//! The processor reads the author's prior ban lengths from the shared notes
//! history and picks the first rung strictly greater than the longest prior
//! ban; `0` is the permanent terminal rung.

use std::fmt;

/// One prior ban parsed from the notes history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanTag {
    Days(u32),
    Permanent,
}

impl BanTag {
    /// Parse the duration suffix of a `FH-Ban-…` note.
    pub fn parse(suffix: &str) -> Option<Self> {
        if suffix.eq_ignore_ascii_case("permanent") {
            return Some(BanTag::Permanent);
        }
        suffix.parse::<u32>().ok().map(BanTag::Days)
    }
}

/// The outcome of a ban-duration decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanStep {
    Days(u32),
    Permanent,
}

impl BanStep {
    /// Suffix recorded in the history note: `FH-Ban-7`, `FH-Ban-permanent`.
    pub fn note_suffix(&self) -> String {
        match self {
            BanStep::Days(d) => d.to_string(),
            BanStep::Permanent => "permanent".to_string(),
        }
    }

    /// Human phrasing for the `{{ban_duration}}` placeholder.
    pub fn human(&self) -> String {
        match self {
            BanStep::Days(1) => "banned for 1 day".to_string(),
            BanStep::Days(d) => format!("banned for {d} days"),
            BanStep::Permanent => "permanently banned".to_string(),
        }
    }
}

impl fmt::Display for BanStep {
    /// Value of the `{{ban_duration_number}}` placeholder.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BanStep::Days(d) => write!(f, "{d}"),
            BanStep::Permanent => f.write_str("permanent"),
        }
    }
}

/// Pick the next rung of the escalation ladder.
///
/// The first rung strictly greater than the longest prior ban wins; a `0`
/// rung reads as permanent and outranks every number. With no history the
/// first rung applies, and when every rung has been exhausted the last one
/// repeats.
pub fn next_escalation_step(history: &[BanTag], steps: &[u32]) -> Option<BanStep> {
    if steps.is_empty() {
        return None;
    }
    let as_step = |v: u32| {
        if v == 0 {
            BanStep::Permanent
        } else {
            BanStep::Days(v)
        }
    };

    if history.iter().any(|t| matches!(t, BanTag::Permanent)) {
        // Nothing escalates past permanent.
        return Some(BanStep::Permanent);
    }
    let prior_max = history
        .iter()
        .map(|t| match t {
            BanTag::Days(d) => *d,
            BanTag::Permanent => u32::MAX,
        })
        .max();

    let Some(max) = prior_max else {
        return Some(as_step(steps[0]));
    };

    for &step in steps {
        if step == 0 || step > max {
            return Some(as_step(step));
        }
    }
    Some(as_step(*steps.last().expect("steps is non-empty")))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
