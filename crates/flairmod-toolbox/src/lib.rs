// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Toolbox usernotes adapter.
//!
//! The notes live on a dedicated wiki page as a JSON document whose `blob`
//! field is `base64(zlib(json))`. The format is shared bit-for-bit with a
//! third-party moderator tool, so the codec round-trips unknown fields and
//! appends without reshaping anything it did not write. Updates are
//! read-modify-write on one page, serialized by a per-community lock.
mod blob;
mod notes;

pub use blob::{compress_blob, decompress_blob};
pub use notes::{Note, NotesBlob, ToolboxNotes, UserNotes, UsernotesDocument, BAN_HISTORY_PREFIX};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolboxError {
    #[error(transparent)]
    Platform(#[from] flairmod_platform::PlatformError),
    #[error("notes wiki page is not valid JSON: {0}")]
    Document(#[from] serde_json::Error),
    #[error("notes blob codec error: {0}")]
    Codec(String),
}
