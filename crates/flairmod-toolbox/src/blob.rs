// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::notes::NotesBlob;
use crate::ToolboxError;

/// Inflate `base64(zlib(json))` into the per-user notes map.
pub fn decompress_blob(encoded: &str) -> Result<NotesBlob, ToolboxError> {
    if encoded.is_empty() {
        return Ok(NotesBlob::new());
    }
    let compressed = BASE64
        .decode(encoded)
        .map_err(|e| ToolboxError::Codec(format!("base64: {e}")))?;
    let mut decoder = ZlibDecoder::new(compressed.as_slice());
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .map_err(|e| ToolboxError::Codec(format!("zlib: {e}")))?;
    Ok(serde_json::from_slice(&json)?)
}

/// Deflate the notes map back into the wire encoding.
pub fn compress_blob(notes: &NotesBlob) -> Result<String, ToolboxError> {
    let json = serde_json::to_vec(notes)?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| ToolboxError::Codec(format!("zlib: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| ToolboxError::Codec(format!("zlib: {e}")))?;
    Ok(BASE64.encode(compressed))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::{Note, UserNotes};

    #[test]
    fn empty_blob_inflates_to_empty_map() {
        assert!(decompress_blob("").unwrap().is_empty());
    }

    #[test]
    fn round_trip_preserves_notes() {
        let mut blob = NotesBlob::new();
        blob.insert(
            "alice".to_string(),
            UserNotes {
                ns: vec![Note {
                    n: "[FH] rule 1".into(),
                    t: 1_700_000_000,
                    m: 0,
                    l: "l,p1".into(),
                    w: 1,
                    extra: Default::default(),
                }],
                extra: Default::default(),
            },
        );
        let encoded = compress_blob(&blob).unwrap();
        let decoded = decompress_blob(&encoded).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded["alice"].ns[0].n, "[FH] rule 1");
        assert_eq!(decoded["alice"].ns[0].l, "l,p1");
    }

    #[test]
    fn unknown_note_fields_survive_the_round_trip() {
        let raw = serde_json::json!({
            "bob": {"ns": [{"n": "old", "t": 1, "m": 0, "l": "l,x", "w": 0, "o": "other-tool"}]}
        });
        let blob: NotesBlob = serde_json::from_value(raw).unwrap();
        let decoded = decompress_blob(&compress_blob(&blob).unwrap()).unwrap();
        assert_eq!(
            decoded["bob"].ns[0].extra.get("o").and_then(|v| v.as_str()),
            Some("other-tool")
        );
    }

    #[test]
    fn garbage_base64_is_a_codec_error() {
        assert!(matches!(
            decompress_blob("!!not-base64!!"),
            Err(ToolboxError::Codec(_))
        ));
    }
}
