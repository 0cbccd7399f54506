//! UTF-8 repair for runtime strings.
//!
//! Strings coming out of the runtime are usually UTF-8, but text created
//! under a legacy locale arrives in the platform's ANSI code page. Such
//! strings are reinterpreted in the configured code page and re-encoded; they
//! are never rejected and raw invalid bytes never reach the wire.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Single-byte code pages used as the fallback interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CodePage {
    #[default]
    #[serde(rename = "windows-1252")]
    Windows1252,
    #[serde(rename = "latin-1")]
    Latin1,
}

/// Windows-1252 assignments for 0x80..=0x9F. The five unassigned bytes map
/// to the C1 control at the same position, as the Windows converter does.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

impl CodePage {
    fn decode_byte(self, b: u8) -> char {
        match (self, b) {
            (CodePage::Windows1252, 0x80..=0x9F) => CP1252_HIGH[(b - 0x80) as usize],
            _ => b as char,
        }
    }

    /// Decode bytes in this code page. Every byte maps to a character.
    pub fn decode(self, bytes: &[u8]) -> String {
        bytes.iter().map(|&b| self.decode_byte(b)).collect()
    }
}

/// Return `bytes` as UTF-8, reinterpreting them in `fallback` if they are
/// not valid UTF-8.
pub fn to_utf8(bytes: &[u8], fallback: CodePage) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(e) => {
            tracing::debug!(
                "invalid UTF-8 at byte {}, reinterpreting as {:?}",
                e.valid_up_to(),
                fallback
            );
            Cow::Owned(fallback.decode(bytes))
        }
    }
}
