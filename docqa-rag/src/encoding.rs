//! Best-effort text encoding detection by trial decoding.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A text encoding the detector knows how to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextEncoding {
    /// UTF-8 without BOM handling.
    Utf8,
    /// UTF-8 with an optional leading byte order mark that is stripped.
    Utf8Sig,
    /// ISO/IEC 8859-1 under its common `latin-1` name.
    Latin1,
    /// Windows code page 1252.
    Windows1252,
    /// ISO/IEC 8859-1.
    Iso8859_1,
    /// 7-bit ASCII.
    Ascii,
}

/// Candidates in the order they are tried.
pub const CANDIDATES: [TextEncoding; 6] = [
    TextEncoding::Utf8,
    TextEncoding::Utf8Sig,
    TextEncoding::Latin1,
    TextEncoding::Windows1252,
    TextEncoding::Iso8859_1,
    TextEncoding::Ascii,
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

impl TextEncoding {
    /// The conventional label for this encoding.
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf8Sig => "utf-8-sig",
            Self::Latin1 => "latin-1",
            Self::Windows1252 => "cp1252",
            Self::Iso8859_1 => "iso-8859-1",
            Self::Ascii => "ascii",
        }
    }

    /// Decode the whole byte sequence, or `None` if any byte is invalid.
    pub fn decode(self, bytes: &[u8]) -> Option<Cow<'_, str>> {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes).ok().map(Cow::Borrowed),
            Self::Utf8Sig => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                std::str::from_utf8(body).ok().map(Cow::Borrowed)
            }
            Self::Latin1 | Self::Iso8859_1 => {
                Some(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()))
            }
            Self::Windows1252 => encoding_rs::WINDOWS_1252
                .decode_without_bom_handling_and_without_replacement(bytes),
            Self::Ascii => {
                if bytes.is_ascii() {
                    std::str::from_utf8(bytes).ok().map(Cow::Borrowed)
                } else {
                    None
                }
            }
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Detect the encoding of `bytes`.
///
/// Returns the first candidate in [`CANDIDATES`] that decodes every byte.
/// Never fails: when nothing matches, UTF-8 is assumed.
pub fn detect(bytes: &[u8]) -> TextEncoding {
    CANDIDATES
        .into_iter()
        .find(|encoding| encoding.decode(bytes).is_some())
        .unwrap_or(TextEncoding::Utf8)
}
