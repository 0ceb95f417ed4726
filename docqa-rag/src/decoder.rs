//! Document decoding: raw upload bytes to a flat text string.
//!
//! PDF text is extracted with `lopdf`, page by page in page order. Plain text
//! files are decoded with the encoding reported by [`encoding::detect`].

use std::path::Path;

use lopdf::Document;
use tracing::{debug, warn};

use crate::encoding::{self, TextEncoding};
use crate::error::{RagError, Result};

/// File formats the decoder accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Portable Document Format.
    Pdf,
    /// Plain text in any encoding the detector recognizes.
    PlainText,
}

const TEXT_EXTENSIONS: &[&str] = &["txt", "text", "md", "markdown", "csv", "log", "rst"];

/// Every PDF file starts with this header.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Bytes inspected when deciding whether an extensionless upload is text.
const SNIFF_LEN: usize = 1024;

impl DocumentFormat {
    /// Pick a format from the extension of `filename`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DecodeError`] for extensions the decoder cannot handle.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = extension(filename).unwrap_or_default();

        if extension == "pdf" {
            Ok(Self::Pdf)
        } else if TEXT_EXTENSIONS.contains(&extension.as_str()) {
            Ok(Self::PlainText)
        } else {
            Err(unsupported(filename))
        }
    }

    /// Pick a format from the content of an upload, then from its name.
    ///
    /// Bytes starting with the `%PDF-` header are a PDF whatever the name says.
    /// A name without an extension is read as plain text unless the leading
    /// bytes contain NUL, which no supported text encoding produces.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DecodeError`] when neither the bytes nor the name
    /// identify a supported format.
    pub fn detect(filename: &str, bytes: &[u8]) -> Result<Self> {
        if bytes.starts_with(PDF_MAGIC) {
            return Ok(Self::Pdf);
        }
        if extension(filename).is_some() {
            return Self::from_filename(filename);
        }
        if bytes.iter().take(SNIFF_LEN).any(|b| *b == 0) {
            return Err(unsupported(filename));
        }
        Ok(Self::PlainText)
    }
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename).extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase)
}

fn unsupported(filename: &str) -> RagError {
    RagError::DecodeError(format!("unsupported document format: '{filename}'"))
}

/// Text extracted from a document plus the encoding it was read with.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedText {
    /// The concatenated document text. May be empty.
    pub text: String,
    /// The encoding label recorded as chunk metadata.
    pub encoding: TextEncoding,
}

/// Extract all text from `bytes`, interpreting them as `format`.
///
/// A valid document without text yields an empty string rather than an error;
/// callers decide what "no usable text" means.
///
/// # Errors
///
/// Returns [`RagError::DecodeError`] if the bytes are not a valid instance of
/// `format`.
pub fn decode(bytes: &[u8], format: DocumentFormat) -> Result<DecodedText> {
    match format {
        DocumentFormat::Pdf => {
            Ok(DecodedText { text: extract_pdf_text(bytes)?, encoding: TextEncoding::Utf8 })
        }
        DocumentFormat::PlainText => {
            let encoding = encoding::detect(bytes);
            let text = encoding.decode(bytes).ok_or_else(|| {
                RagError::DecodeError(format!("bytes are not valid {}", encoding.name()))
            })?;
            let text = text.strip_prefix('\u{feff}').unwrap_or(&*text).to_string();
            Ok(DecodedText { text, encoding })
        }
    }
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let document = Document::load_mem(bytes)
        .map_err(|e| RagError::DecodeError(format!("invalid PDF: {e}")))?;

    let pages = document.get_pages();
    debug!(page_count = pages.len(), "extracting PDF text");

    let mut text = String::new();
    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(page_text) => text.push_str(&page_text),
            Err(e) => {
                warn!(page = page_number, error = %e, "skipping page without extractable text")
            }
        }
    }

    // lopdf ends every page with a newline, even a page with no text on it.
    if text.trim().is_empty() {
        text.clear();
    }
    Ok(text)
}
