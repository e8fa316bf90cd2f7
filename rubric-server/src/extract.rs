//! Plain-text extraction from uploaded documents.
//!
//! Dispatch is by file extension only (case-insensitive); the file content is
//! never sniffed. Every failure degrades to an empty string.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.pdf`
    Pdf,
    /// `.docx` / `.doc`, read as an Office Open XML package
    Office,
    /// `.hwp`, a compound-file container whose first stream is UTF-16 text
    LegacyContainer,
    /// `.txt`
    PlainText,
    /// Anything else
    Unsupported,
}

impl DocumentFormat {
    /// Pick the format for a path from its extension.
    pub fn from_path(path: &Path) -> Self {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return Self::Unsupported;
        };

        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" | "doc" => Self::Office,
            "hwp" => Self::LegacyContainer,
            "txt" => Self::PlainText,
            _ => Self::Unsupported,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Office => write!(f, "office"),
            Self::LegacyContainer => write!(f, "legacy-container"),
            Self::PlainText => write!(f, "plain-text"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Extract text from the file at `path`.
///
/// Never fails: unsupported, unreadable, or corrupt files yield `""`.
/// This is blocking I/O; call it from `spawn_blocking` in async code.
pub fn extract_text(path: &Path) -> String {
    let format = DocumentFormat::from_path(path);
    let result = match format {
        DocumentFormat::Pdf => extract_pdf(path),
        DocumentFormat::Office => extract_office(path),
        DocumentFormat::LegacyContainer => extract_legacy(path),
        DocumentFormat::PlainText => extract_plain(path),
        DocumentFormat::Unsupported => {
            tracing::debug!(path = %path.display(), "Unsupported document type, skipping");
            return String::new();
        }
    };

    match result {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                format = %format,
                error = %e,
                "Text extraction failed"
            );
            String::new()
        }
    }
}

fn extract_pdf(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path)?;

    // The pdf parser panics on some malformed inputs
    let extracted = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(&bytes)
    }))
    .map_err(|_| anyhow::anyhow!("pdf parser panicked"))?;

    extracted.map_err(|e| anyhow::anyhow!("{e}"))
}

/// Paragraph text of an Office Open XML document, one line per `w:p`.
fn extract_office(path: &Path) -> anyhow::Result<String> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))?;

    let mut xml = String::new();
    archive.by_name("word/document.xml")?.read_to_string(&mut xml)?;

    paragraphs_from_document_xml(&xml)
}

/// Collect the text runs (`w:t`) of each paragraph (`w:p`) in document order.
///
/// Paragraphs nested inside another (text boxes) become their own line after
/// the paragraph that contains them; runs go to the innermost open paragraph.
fn paragraphs_from_document_xml(xml: &str) -> anyhow::Result<String> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    let mut paragraphs: Vec<String> = Vec::new();
    // Indices into `paragraphs` of the currently open `w:p` elements
    let mut open: Vec<usize> = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => {
                    open.push(paragraphs.len());
                    paragraphs.push(String::new());
                }
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                // Self-closing paragraph: an empty line
                b"w:p" => paragraphs.push(String::new()),
                b"w:tab" => {
                    if let Some(&idx) = open.last() {
                        paragraphs[idx].push('\t');
                    }
                }
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"w:p" => {
                    open.pop();
                }
                b"w:t" => in_text = false,
                _ => {}
            },
            Event::Text(t) if in_text => {
                if let Some(&idx) = open.last() {
                    paragraphs[idx].push_str(&t.decode()?);
                }
            }
            Event::GeneralRef(r) if in_text => {
                if let Some(&idx) = open.last() {
                    push_entity(&mut paragraphs[idx], &r.decode()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join("\n"))
}

/// Append the character an entity reference (`amp`, `#x41;`, ...) stands for.
fn push_entity(out: &mut String, name: &str) {
    if let Some(resolved) = quick_xml::escape::resolve_predefined_entity(name) {
        out.push_str(resolved);
        return;
    }

    let code = if let Some(hex) = name.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(dec) = name.strip_prefix('#') {
        dec.parse().ok()
    } else {
        None
    };

    if let Some(c) = code.and_then(char::from_u32) {
        out.push(c);
    }
}

#[cfg(feature = "legacy-formats")]
fn extract_legacy(path: &Path) -> anyhow::Result<String> {
    let mut container = cfb::open(path)?;

    let stream_path = container
        .walk()
        .find(|entry| entry.is_stream())
        .map(|entry| entry.path().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("container has no streams"))?;

    let mut bytes = Vec::new();
    container.open_stream(&stream_path)?.read_to_end(&mut bytes)?;

    Ok(decode_utf16le(&bytes))
}

#[cfg(not(feature = "legacy-formats"))]
fn extract_legacy(path: &Path) -> anyhow::Result<String> {
    tracing::debug!(
        path = %path.display(),
        "Legacy container support not compiled in (enable legacy-formats)"
    );
    Ok(String::new())
}

/// Decode little-endian UTF-16, dropping unpaired surrogates and a trailing odd byte.
#[cfg_attr(not(feature = "legacy-formats"), allow(dead_code))]
fn decode_utf16le(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));

    char::decode_utf16(units).filter_map(Result::ok).collect()
}

/// Read a text file, dropping invalid UTF-8 sequences.
fn extract_plain(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(decode_utf8_ignoring_invalid(&bytes))
}

fn decode_utf8_ignoring_invalid(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}
