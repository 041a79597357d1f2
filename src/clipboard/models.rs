//! clipkeep - Selection data model
//!
//! Defines the clipboard selection value type and the single-line canonical
//! representation used to address selections from the outside

use std::fmt;
use std::io::Cursor;

/// Record terminator appended after each canonical line in list output
pub const LINE_TERMINATOR: u8 = 0;

/// X11 target atom describing how selection bytes should be interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Utf8String,
    Text,
    PlainString,
    TextPlain,
    TextPlainUtf8,
    Timestamp,
    Targets,
    ImagePng,
    GnomeCopiedFiles,
    /// Any atom the clipboard owner offers that we do not know by name
    Other(String),
}

impl Target {
    /// The atom name as announced in a TARGETS listing
    pub fn as_str(&self) -> &str {
        match self {
            Target::Utf8String => "UTF8_STRING",
            Target::Text => "TEXT",
            Target::PlainString => "STRING",
            Target::TextPlain => "text/plain",
            Target::TextPlainUtf8 => "text/plain;charset=utf-8",
            Target::Timestamp => "TIMESTAMP",
            Target::Targets => "TARGETS",
            Target::ImagePng => "image/png",
            Target::GnomeCopiedFiles => "x-special/gnome-copied-files",
            Target::Other(name) => name,
        }
    }
}

impl From<&str> for Target {
    fn from(atom: &str) -> Self {
        match atom {
            "UTF8_STRING" => Target::Utf8String,
            "TEXT" => Target::Text,
            "STRING" => Target::PlainString,
            "text/plain" => Target::TextPlain,
            "text/plain;charset=utf-8" => Target::TextPlainUtf8,
            "TIMESTAMP" => Target::Timestamp,
            "TARGETS" => Target::Targets,
            "image/png" => Target::ImagePng,
            "x-special/gnome-copied-files" => Target::GnomeCopiedFiles,
            other => Target::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed clipboard payload together with its format tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub content: Vec<u8>,
    pub target: Target,
}

impl Selection {
    pub fn new(content: Vec<u8>, target: Target) -> Self {
        Self { content, target }
    }

    /// Exact content-byte equality used for deduplication, independent of
    /// the target tag
    pub fn content_eq(&self, other: &Selection) -> bool {
        self.content == other.content
    }

    /// Canonical line uniquely representing this selection for addressing.
    ///
    /// Text payloads are trimmed and escaped into one line. Image payloads
    /// cannot travel as a line, so they get a synthetic descriptor built
    /// from the target, the pixel dimensions and a content hash.
    pub fn line(&self) -> Vec<u8> {
        match self.target {
            Target::ImagePng => self.image_line(),
            _ => self.text_line(),
        }
    }

    /// Canonical line with the record terminator appended
    pub fn line_terminated(&self) -> Vec<u8> {
        let mut line = self.line();
        line.push(LINE_TERMINATOR);
        line
    }

    fn text_line(&self) -> Vec<u8> {
        let trimmed = self.content.trim_ascii();
        let mut out = Vec::with_capacity(trimmed.len());
        for &byte in trimmed {
            match byte {
                b'\\' => out.extend_from_slice(b"\\\\"),
                b'\n' => out.extend_from_slice(b"\\n"),
                b'\r' => out.extend_from_slice(b"\\r"),
                b'\t' => out.extend_from_slice(b"\\t"),
                0 => out.extend_from_slice(b"\\0"),
                _ => out.push(byte),
            }
        }
        out
    }

    fn image_line(&self) -> Vec<u8> {
        let dimensions = image::ImageReader::new(Cursor::new(&self.content))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok());
        match dimensions {
            Some((width, height)) => {
                let hash = blake3::hash(&self.content).to_hex();
                format!("{} {}x{} {}", self.target, width, height, hash).into_bytes()
            }
            None => b"Failed to decode image".to_vec(),
        }
    }
}

/// Strip at most one trailing record terminator or newline from a
/// client-supplied line. Empty input addresses nothing.
pub fn strip_terminator(line: &[u8]) -> Option<&[u8]> {
    match line.split_last() {
        None => None,
        Some((&last, rest)) if last == LINE_TERMINATOR || last == b'\n' => Some(rest),
        Some(_) => Some(line),
    }
}
