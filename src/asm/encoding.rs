//! Formatters which can read and write object files to and from disk.
//!
//! The [`ObjFileFormat`] trait describes an implementation of reading/writing object files.
//! This module provides an implementation of the trait:
//! - [`TextFormat`]: one decimal word per line, which is what the `asol` and `ssol` binaries exchange

use std::fmt::Write;
use std::num::ParseIntError;

use crate::ast::MAX_WORDS;

use super::ObjectFile;

/// A trait defining object file formats.
pub trait ObjFileFormat {
    /// Representation of the serialized format.
    ///
    /// For binary formats, `[u8]` should be used.
    /// For text-based formats,`str` should be used.
    type Stream: ToOwned + ?Sized;
    /// The error raised when a stream is malformed.
    type Err;

    /// Serializes into the stream format.
    fn serialize(o: &ObjectFile) -> <Self::Stream as ToOwned>::Owned;
    /// Deserializes from the stream format.
    fn deserialize(i: &Self::Stream) -> Result<ObjectFile, Self::Err>;
}

/// A text format of object file data.
///
/// Each word is written as a signed decimal integer on its own line.
/// There is no trailing newline.
///
/// Debug symbols are not kept.
///
/// # Example
/// ```
/// use sol_ensemble::asm::assemble;
/// use sol_ensemble::asm::encoding::{ObjFileFormat, TextFormat};
///
/// let obj = assemble("  add 0 1 2\n  halt\n  .fill -1").unwrap();
/// let text = TextFormat::serialize(&obj);
/// assert_eq!(text, "32770\n50331648\n-1");
///
/// let de = TextFormat::deserialize(&text).unwrap();
/// assert_eq!(de.words(), obj.words());
/// ```
pub struct TextFormat;

impl ObjFileFormat for TextFormat {
    type Stream = str;
    type Err = ObjParseErr;

    fn serialize(o: &ObjectFile) -> <Self::Stream as ToOwned>::Owned {
        let mut buf = String::new();
        for (i, word) in o.words().iter().enumerate() {
            if i != 0 {
                buf.push('\n');
            }
            // Writing to a String cannot fail.
            let _ = write!(buf, "{word}");
        }
        buf
    }

    fn deserialize(i: &Self::Stream) -> Result<ObjectFile, Self::Err> {
        let trimmed = i.trim_end();
        if trimmed.is_empty() {
            return Ok(ObjectFile::from_words(vec![]));
        }

        let words = trimmed.lines()
            .enumerate()
            .map(|(lno, line)| {
                line.trim()
                    .parse::<i32>()
                    .map_err(|err| ObjParseErr::InvalidWord { line: lno, err })
            })
            .collect::<Result<Vec<_>, _>>()?;

        match words.len() <= MAX_WORDS {
            true  => Ok(ObjectFile::from_words(words)),
            false => Err(ObjParseErr::TooLarge(words.len())),
        }
    }
}

/// Errors from reading an object file in [`TextFormat`].
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ObjParseErr {
    /// A line did not hold a 32-bit signed decimal integer.
    InvalidWord {
        /// The (zero-indexed) line number.
        line: usize,
        /// Why the line could not be parsed.
        err: ParseIntError
    },
    /// The file holds more words than fit in memory.
    TooLarge(usize),
}
impl std::fmt::Display for ObjParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjParseErr::InvalidWord { line, err } => write!(f, "invalid word on line {}: {err}", line + 1),
            ObjParseErr::TooLarge(n) => write!(f, "object file has {n} words, which does not fit in memory"),
        }
    }
}
impl std::error::Error for ObjParseErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ObjParseErr::InvalidWord { err, .. } => Some(err),
            ObjParseErr::TooLarge(_) => None,
        }
    }
}
impl crate::err::Error for ObjParseErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            ObjParseErr::InvalidWord { .. } => Some("every line of an object file is one decimal word".into()),
            ObjParseErr::TooLarge(_) => Some(format!("memory holds at most {MAX_WORDS} words").into()),
        }
    }
}
