//! Error interface for this crate.
//!
//! Every error raised by this crate implements [`Error`], which
//! extends [`std::error::Error`] with a source span (if the error
//! points at assembly source code) and a help message.
//!
//! This module also re-exports the error types of the other modules.

use std::borrow::Cow;
use std::ops::Range;

pub use crate::parse::lex::LexErr;
pub use crate::asm::{AsmErr, AsmErrKind, AsmErrs};
pub use crate::asm::encoding::ObjParseErr;
pub use crate::sim::SimErr;
pub use crate::sim::trace::TraceErr;

/// Unified error interface for all errors in this crate.
pub trait Error: std::error::Error {
    /// The range where this error occurs in source.
    ///
    /// If this is not known, this can be set to `None`.
    fn span(&self) -> Option<ErrSpan> {
        None
    }

    /// A clarifying message to help aid someone in how to fix the message.
    ///
    /// If there is none to add, this can be set to `None`.
    fn help(&self) -> Option<Cow<str>>;
}

/// The source span(s) an error refers to.
///
/// Most errors point at a single place in source.
/// Some (like duplicate labels) point at two.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum ErrSpan {
    /// One contiguous range.
    One(Range<usize>),
    /// Two ranges, sorted by start position.
    Two([Range<usize>; 2]),
}
impl ErrSpan {
    /// The first (earliest) range of this span.
    pub fn first(&self) -> Range<usize> {
        match self {
            ErrSpan::One(r) => r.clone(),
            ErrSpan::Two([r, _]) => r.clone(),
        }
    }

    /// Iterates over every range of this span.
    pub fn iter(&self) -> impl Iterator<Item=&Range<usize>> + '_ {
        let slice: &[Range<usize>] = match self {
            ErrSpan::One(r) => std::slice::from_ref(r),
            ErrSpan::Two(rs) => rs,
        };
        slice.iter()
    }
}
impl From<Range<usize>> for ErrSpan {
    fn from(value: Range<usize>) -> Self {
        ErrSpan::One(value)
    }
}
impl From<[Range<usize>; 2]> for ErrSpan {
    fn from(mut value: [Range<usize>; 2]) -> Self {
        value.sort_by_key(|r| r.start);
        ErrSpan::Two(value)
    }
}
