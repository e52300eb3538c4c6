//! Assembling SOL source code into object files.
//!
//! This module is used to convert source code into object files
//! that can be executed by the simulator.
//!
//! The assembler module notably consists of:
//! - [`assemble`] and [`assemble_debug`]: The main functions which assemble source code into an object file.
//! - [`SymbolTable`]: a struct holding the symbol table, which stores location information for labels after the first assembler pass
//! - [`ObjectFile`]: a struct holding the object file, which can be loaded into the simulator and executed
//!
//! Assembly happens in two passes:
//! 1. The first pass ([`SymbolTable::new`]) assigns every statement an address,
//!    records every label, and checks program-wide limits (program length, label count,
//!    and the balance of `push`/`pop`).
//! 2. The second pass resolves labels and encodes every statement into a machine word.
//!
//! Every error found in a pass is reported (see [`AsmErrs`]).

pub mod encoding;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ops::Range;

use crate::ast::asm::{AsmInstr, Directive, Stmt, StmtKind};
use crate::ast::sim::{Offset15, SimInstr};
use crate::ast::{ImmOrLabel, Label, OffsetNewErr, MAX_WORDS, STACK_CAPACITY};
use crate::err::{Error as _, ErrSpan, LexErr};

/// Assembles SOL source code into an object file.
///
/// This function assembles the source *without* including debug symbols
/// in the object file.
/// See [`SymbolTable`] for more details about debug symbols.
///
/// # Example
/// ```
/// use sol_ensemble::asm::assemble;
///
/// let src = "
/// LABEL halt
/// ";
/// let obj_file = assemble(src);
/// assert!(obj_file.is_ok());
///
/// // Symbol table doesn't exist in object file:
/// let obj_file = obj_file.unwrap();
/// assert!(obj_file.symbol_table().is_none());
/// ```
pub fn assemble(src: &str) -> Result<ObjectFile, AsmErrs> {
    assemble_inner(src, false)
}
/// Assembles SOL source code into an object file,
/// keeping the symbol table and source as debug symbols.
///
/// # Example
/// ```
/// use sol_ensemble::asm::assemble_debug;
///
/// let src = "
/// LABEL halt
/// ";
/// let obj_file = assemble_debug(src);
/// assert!(obj_file.is_ok());
///
/// // Symbol table does exist in object file:
/// let obj_file = obj_file.unwrap();
/// assert!(obj_file.symbol_table().is_some());
/// ```
pub fn assemble_debug(src: &str) -> Result<ObjectFile, AsmErrs> {
    assemble_inner(src, true)
}
fn assemble_inner(src: &str, debug: bool) -> Result<ObjectFile, AsmErrs> {
    let (ast, mut errs) = crate::parse::parse_lossy(src);

    // Lines with parse errors are still in the AST, so pass 1 reports
    // label and stack errors on them alongside the parse errors.
    let sym = match SymbolTable::new(&ast, debug.then_some(src)) {
        Ok(sym) if errs.is_empty() => sym,
        Ok(_) => return Err(AsmErrs::from(errs)),
        Err(e) => {
            errs.extend(e);
            return Err(AsmErrs::from(errs));
        }
    };

    ObjectFile::new(ast, sym, debug)
}

/// Kinds of errors that can occur from assembling given assembly code.
///
/// See [`AsmErr`] for this error type with span information included.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AsmErrKind {
    /// An operand could not be tokenized (parsing).
    Lex(LexErr),
    /// Label does not start with a letter, or has characters which are not letters or digits (parsing).
    InvalidLabel,
    /// Line has a label but no mnemonic (parsing).
    MissingMnemonic,
    /// Mnemonic is not an instruction or directive (parsing).
    UnknownMnemonic,
    /// Instruction received fewer operands than it requires (parsing).
    MissingOperands {
        /// The mnemonic of the instruction or directive.
        mnemonic: &'static str,
        /// The number of operands required.
        expected: usize,
        /// The number of operands found.
        found: usize,
    },
    /// A register operand was not an integer (parsing).
    ExpectedReg,
    /// A register operand was not between 0 and 15 (parsing).
    RegOutOfRange,
    /// An address operand was not an integer or a label (parsing).
    ExpectedAddr,
    /// An address operand holds a symbol with non-letter characters (parsing).
    InvalidAddrSymbol,
    /// There were multiple labels of the same name (pass 1).
    DuplicateLabel,
    /// There were more labels than fit in memory (pass 1).
    TooManyLabels,
    /// There were more statements than fit in memory (pass 1).
    ProgramTooLarge,
    /// A `push` would exceed the stack's capacity (pass 1).
    StackOverflow,
    /// A `pop` was executed on an empty stack (pass 1).
    StackUnderflow,
    /// Label did not have an assigned address (pass 2).
    CouldNotFindLabel,
    /// An address or offset did not fit in its field (pass 2).
    OffsetNewErr(OffsetNewErr),
    /// A branch jumps outside of memory (pass 2).
    BranchOutOfRange,
}
impl std::fmt::Display for AsmErrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lex(e)             => e.fmt(f),
            Self::InvalidLabel       => f.write_str("invalid label"),
            Self::MissingMnemonic    => f.write_str("label is missing an instruction"),
            Self::UnknownMnemonic    => f.write_str("unrecognized instruction"),
            Self::MissingOperands { mnemonic, expected, found } => {
                write!(f, "{mnemonic} requires {expected} operand(s), but found {found}")
            },
            Self::ExpectedReg        => f.write_str("expected register"),
            Self::RegOutOfRange      => f.write_str("register out of range"),
            Self::ExpectedAddr       => f.write_str("expected integer or label"),
            Self::InvalidAddrSymbol  => f.write_str("invalid symbol in address operand"),
            Self::DuplicateLabel     => f.write_str("label was defined multiple times"),
            Self::TooManyLabels      => f.write_str("too many labels"),
            Self::ProgramTooLarge    => f.write_str("program is too large"),
            Self::StackOverflow      => f.write_str("push exceeds stack capacity"),
            Self::StackUnderflow     => f.write_str("pop from empty stack"),
            Self::CouldNotFindLabel  => f.write_str("label could not be found"),
            Self::OffsetNewErr(e)    => e.fmt(f),
            Self::BranchOutOfRange   => f.write_str("branch target is outside of memory"),
        }
    }
}

/// Error from assembling given assembly code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AsmErr {
    /// The value with a span.
    pub kind: AsmErrKind,
    /// The span in the source associated with this value.
    pub span: ErrSpan
}
impl AsmErr {
    /// Creates a new [`AsmErr`].
    pub fn new<E: Into<ErrSpan>>(kind: AsmErrKind, span: E) -> Self {
        AsmErr { kind, span: span.into() }
    }
}
impl std::fmt::Display for AsmErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}
impl std::error::Error for AsmErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            AsmErrKind::Lex(e) => Some(e),
            AsmErrKind::OffsetNewErr(e) => Some(e),
            _ => None
        }
    }
}
impl crate::err::Error for AsmErr {
    fn span(&self) -> Option<crate::err::ErrSpan> {
        Some(self.span.clone())
    }

    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match &self.kind {
            AsmErrKind::Lex(e)            => e.help(),
            AsmErrKind::InvalidLabel      => Some("labels start with a letter and only contain letters and digits".into()),
            AsmErrKind::MissingMnemonic   => Some("indent this line if it is not meant to have a label".into()),
            AsmErrKind::UnknownMnemonic   => Some("instructions are lowercase (e.g., add, lw, beq), and the only directive is .fill".into()),
            AsmErrKind::MissingOperands { .. } => None,
            AsmErrKind::ExpectedReg       => Some("registers are written as a number from 0 to 15".into()),
            AsmErrKind::RegOutOfRange     => Some("there are only 16 registers, numbered 0 to 15".into()),
            AsmErrKind::ExpectedAddr      => Some("this operand should be an integer or a label".into()),
            AsmErrKind::InvalidAddrSymbol => Some("labels used as operands may only contain letters".into()),
            AsmErrKind::DuplicateLabel    => Some("labels must be unique within a file, try renaming one of the labels".into()),
            AsmErrKind::TooManyLabels     => Some(format!("a program can define at most {MAX_WORDS} labels").into()),
            AsmErrKind::ProgramTooLarge   => Some(format!("a program can hold at most {MAX_WORDS} instructions").into()),
            AsmErrKind::StackOverflow     => Some(format!("the stack holds at most {STACK_CAPACITY} words; add a pop before this push").into()),
            AsmErrKind::StackUnderflow    => Some("every pop must have a matching push before it".into()),
            AsmErrKind::CouldNotFindLabel => Some("try adding this label before an instruction or directive".into()),
            AsmErrKind::OffsetNewErr(e)   => e.help(),
            AsmErrKind::BranchOutOfRange  => Some(format!("branch targets must be between 0 and {}", MAX_WORDS - 1).into()),
        }
    }
}

/// Every error found while assembling a program, ordered by position in source.
///
/// This is never empty.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AsmErrs(Vec<AsmErr>);
impl AsmErrs {
    /// Gets the first error (by position in source).
    pub fn first(&self) -> Option<&AsmErr> {
        self.0.first()
    }
    /// Gets an iterator over every error.
    pub fn iter(&self) -> std::slice::Iter<'_, AsmErr> {
        self.0.iter()
    }
    /// The number of errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }
    /// Whether there are no errors.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl From<Vec<AsmErr>> for AsmErrs {
    fn from(mut value: Vec<AsmErr>) -> Self {
        value.sort_by_key(|e| e.span.first().start);
        Self(value)
    }
}
impl From<AsmErr> for AsmErrs {
    fn from(value: AsmErr) -> Self {
        Self(vec![value])
    }
}
impl IntoIterator for AsmErrs {
    type Item = AsmErr;
    type IntoIter = std::vec::IntoIter<AsmErr>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
impl<'a> IntoIterator for &'a AsmErrs {
    type Item = &'a AsmErr;
    type IntoIter = std::slice::Iter<'a, AsmErr>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
impl std::fmt::Display for AsmErrs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.0 {
            [] => f.write_str("assembly failed"),
            [e] => e.fmt(f),
            [e, rest @ ..] => write!(f, "{e} (and {} more error(s))", rest.len()),
        }
    }
}
impl std::error::Error for AsmErrs {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.first().map(|e| e as _)
    }
}

/// Struct holding the source string and contains helpers
/// to index lines and to query position information from a source string.
#[derive(PartialEq, Eq, Clone)]
pub struct SourceInfo {
    /// The source code.
    src: String,
    /// The index of each new line in source code.
    nl_indices: Vec<usize>
}
impl std::fmt::Debug for SourceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceInfo")
            .field("nl_indices", &self.nl_indices)
            .finish_non_exhaustive()
    }
}
impl SourceInfo {
    /// Computes the source info from a given string.
    pub fn new(src: &str) -> Self {
        Self::from_string(src.to_string())
    }
    fn from_string(src: String) -> Self {
        let nl_indices = src
            .match_indices('\n')
            .map(|(i, _)| i)
            .collect();

        Self { src, nl_indices }
    }

    /// Returns the entire source.
    pub fn source(&self) -> &str {
        &self.src
    }

    /// Counts the number of lines in the source string.
    pub fn count_lines(&self) -> usize {
        // The first line, plus every line after (delimited by a new line)
        self.nl_indices.len() + 1
    }

    /// Gets the character range for the provided line, excluding the newline character.
    ///
    /// This returns None if line is not in the interval `[0, number of lines)`.
    fn raw_line_span(&self, line: usize) -> Option<Range<usize>> {
        if line >= self.count_lines() {
            return None;
        }

        let start = match line {
            0 => 0,
            _ => self.nl_indices[line - 1] + 1
        };
        let end = self.nl_indices.get(line).copied().unwrap_or(self.src.len());

        Some(start..end)
    }

    /// Gets the character range for the provided line, excluding any whitespace.
    ///
    /// This returns None if line is not in the interval `[0, number of lines)`.
    pub fn line_span(&self, line: usize) -> Option<Range<usize>> {
        let Range { mut start, mut end } = self.raw_line_span(line)?;

        // shift line span by trim
        let line = &self.src[start..end];
        let end_trimmed = line.trim_end();
        end -= line.len() - end_trimmed.len();

        let line = end_trimmed;
        start += line.len() - line.trim_start().len();

        Some(start..end)
    }

    /// Reads a line from source.
    ///
    /// This returns None if line is not in the interval `[0, number of lines)`.
    pub fn read_line(&self, line: usize) -> Option<&str> {
        self.line_span(line).map(|r| &self.src[r])
    }

    /// Gets the line number of the current position.
    fn get_line(&self, index: usize) -> usize {
        self.nl_indices.partition_point(|&nl| nl < index)
    }

    /// Calculates the line and character number for a given character index.
    ///
    /// Both numbers are zero-indexed.
    ///
    /// # Example
    /// ```
    /// use sol_ensemble::asm::SourceInfo;
    ///
    /// let info = SourceInfo::new("A halt\n  add 0 1 2");
    /// assert_eq!(info.get_pos_pair(0), (0, 0));
    /// assert_eq!(info.get_pos_pair(9), (1, 2));
    /// ```
    pub fn get_pos_pair(&self, index: usize) -> (usize, usize) {
        let lno = self.get_line(index);
        let lstart = self.raw_line_span(lno).map_or(0, |r| r.start);
        (lno, index.saturating_sub(lstart))
    }
}
impl From<&'_ str> for SourceInfo {
    fn from(value: &'_ str) -> Self {
        Self::new(value)
    }
}
impl From<String> for SourceInfo {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
struct SymbolData {
    addr: u32,
    src_start: usize,
}
impl SymbolData {
    /// Calculates the source range of this symbol, given the name of the label.
    fn span(&self, label: &str) -> Range<usize> {
        self.src_start .. (self.src_start + label.len())
    }
}

/// Debug symbols.
#[derive(PartialEq, Eq, Debug, Clone)]
struct DebugSymbols {
    /// The source line of each statement, indexed by address.
    ///
    /// Every statement is on its own line, so this is strictly increasing.
    lines: Vec<usize>,

    /// Information about the source.
    src_info: SourceInfo
}

/// The symbol table created in the first assembler pass
/// that encodes source code mappings to memory addresses in the object file.
///
/// The symbol table consists of:
/// - A mapping from source code labels to memory addresses.
/// - A mapping from source code line numbers to memory addresses (if debug symbols are enabled).
/// - The source text (if debug symbols are enabled).
///
/// | from ↓, to →   | label                              | memory address                | source line/span                  |
/// |----------------|------------------------------------|-------------------------------|-----------------------------------|
/// | label          | -                                  | [`SymbolTable::lookup_label`] | [`SymbolTable::get_label_source`] |
/// | memory address | [`SymbolTable::rev_lookup_label`]  | -                             | [`SymbolTable::rev_lookup_line`]  |
/// | source line    | none                               | [`SymbolTable::lookup_line`]  | -                                 |
///
/// # Debug symbols
///
/// Without debug symbols, the symbol table is only used to translate labels
/// to addresses during assembly and is dropped afterwards.
///
/// With debug symbols ([`assemble_debug`]), the symbol table persists in the resultant [`ObjectFile`]
/// along with the line mapping and the source text.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct SymbolTable {
    /// A mapping from label to address and span of the label.
    label_map: HashMap<String, SymbolData>,

    /// Debug symbols. If None, there were no debug symbols provided.
    debug_symbols: Option<DebugSymbols>,
}

impl SymbolTable {
    /// Creates a new symbol table.
    ///
    /// This performs the first assembler pass, calculating the memory address of
    /// labels at each provided statement, and checking:
    /// - every label is unique,
    /// - the program and its labels fit in memory,
    /// - no `pop` occurs on an empty stack and no `push` occurs on a full stack.
    ///
    /// If a `src` argument is provided, debug symbols are also computed for the symbol table.
    ///
    /// ## Example
    /// ```
    /// use sol_ensemble::parse::parse_ast;
    /// use sol_ensemble::asm::SymbolTable;
    ///
    /// let src = "  add 0 1 2\nLABEL halt";
    /// let ast = parse_ast(src).unwrap();
    ///
    /// // without debug symbols
    /// let sym = SymbolTable::new(&ast, None).unwrap();
    /// assert_eq!(sym.lookup_label("LABEL"), Some(1));
    /// assert_eq!(sym.lookup_line(1), None);
    ///
    /// // with debug symbols
    /// let sym = SymbolTable::new(&ast, Some(src)).unwrap();
    /// assert_eq!(sym.lookup_label("LABEL"), Some(1));
    /// assert_eq!(sym.lookup_line(1), Some(1));
    /// ```
    pub fn new(stmts: &[Stmt], src: Option<&str>) -> Result<Self, AsmErrs> {
        let mut errs = vec![];
        let mut label_map: HashMap<String, SymbolData> = HashMap::new();
        let mut debug_sym = src.map(|s| (Vec::with_capacity(stmts.len()), SourceInfo::new(s)));
        let mut depth = 0;

        if let Some(stmt) = stmts.get(MAX_WORDS) {
            errs.push(AsmErr::new(AsmErrKind::ProgramTooLarge, stmt.span.clone()));
        }

        for (addr, stmt) in stmts.iter().enumerate() {
            let addr = addr as u32;

            if let Some(label) = &stmt.label {
                if let Err(e) = add_label(&mut label_map, label, addr) {
                    errs.push(e);
                }
            }

            match &stmt.nucleus {
                StmtKind::Instr(AsmInstr::PUSH(_)) if depth >= STACK_CAPACITY => {
                    errs.push(AsmErr::new(AsmErrKind::StackOverflow, stmt.span.clone()));
                },
                StmtKind::Instr(AsmInstr::PUSH(_)) => depth += 1,
                StmtKind::Instr(AsmInstr::POP(_)) if depth == 0 => {
                    errs.push(AsmErr::new(AsmErrKind::StackUnderflow, stmt.span.clone()));
                },
                StmtKind::Instr(AsmInstr::POP(_)) => depth -= 1,
                _ => {}
            }

            if let Some((lines, s)) = &mut debug_sym {
                lines.push(s.get_line(stmt.span.start));
            }
        }

        if label_map.len() > MAX_WORDS {
            let span = label_map.values()
                .max_by_key(|data| data.addr)
                .map_or(0..0, |data| data.src_start..data.src_start);
            errs.push(AsmErr::new(AsmErrKind::TooManyLabels, span));
        }

        if !errs.is_empty() {
            return Err(AsmErrs::from(errs));
        }

        tracing::debug!(labels = label_map.len(), words = stmts.len(), "first pass complete");
        let debug_symbols = debug_sym.map(|(lines, src_info)| DebugSymbols { lines, src_info });
        Ok(SymbolTable { label_map, debug_symbols })
    }

    /// Gets the memory address of a given label (if it exists).
    ///
    /// Labels are case-sensitive.
    ///
    /// ## Example
    /// ```
    /// use sol_ensemble::parse::parse_ast;
    /// use sol_ensemble::asm::SymbolTable;
    ///
    /// let src = "
    /// LOOP  add 1 2 1
    ///       beq 0 0 LOOP
    /// LOOPB add 1 2 1
    ///       beq 0 0 LOOPB
    /// ";
    /// let ast = parse_ast(src).unwrap();
    ///
    /// let sym = SymbolTable::new(&ast, None).unwrap();
    /// assert_eq!(sym.lookup_label("LOOP"), Some(0));
    /// assert_eq!(sym.lookup_label("LOOPB"), Some(2));
    /// assert_eq!(sym.lookup_label("loop"), None);
    /// ```
    pub fn lookup_label(&self, label: &str) -> Option<u32> {
        self.label_map.get(label).map(|sym_data| sym_data.addr)
    }

    /// Gets the label at a given memory address (if it exists).
    ///
    /// ## Example
    /// ```
    /// use sol_ensemble::parse::parse_ast;
    /// use sol_ensemble::asm::SymbolTable;
    ///
    /// let src = "
    /// LOOP  add 1 2 1
    ///       beq 0 0 LOOP
    /// LOOPB add 1 2 1
    ///       beq 0 0 LOOPB
    /// ";
    /// let ast = parse_ast(src).unwrap();
    ///
    /// let sym = SymbolTable::new(&ast, None).unwrap();
    /// assert_eq!(sym.rev_lookup_label(0), Some("LOOP"));
    /// assert_eq!(sym.rev_lookup_label(2), Some("LOOPB"));
    /// assert_eq!(sym.rev_lookup_label(1), None);
    /// ```
    pub fn rev_lookup_label(&self, addr: u32) -> Option<&str> {
        let (label, _) = self.label_map.iter()
            .find(|&(_, sym_data)| sym_data.addr == addr)?;

        Some(label)
    }

    /// Gets the source span of a given label (if it exists).
    pub fn get_label_source(&self, label: &str) -> Option<Range<usize>> {
        self.label_map.get(label)
            .map(|data| data.span(label))
    }

    /// Gets the address of a given source line.
    ///
    /// If debug symbols are not enabled, this unconditionally returns `None`.
    pub fn lookup_line(&self, line: usize) -> Option<u32> {
        let lines = &self.debug_symbols.as_ref()?.lines;
        lines.binary_search(&line)
            .ok()
            .map(|addr| addr as u32)
    }

    /// Gets the source line of a given memory address (if it exists).
    ///
    /// The result can be converted into a source span (range of characters encompassed by the instruction)
    /// using [`SymbolTable::source_info`] and [`SourceInfo::line_span`].
    ///
    /// If debug symbols are not enabled, this unconditionally returns `None`.
    pub fn rev_lookup_line(&self, addr: u32) -> Option<usize> {
        let lines = &self.debug_symbols.as_ref()?.lines;
        lines.get(usize::try_from(addr).ok()?).copied()
    }

    /// Reads the source info from this symbol table (if debug symbols are enabled).
    pub fn source_info(&self) -> Option<&SourceInfo> {
        self.debug_symbols.as_ref().map(|ds| &ds.src_info)
    }

    /// Gets an iterable of the mapping from labels to addresses.
    pub fn label_iter(&self) -> impl Iterator<Item=(&str, u32)> + '_ {
        self.label_map.iter()
            .map(|(label, sym_data)| (&**label, sym_data.addr))
    }
}

fn add_label(labels: &mut HashMap<String, SymbolData>, label: &Label, addr: u32) -> Result<(), AsmErr> {
    match labels.entry(label.name.clone()) {
        Entry::Occupied(e) => {
            let span1 = e.get().span(e.key());
            let span2 = label.span();
            Err(AsmErr::new(AsmErrKind::DuplicateLabel, [span1, span2]))
        },
        Entry::Vacant(e) => {
            e.insert(SymbolData { addr, src_start: label.span().start });
            Ok(())
        }
    }
}

fn find_label(label: &Label, sym: &SymbolTable) -> Result<u32, AsmErr> {
    sym.lookup_label(&label.name)
        .ok_or_else(|| AsmErr::new(AsmErrKind::CouldNotFindLabel, label.span()))
}

/// Resolves an absolute address operand (of `lw` and `sw`).
///
/// Labels become their address. Integers are kept as-is.
fn resolve_addr(operand: ImmOrLabel, span: &Range<usize>, sym: &SymbolTable) -> Result<Offset15, AsmErr> {
    let (value, span) = match operand {
        ImmOrLabel::Imm(n) => (n, span.clone()),
        ImmOrLabel::Label(label) => (find_label(&label, sym)? as i32, label.span()),
    };

    Offset15::new(value)
        .map_err(|e| AsmErr::new(AsmErrKind::OffsetNewErr(e), span))
}

/// Resolves a PC-relative operand (of `beq`, `jmae`, `jmnae` and `jne`).
///
/// A label at `target` becomes `target - addr - 1`. Integers are already offsets.
/// The resulting target must be in memory.
fn resolve_pc_offset(operand: ImmOrLabel, addr: u32, span: &Range<usize>, sym: &SymbolTable) -> Result<Offset15, AsmErr> {
    let (off, span) = match operand {
        ImmOrLabel::Imm(n) => (i64::from(n), span.clone()),
        ImmOrLabel::Label(label) => {
            let target = find_label(&label, sym)?;
            (i64::from(target) - i64::from(addr) - 1, label.span())
        },
    };

    let off32 = i32::try_from(off)
        .map_err(|_| AsmErr::new(AsmErrKind::OffsetNewErr(OffsetNewErr { bits: 15 }), span.clone()))?;
    let off15 = Offset15::new(off32)
        .map_err(|e| AsmErr::new(AsmErrKind::OffsetNewErr(e), span.clone()))?;

    let target = i64::from(addr) + off + 1;
    match (0..MAX_WORDS as i64).contains(&target) {
        true  => Ok(off15),
        false => Err(AsmErr::new(AsmErrKind::BranchOutOfRange, span)),
    }
}

impl AsmInstr {
    /// Converts an ASM instruction into a simulator instruction ([`SimInstr`])
    /// by resolving labels into addresses and offsets.
    ///
    /// Parameters:
    /// - `addr`: The address of this instruction
    /// - `span`: The span of this instruction, used for errors in integer operands
    /// - `sym`: The symbol table
    pub fn into_sim_instr(self, addr: u32, span: &Range<usize>, sym: &SymbolTable) -> Result<SimInstr, AsmErr> {
        let opcode = self.opcode();
        let off = |op| match opcode.is_pc_relative() {
            true  => resolve_pc_offset(op, addr, span, sym),
            false => resolve_addr(op, span, sym),
        };

        match self {
            AsmInstr::ADD(a, b, c)     => Ok(SimInstr::ADD(a, b, c)),
            AsmInstr::NAND(a, b, c)    => Ok(SimInstr::NAND(a, b, c)),
            AsmInstr::LW(a, b, op)     => Ok(SimInstr::LW(a, b, off(op)?)),
            AsmInstr::SW(a, b, op)     => Ok(SimInstr::SW(a, b, off(op)?)),
            AsmInstr::BEQ(a, b, op)    => Ok(SimInstr::BEQ(a, b, off(op)?)),
            AsmInstr::JARL(a, b)       => Ok(SimInstr::JARL(a, b)),
            AsmInstr::HALT             => Ok(SimInstr::HALT),
            AsmInstr::MUL(a, b, c)     => Ok(SimInstr::MUL(a, b, c)),
            AsmInstr::DIV(a, b, c)     => Ok(SimInstr::DIV(a, b, c)),
            AsmInstr::IMUL(a, b, c)    => Ok(SimInstr::IMUL(a, b, c)),
            AsmInstr::XIDIV(a, b, c)   => Ok(SimInstr::XIDIV(a, b, c)),
            AsmInstr::AND(a, b, c)     => Ok(SimInstr::AND(a, b, c)),
            AsmInstr::XOR(a, b, c)     => Ok(SimInstr::XOR(a, b, c)),
            AsmInstr::CMPGE(a, b, c)   => Ok(SimInstr::CMPGE(a, b, c)),
            AsmInstr::JMAE(a, b, op)   => Ok(SimInstr::JMAE(a, b, off(op)?)),
            AsmInstr::JMNAE(a, b, op)  => Ok(SimInstr::JMNAE(a, b, off(op)?)),
            AsmInstr::BSR(a, b)        => Ok(SimInstr::BSR(a, b)),
            AsmInstr::BSF(a, b)        => Ok(SimInstr::BSF(a, b)),
            AsmInstr::JNE(op)          => Ok(SimInstr::JNE(off(op)?)),
            AsmInstr::POP(r)           => Ok(SimInstr::POP(r)),
            AsmInstr::PUSH(r)          => Ok(SimInstr::PUSH(r)),
        }
    }
}
impl Directive {
    /// Converts a directive into the word it occupies in memory.
    fn into_word(self, sym: &SymbolTable) -> Result<i32, AsmErr> {
        match self {
            Directive::Fill(ImmOrLabel::Imm(n)) => Ok(n),
            Directive::Fill(ImmOrLabel::Label(label)) => find_label(&label, sym).map(|addr| addr as i32),
        }
    }
}

/// An object file.
///
/// This is the final product after assembly source code is fully assembled.
/// This can be loaded in the simulator to run the assembled code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ObjectFile {
    /// The program's words, starting at address 0.
    words: Vec<i32>,

    /// Debug symbols.
    sym: Option<SymbolTable>
}
impl ObjectFile {
    /// Creates an object file out of raw machine words, with no debug symbols.
    pub fn from_words(words: Vec<i32>) -> Self {
        ObjectFile { words, sym: None }
    }

    /// Creates a new object file from an assembly AST and a symbol table.
    ///
    /// This is the second assembler pass.
    /// If any statement fails to resolve, no words are kept.
    fn new(ast: Vec<Stmt>, sym: SymbolTable, debug: bool) -> Result<Self, AsmErrs> {
        let mut words = Vec::with_capacity(ast.len());
        let mut errs = vec![];

        for (addr, stmt) in ast.into_iter().enumerate() {
            let word = match stmt.nucleus {
                StmtKind::Instr(instr) => instr
                    .into_sim_instr(addr as u32, &stmt.span, &sym)
                    .map(|si| si.encode()),
                StmtKind::Directive(directive) => directive.into_word(&sym),
            };

            match word {
                Ok(w) => words.push(w),
                Err(e) => errs.push(e),
            }
        }

        if !errs.is_empty() {
            return Err(AsmErrs::from(errs));
        }

        tracing::debug!(words = words.len(), "second pass complete");
        Ok(Self {
            words,
            sym: debug.then_some(sym),
        })
    }

    /// Gets the words of the object file.
    pub fn words(&self) -> &[i32] {
        &self.words
    }

    /// Gets the number of words in the object file.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the object file holds no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Gets the symbol table if it is present in the object file.
    pub fn symbol_table(&self) -> Option<&SymbolTable> {
        self.sym.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::OffsetNewErr;

    use super::{assemble, assemble_debug, AsmErrKind, AsmErrs, ObjectFile};

    fn assemble_src(src: &str) -> Result<ObjectFile, AsmErrs> {
        assemble_debug(src)
    }
    fn assert_asm_fail<T: std::fmt::Debug>(r: Result<T, AsmErrs>, kind: AsmErrKind) {
        let errs = r.unwrap_err();
        assert!(errs.iter().any(|e| e.kind == kind), "expected {kind:?}, got {errs:?}");
    }

    #[test]
    fn test_sym_basic() {
        let src = "
A   add 0 0 0
    and 0 0 1
C   add 0 0 0
D   lw 0 0 -1
    halt
E   beq 0 0 C
B   jne A
";

        let obj = assemble_src(src).unwrap();
        let sym = obj.symbol_table().unwrap();
        assert_eq!(sym.lookup_label("A"), Some(0));
        assert_eq!(sym.lookup_label("C"), Some(2));
        assert_eq!(sym.lookup_label("D"), Some(3));
        assert_eq!(sym.lookup_label("E"), Some(5));
        assert_eq!(sym.lookup_label("B"), Some(6));
        assert_eq!(sym.get_label_source("A"), Some(1..2));

        let mut labels: Vec<_> = sym.label_iter().collect();
        labels.sort_by_key(|&(_, addr)| addr);
        assert_eq!(labels, [("A", 0), ("C", 2), ("D", 3), ("E", 5), ("B", 6)]);
    }

    #[test]
    fn test_line_map() {
        let src = "\n  add 0 1 2\n\nL halt\n  .fill L";
        let obj = assemble_src(src).unwrap();
        let sym = obj.symbol_table().unwrap();
        assert_eq!(sym.lookup_line(0), None);
        assert_eq!(sym.lookup_line(1), Some(0));
        assert_eq!(sym.lookup_line(2), None);
        assert_eq!(sym.lookup_line(3), Some(1));
        assert_eq!(sym.lookup_line(4), Some(2));
        assert_eq!(sym.rev_lookup_line(1), Some(3));
        assert_eq!(sym.rev_lookup_line(3), None);
        assert_eq!(sym.source_info().and_then(|s| s.read_line(3)), Some("L halt"));
        assert_eq!(obj.words(), &[32770, 50331648, 1]);
    }

    #[test]
    fn test_branch_offsets() {
        // forward and backward
        let src = "
    beq 0 0 END
    add 0 0 0
TOP beq 0 0 TOP
END halt
";
        let obj = assemble(src).unwrap();
        assert_eq!(obj.words()[0], (4 << 23) | 2);
        assert_eq!(obj.words()[2], (4 << 23) | 0x7FFF);

        let src = "
L   add 0 0 0
    add 0 0 0
    beq 0 0 L
";
        let obj = assemble(src).unwrap();
        assert_eq!(obj.words()[2], 33587197);
    }

    #[test]
    fn test_numeric_offsets() {
        let obj = assemble("  beq 1 2 -1\n  jne 0\n  lw 1 2 100").unwrap();
        assert_eq!(obj.words(), &[
            (4 << 23) | (1 << 19) | (2 << 15) | 0x7FFF,
            18 << 23,
            (2 << 23) | (1 << 19) | (2 << 15) | 100,
        ]);
    }

    #[test]
    fn test_fill() {
        let obj = assemble("  halt\nX .fill -7\nY .fill X\n  .fill 2147483647").unwrap();
        assert_eq!(obj.words(), &[50331648, -7, 1, i32::MAX]);
    }

    #[test]
    fn test_jarl_bsr_encode() {
        let obj = assemble("  jarl 4 7\n  bsr 1 2\n  bsf 1 2\n  push\n  pop 3").unwrap();
        assert_eq!(obj.words(), &[
            (5 << 23) | (4 << 19) | (7 << 15),
            (16 << 23) | (1 << 19) | (2 << 15),
            (17 << 23) | (1 << 19) | (2 << 15),
            (20 << 23) | (1 << 19),
            (19 << 23) | (3 << 19),
        ]);
    }

    #[test]
    fn test_labels() {
        assert_asm_fail(assemble("1abc halt"), AsmErrKind::InvalidLabel);
        assert_asm_fail(assemble("A halt\nA halt"), AsmErrKind::DuplicateLabel);
        assert_asm_fail(assemble("  beq 0 0 NOWHERE"), AsmErrKind::CouldNotFindLabel);
        assert_asm_fail(assemble("  .fill NOWHERE"), AsmErrKind::CouldNotFindLabel);

        // case-sensitive
        assemble("a halt\nA halt").unwrap();
        assert_asm_fail(assemble("a halt\n  beq 0 0 A"), AsmErrKind::CouldNotFindLabel);
    }

    #[test]
    fn test_duplicate_label_span() {
        let errs = assemble("DUP halt\nDUP halt").unwrap_err();
        let err = errs.first().unwrap();
        assert_eq!(err.kind, AsmErrKind::DuplicateLabel);
        assert_eq!(err.span.iter().cloned().collect::<Vec<_>>(), vec![0..3, 9..12]);
    }

    #[test]
    fn test_offset_range() {
        assemble("  lw 0 1 16383\n  lw 0 1 -16384").unwrap();
        assert_asm_fail(assemble("  lw 0 1 16384"), AsmErrKind::OffsetNewErr(OffsetNewErr { bits: 15 }));
        assert_asm_fail(assemble("  sw 0 1 -16385"), AsmErrKind::OffsetNewErr(OffsetNewErr { bits: 15 }));
        assert_asm_fail(assemble("  beq 0 0 20000"), AsmErrKind::OffsetNewErr(OffsetNewErr { bits: 15 }));
    }

    #[test]
    fn test_branch_out_of_range() {
        assert_asm_fail(assemble("  beq 0 0 -2"), AsmErrKind::BranchOutOfRange);
        assert_asm_fail(assemble("  jne 16383"), AsmErrKind::BranchOutOfRange);
        assemble("  jne 16382").unwrap();
        assemble("  jne -1").unwrap();
    }

    #[test]
    fn test_stack_balance() {
        let mut src = String::new();
        for _ in 0..32 { src.push_str("  push\n"); }
        for _ in 0..32 { src.push_str("  pop\n"); }
        src.push_str("  halt");
        assemble(&src).unwrap();

        assert_asm_fail(assemble("  pop\n  halt"), AsmErrKind::StackUnderflow);
        assert_asm_fail(assemble("  push\n  pop\n  pop"), AsmErrKind::StackUnderflow);

        let src = "  push\n".repeat(33);
        assert_asm_fail(assemble(&src), AsmErrKind::StackOverflow);
    }

    #[test]
    fn test_program_too_large() {
        let src = "  halt\n".repeat(16384);
        assert_eq!(assemble(&src).unwrap().len(), 16384);

        let src = "  halt\n".repeat(16385);
        assert_asm_fail(assemble(&src), AsmErrKind::ProgramTooLarge);
    }

    #[test]
    fn test_errors_collected() {
        let src = "
1bad add 0 1 2
     pop
     beq 0 0 MISSING
     add 0 1 77
";
        let errs = assemble(src).unwrap_err();
        let kinds: Vec<_> = errs.iter().map(|e| e.kind).collect();
        // MISSING is only checked in the second pass, which doesn't run
        assert_eq!(kinds, vec![
            AsmErrKind::InvalidLabel,
            AsmErrKind::StackUnderflow,
            AsmErrKind::RegOutOfRange,
        ]);
    }

    #[test]
    fn test_first_pass_sees_bad_lines() {
        // duplicate label on a line with a bad operand
        let errs = assemble("A add 0 1 99\nA halt").unwrap_err();
        let kinds: Vec<_> = errs.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, [AsmErrKind::DuplicateLabel, AsmErrKind::RegOutOfRange]);

        // a push with a bad register still fills the stack
        let errs = assemble("  push 99\n  pop\n  halt").unwrap_err();
        let kinds: Vec<_> = errs.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, [AsmErrKind::RegOutOfRange]);

        // the 33rd push overflows even though its label is bad
        let mut src = "  push\n".repeat(32);
        src.push_str("1x push\n");
        let errs = assemble(&src).unwrap_err();
        let kinds: Vec<_> = errs.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, [AsmErrKind::InvalidLabel, AsmErrKind::StackOverflow]);
    }

    #[test]
    fn test_second_pass_errors_collected() {
        let errs = assemble("  beq 0 0 A\n  beq 0 0 B\n  lw 0 0 99999").unwrap_err();
        assert_eq!(errs.len(), 3);
    }
}
