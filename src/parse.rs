//! Parsing assembly source code into an AST.
//!
//! SOL assembly is line-oriented. Each non-blank line holds one statement,
//! laid out as whitespace-separated fields:
//!
//! ```text
//! [label] mnemonic [op0] [op1] [op2] [comment...]
//! ```
//!
//! A line which starts with whitespace has no label.
//! Fields after the last operand the mnemonic accepts are a comment.
//!
//! Operand fields are classified by the lexer in [`lex`].
//! The main entry point is [`parse_ast`].

pub mod lex;

use std::ops::Range;

use crate::asm::{AsmErr, AsmErrKind, AsmErrs};
use crate::ast::asm::{AsmInstr, Directive, Opcode, OperandKind, Stmt, StmtKind};
use crate::ast::{ImmOrLabel, Label, Reg, STACK_REG};

use self::lex::{lex_field, Token};

/// The mnemonic of the only directive.
const FILL: &str = ".fill";

/// Parses SOL source code into a list of statements.
///
/// Every error found in the source is reported, not just the first.
///
/// # Example
/// ```
/// use sol_ensemble::parse::parse_ast;
///
/// let src = "
/// LOOP add 1 2 1   increment
///      beq 0 0 LOOP
///      halt
/// ";
/// let ast = parse_ast(src).unwrap();
/// assert_eq!(ast.len(), 3);
/// assert_eq!(ast[0].label.as_ref().map(|l| &*l.name), Some("LOOP"));
///
/// assert!(parse_ast("1abc halt").is_err());
/// ```
pub fn parse_ast(src: &str) -> Result<Vec<Stmt>, AsmErrs> {
    let (stmts, errs) = parse_lossy(src);
    match errs.is_empty() {
        true  => Ok(stmts),
        false => Err(errs.into()),
    }
}

/// Parses SOL source code, keeping a statement for every non-blank line
/// alongside every error found.
///
/// A line with errors still yields a statement holding whatever parsed
/// (its label, and its mnemonic with default operands). This lets the first
/// assembler pass assign addresses, check labels, and track `push`/`pop` depth
/// on every line. Those statements are never encoded, since assembly stops
/// after the first pass if there were any errors.
pub(crate) fn parse_lossy(src: &str) -> (Vec<Stmt>, Vec<AsmErr>) {
    let mut stmts = vec![];
    let mut errs = vec![];

    let mut line_start = 0;
    for line in src.split('\n') {
        let (stmt, line_errs) = parse_line(line, line_start);
        stmts.extend(stmt);
        errs.extend(line_errs);
        line_start += line.len() + 1;
    }

    tracing::debug!(stmts = stmts.len(), errors = errs.len(), "parsed source");
    (stmts, errs)
}

/// A whitespace-separated field of a line, with its span in the source.
struct Field<'s> {
    text: &'s str,
    span: Range<usize>,
}

/// Splits a line into its whitespace-separated fields.
///
/// `base` is the index of the start of the line in the source.
fn split_fields(line: &str, base: usize) -> Vec<Field<'_>> {
    let mut fields = vec![];
    let mut start = None;

    for (i, c) in line.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                fields.push(Field { text: &line[s..i], span: (base + s)..(base + i) });
                start = None;
            },
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        fields.push(Field { text: &line[s..], span: (base + s)..(base + line.len()) });
    }

    fields
}

/// Checks that a label starts with a letter and consists of letters and digits.
fn parse_label(field: &Field<'_>) -> Result<Label, AsmErr> {
    let mut chars = field.text.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    match starts_alpha && chars.all(|c| c.is_ascii_alphanumeric()) {
        true  => Ok(Label::new(field.text.to_string(), field.span.clone())),
        false => Err(AsmErr::new(AsmErrKind::InvalidLabel, field.span.clone())),
    }
}

/// Lexes an operand field, shifting lexer error spans into source positions.
fn lex_operand(field: &Field<'_>) -> Result<Token, AsmErr> {
    lex_field(field.text).map_err(|(e, r)| {
        let start = field.span.start;
        AsmErr::new(AsmErrKind::Lex(e), (start + r.start)..(start + r.end))
    })
}

fn parse_reg(field: &Field<'_>, token: Token) -> Result<Reg, AsmErr> {
    match token {
        Token::Int(n) => Reg::try_from(n)
            .map_err(|_| AsmErr::new(AsmErrKind::RegOutOfRange, field.span.clone())),
        _ => Err(AsmErr::new(AsmErrKind::ExpectedReg, field.span.clone())),
    }
}

fn parse_addr(field: &Field<'_>, token: Token) -> Result<ImmOrLabel, AsmErr> {
    match token {
        Token::Int(n) => Ok(ImmOrLabel::Imm(n)),
        Token::Ident(s) if s.chars().all(|c| c.is_ascii_alphabetic()) => {
            Ok(ImmOrLabel::Label(Label::new(s, field.span.clone())))
        },
        Token::Ident(_) => Err(AsmErr::new(AsmErrKind::InvalidAddrSymbol, field.span.clone())),
        Token::Directive(_) => Err(AsmErr::new(AsmErrKind::ExpectedAddr, field.span.clone())),
    }
}

/// Parses one line into a statement.
///
/// Blank lines produce no statement.
/// Any other line produces a statement, even if it has errors (see [`parse_lossy`]).
fn parse_line(line: &str, base: usize) -> (Option<Stmt>, Vec<AsmErr>) {
    let all_fields = split_fields(line, base);
    let mut fields = all_fields.iter();
    let mut errs = vec![];

    let has_label = line.chars().next().is_some_and(|c| !c.is_whitespace());
    let label = match has_label {
        true => fields.next().and_then(|f| parse_label(f).map_err(|e| errs.push(e)).ok()),
        false => None,
    };

    // Stands in for a line whose mnemonic is missing or unknown.
    let placeholder = |label: Option<Label>, span: Range<usize>| Stmt {
        label,
        nucleus: StmtKind::Directive(Directive::Fill(ImmOrLabel::Imm(0))),
        span,
    };

    let Some(mnemonic) = fields.next() else {
        // Whitespace-only line, or a lone label.
        return match all_fields.first() {
            Some(f) => {
                errs.push(AsmErr::new(AsmErrKind::MissingMnemonic, f.span.clone()));
                (Some(placeholder(label, f.span.clone())), errs)
            },
            None => (None, errs),
        };
    };

    let (opcode, kinds, required, name) = if mnemonic.text == FILL {
        (None, &[OperandKind::Addr][..], 1, FILL)
    } else if let Some(op) = Opcode::from_mnemonic(mnemonic.text) {
        (Some(op), op.operands(), op.required(), op.mnemonic())
    } else {
        errs.push(AsmErr::new(AsmErrKind::UnknownMnemonic, mnemonic.span.clone()));
        return (Some(placeholder(label, mnemonic.span.clone())), errs);
    };

    // Unused registers are R0, except the stack register of push and pop.
    let mut regs = [Reg(0); 3];
    if matches!(opcode, Some(Opcode::Push | Opcode::Pop)) {
        regs[0] = STACK_REG;
    }
    let mut addr = ImmOrLabel::Imm(0);
    let mut span_end = mnemonic.span.end;

    let operands: Vec<_> = fields.take(kinds.len()).collect();
    if operands.len() < required {
        let span = operands.last().map_or(mnemonic.span.clone(), |f| f.span.clone());
        errs.push(AsmErr::new(
            AsmErrKind::MissingOperands { mnemonic: name, expected: required, found: operands.len() },
            span
        ));
    } else {
        for (i, (field, &kind)) in operands.into_iter().zip(kinds).enumerate() {
            let token = match lex_operand(field) {
                Ok(t) => t,
                // An optional operand that doesn't lex is the start of a comment.
                Err(_) if i >= required => break,
                Err(e) => {
                    errs.push(e);
                    continue;
                }
            };

            match kind {
                // An optional register that isn't an integer is the start of a comment.
                OperandKind::Reg if i >= required && !matches!(token, Token::Int(_)) => break,
                OperandKind::Reg => match parse_reg(field, token) {
                    Ok(r) => regs[i] = r,
                    Err(e) => errs.push(e),
                },
                OperandKind::Addr => match parse_addr(field, token) {
                    Ok(a) => addr = a,
                    Err(e) => errs.push(e),
                },
            }
            span_end = field.span.end;
        }
    }

    let nucleus = match opcode {
        Some(op) => StmtKind::Instr(AsmInstr::from_parts(op, regs, addr)),
        None => StmtKind::Directive(Directive::Fill(addr)),
    };
    (Some(Stmt { label, nucleus, span: mnemonic.span.start..span_end }), errs)
}

#[cfg(test)]
mod tests {
    use crate::asm::AsmErrKind;
    use crate::ast::asm::{AsmInstr, Directive, StmtKind};
    use crate::ast::reg_consts::{R0, R1, R2, R3, R5};
    use crate::ast::{ImmOrLabel, Label};
    use crate::parse::lex::LexErr;

    use super::{parse_ast, parse_lossy};

    fn parse_one(src: &str) -> StmtKind {
        let mut ast = parse_ast(src).unwrap();
        assert_eq!(ast.len(), 1, "expected one statement");
        ast.remove(0).nucleus
    }
    fn assert_parse_fail(src: &str, kind: AsmErrKind) {
        let (_, errs) = parse_lossy(src);
        assert!(errs.iter().any(|e| e.kind == kind), "expected {kind:?} from {src:?}, got {errs:?}");
    }

    #[test]
    fn test_instr_forms() {
        assert_eq!(parse_one(" add 0 1 2"), StmtKind::Instr(AsmInstr::ADD(R0, R1, R2)));
        assert_eq!(parse_one(" lw 1 2 -5"), StmtKind::Instr(AsmInstr::LW(R1, R2, ImmOrLabel::Imm(-5))));
        assert_eq!(parse_one(" jarl 3 5"), StmtKind::Instr(AsmInstr::JARL(R3, R5)));
        assert_eq!(parse_one(" halt"), StmtKind::Instr(AsmInstr::HALT));
        assert_eq!(parse_one(" .fill 42"), StmtKind::Directive(Directive::Fill(ImmOrLabel::Imm(42))));
    }

    #[test]
    fn test_label_spans() {
        let src = "START add 0 1 2\n  beq 0 0 START";
        let ast = parse_ast(src).unwrap();
        assert_eq!(ast[0].label, Some(Label::new("START".to_string(), 0..5)));
        assert_eq!(ast[0].span, 6..15);
        assert_eq!(
            ast[1].nucleus,
            StmtKind::Instr(AsmInstr::BEQ(R0, R0, ImmOrLabel::Label(Label::new("START".to_string(), 26..31))))
        );
    }

    #[test]
    fn test_comments_and_blanks() {
        let src = "

            add 1 2 3 this adds things
            halt and stop here

        ";
        let ast = parse_ast(src).unwrap();
        assert_eq!(ast.len(), 2);
        assert_eq!(ast[1].nucleus, StmtKind::Instr(AsmInstr::HALT));
    }

    #[test]
    fn test_stack_operands() {
        assert_eq!(parse_one(" push"), StmtKind::Instr(AsmInstr::PUSH(R1)));
        assert_eq!(parse_one(" pop 5"), StmtKind::Instr(AsmInstr::POP(R5)));
        assert_eq!(parse_one(" push save it"), StmtKind::Instr(AsmInstr::PUSH(R1)));
        assert_parse_fail(" push 16", AsmErrKind::RegOutOfRange);
    }

    #[test]
    fn test_crlf() {
        let ast = parse_ast("A add 0 1 2\r\n halt\r\n").unwrap();
        assert_eq!(ast.len(), 2);
        assert_eq!(ast[0].label.as_ref().map(|l| l.span()), Some(0..1));
    }

    #[test]
    fn test_bad_labels() {
        assert_parse_fail("1abc halt", AsmErrKind::InvalidLabel);
        assert_parse_fail("a_b halt", AsmErrKind::InvalidLabel);
        assert_parse_fail("LONELY", AsmErrKind::MissingMnemonic);
    }

    #[test]
    fn test_bad_operands() {
        assert_parse_fail(" add 0 1", AsmErrKind::MissingOperands { mnemonic: "add", expected: 3, found: 2 });
        assert_parse_fail(" jne", AsmErrKind::MissingOperands { mnemonic: "jne", expected: 1, found: 0 });
        assert_parse_fail(" .fill", AsmErrKind::MissingOperands { mnemonic: ".fill", expected: 1, found: 0 });
        assert_parse_fail(" add 0 1 16", AsmErrKind::RegOutOfRange);
        assert_parse_fail(" add 0 1 -1", AsmErrKind::RegOutOfRange);
        assert_parse_fail(" add 0 X 2", AsmErrKind::ExpectedReg);
        assert_parse_fail(" lw 0 1 L2", AsmErrKind::InvalidAddrSymbol);
        assert_parse_fail(" beq 0 1 .fill", AsmErrKind::ExpectedAddr);
        assert_parse_fail(" lw 0 1 12x", AsmErrKind::Lex(LexErr::InvalidNumeric));
        assert_parse_fail(" mov 0 1 2", AsmErrKind::UnknownMnemonic);
        assert_parse_fail(" ADD 0 1 2", AsmErrKind::UnknownMnemonic);
    }

    #[test]
    fn test_errors_accumulate() {
        let (ast, errs) = parse_lossy("9 add 0 1 2\n foo\n halt\n add 0 1 99");
        assert_eq!(ast.len(), 4);
        assert_eq!(errs.len(), 3);
    }

    #[test]
    fn test_failed_lines_keep_label_and_kind() {
        let (ast, errs) = parse_lossy("A add 0 1 99\nB bogus\nC\n  push 99\n1x pop");
        assert_eq!(errs.len(), 5);
        assert_eq!(ast.len(), 5);

        let labels: Vec<_> = ast.iter().map(|s| s.label.as_ref().map(|l| &*l.name)).collect();
        assert_eq!(labels, [Some("A"), Some("B"), Some("C"), None, None]);

        assert_eq!(ast[0].nucleus, StmtKind::Instr(AsmInstr::ADD(R0, R1, R0)));
        assert_eq!(ast[3].nucleus, StmtKind::Instr(AsmInstr::PUSH(R1)));
        assert_eq!(ast[4].nucleus, StmtKind::Instr(AsmInstr::POP(R1)));
    }
}
