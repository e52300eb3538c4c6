//! Tokenizing SOL assembly operands.
//!
//! SOL source lines are split into whitespace-separated fields
//! (see [`crate::parse`]). Each operand field is then classified
//! by this module's [`Token`] enum, which is a [`logos`] lexer.
//!
//! A field must lex as exactly one token. [`lex_field`] enforces this.

use std::num::IntErrorKind;
use std::ops::Range;

use logos::{Lexer, Logos};

/// A unit of information in a SOL operand field.
#[derive(Debug, Logos, PartialEq, Eq)]
#[logos(skip r"[ \t\r]+", error = LexErr)]
pub enum Token {
    // The numeric regex spans over tokens that are technically invalid
    // (e.g., 23trst matches even though it shouldn't).
    // The validator function rejects those.

    /// A decimal integer (e.g., `9`, `-14`, `+7`).
    #[regex(r"[+-]?\d\w*", lex_int)]
    Int(i32),

    /// An identifier, such as a label (e.g., `LOOP`, `done`, `five`) or a mnemonic (e.g., `add`).
    ///
    /// Identifiers are case-sensitive.
    #[regex(r"[A-Za-z][A-Za-z0-9]*", |lx| lx.slice().to_string())]
    Ident(String),

    /// A directive (e.g., `.fill`).
    #[regex(r"\.[A-Za-z]\w*", |lx| lx.slice()[1..].to_string())]
    Directive(String),
}

/// Any errors raised in attempting to tokenize an operand field.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
pub enum LexErr {
    /// Numeric literal cannot fit within the range of an i32.
    DoesNotFitI32,
    /// Numeric literal could not be parsed as a decimal literal because it has invalid digits (i.e., not 0-9).
    InvalidNumeric,
    /// Int parsing failed but the reason why is unknown.
    UnknownIntErr,
    /// The field holds more than one token.
    TrailingChars,
    /// A symbol was used which is not allowed in SOL assembly files.
    #[default]
    InvalidSymbol
}
impl std::fmt::Display for LexErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErr::DoesNotFitI32  => f.write_str("numeric token does not fit 32-bit signed integer"),
            LexErr::InvalidNumeric => f.write_str("invalid decimal literal"),
            LexErr::UnknownIntErr  => f.write_str("could not parse integer"),
            LexErr::TrailingChars  => f.write_str("unexpected characters in operand"),
            LexErr::InvalidSymbol  => f.write_str("unrecognized symbol"),
        }
    }
}
impl std::error::Error for LexErr {}
impl crate::err::Error for LexErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            LexErr::DoesNotFitI32  => Some(format!("the range for a 32-bit signed integer is [{}, {}]", i32::MIN, i32::MAX).into()),
            LexErr::InvalidNumeric => Some("a decimal literal only consists of digits 0-9".into()),
            LexErr::UnknownIntErr  => None,
            LexErr::TrailingChars  => Some("an operand is a single integer or a label made of letters and digits".into()),
            LexErr::InvalidSymbol  => Some("this char does not occur in any token in SOL assembly".into()),
        }
    }
}

/// Helper that converts an int error kind to its corresponding LexErr.
fn convert_int_error(e: &IntErrorKind) -> LexErr {
    match e {
        IntErrorKind::InvalidDigit => LexErr::InvalidNumeric,
        IntErrorKind::PosOverflow  => LexErr::DoesNotFitI32,
        IntErrorKind::NegOverflow  => LexErr::DoesNotFitI32,
        _ => LexErr::UnknownIntErr,
    }
}
fn lex_int(lx: &Lexer<'_, Token>) -> Result<i32, LexErr> {
    lx.slice()
        .parse::<i32>()
        .map_err(|e| convert_int_error(e.kind()))
}

/// Lexes a single whitespace-free field.
///
/// The field must consist of exactly one token.
/// Errors carry the byte range (relative to the field) where they occurred.
///
/// # Example
/// ```
/// use sol_ensemble::parse::lex::{lex_field, LexErr, Token};
///
/// assert_eq!(lex_field("-12"), Ok(Token::Int(-12)));
/// assert_eq!(lex_field("LOOP"), Ok(Token::Ident("LOOP".to_string())));
/// assert_eq!(lex_field("12abc").map_err(|(e, _)| e), Err(LexErr::InvalidNumeric));
/// assert_eq!(lex_field("a_b").map_err(|(e, _)| e), Err(LexErr::TrailingChars));
/// ```
pub fn lex_field(field: &str) -> Result<Token, (LexErr, Range<usize>)> {
    let mut lexer = Token::lexer(field);
    let token = match lexer.next() {
        Some(Ok(token)) => token,
        Some(Err(e)) => return Err((e, lexer.span())),
        None => return Err((LexErr::InvalidSymbol, 0..field.len())),
    };

    match lexer.next() {
        None => Ok(token),
        Some(Err(e @ (LexErr::DoesNotFitI32 | LexErr::InvalidNumeric))) => Err((e, lexer.span())),
        Some(_) => Err((LexErr::TrailingChars, lexer.span().start..field.len())),
    }
}

#[cfg(test)]
mod tests {
    use logos::Logos;

    use crate::err::LexErr;
    use crate::parse::lex::{lex_field, Token};

    fn ident(s: &str) -> Token {
        Token::Ident(s.to_string())
    }
    fn directive(s: &str) -> Token {
        Token::Directive(s.to_string())
    }

    #[test]
    fn test_numeric_success() {
        let mut tokens = Token::lexer("0 123 456 789");
        assert_eq!(tokens.next(), Some(Ok(Token::Int(0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(123))));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(456))));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(789))));
        assert_eq!(tokens.next(), None);

        // Signs
        let mut tokens = Token::lexer("-123 +456 -0");
        assert_eq!(tokens.next(), Some(Ok(Token::Int(-123))));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(456))));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(0))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_numeric_overflow() {
        let mut tokens = Token::lexer("2147483647 -2147483648");
        assert_eq!(tokens.next(), Some(Ok(Token::Int(i32::MAX))));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(i32::MIN))));
        assert_eq!(tokens.next(), None);

        assert_eq!(Token::lexer("2147483648").next(), Some(Err(LexErr::DoesNotFitI32)));
        assert_eq!(Token::lexer("-2147483649").next(), Some(Err(LexErr::DoesNotFitI32)));
        assert_eq!(Token::lexer("999999999999999999999999999999").next(), Some(Err(LexErr::DoesNotFitI32)));
    }

    #[test]
    fn test_numeric_invalid() {
        assert_eq!(Token::lexer("3Q").next(), Some(Err(LexErr::InvalidNumeric)));
        assert_eq!(Token::lexer("0x10").next(), Some(Err(LexErr::InvalidNumeric)));
        assert_eq!(Token::lexer("1_000").next(), Some(Err(LexErr::InvalidNumeric)));
    }

    #[test]
    fn test_idents() {
        let mut tokens = Token::lexer("LOOP done add ADD a1b2");
        assert_eq!(tokens.next(), Some(Ok(ident("LOOP"))));
        assert_eq!(tokens.next(), Some(Ok(ident("done"))));
        assert_eq!(tokens.next(), Some(Ok(ident("add"))));
        assert_eq!(tokens.next(), Some(Ok(ident("ADD"))));
        assert_eq!(tokens.next(), Some(Ok(ident("a1b2"))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_directive() {
        let mut tokens = Token::lexer(".fill .abc .a2");
        assert_eq!(tokens.next(), Some(Ok(directive("fill"))));
        assert_eq!(tokens.next(), Some(Ok(directive("abc"))));
        assert_eq!(tokens.next(), Some(Ok(directive("a2"))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_field() {
        assert_eq!(lex_field("7"), Ok(Token::Int(7)));
        assert_eq!(lex_field(".fill"), Ok(directive("fill")));
        assert_eq!(lex_field("abc$"), Err((LexErr::TrailingChars, 3..4)));
        assert_eq!(lex_field("ab.cd"), Err((LexErr::TrailingChars, 2..5)));
        assert_eq!(lex_field("$"), Err((LexErr::InvalidSymbol, 0..1)));
        assert_eq!(lex_field("-"), Err((LexErr::InvalidSymbol, 0..1)));
    }

    #[test]
    fn test_invalid_symbol() {
        for c in "!@$%^&*()=[]{};:'\",<>/?\\|`~_".chars() {
            let string = c.to_string();
            assert_eq!(
                Token::lexer(&string).next(),
                Some(Err(LexErr::InvalidSymbol)),
                "Expected {string:?} to be an invalid symbol"
            );
        }
    }
}
