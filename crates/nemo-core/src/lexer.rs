//! Hand-written lexer: turns a source buffer into a peekable, backtrackable
//! stream of [`Symbol`]s.
//!
//! The stream is built eagerly (the whole source is tokenized up front into
//! a `Vec<Symbol>`) rather than lazily; `prev`/`rewind_to` then amount to
//! moving an index rather than following C's doubly-linked list, which gives
//! the parser the same O(1) one-symbol backtrack the original interpreter
//! relied on.

use std::fmt;

use crate::errors::{CodeLoc, EvalResult, RunError};

/// The kind of token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Name(String),
    Int(i64),
    Real(f64),
    Str(String),
    Char(char),

    // keywords
    KwIf,
    KwWhile,
    KwElse,
    KwFor,
    KwMy,
    KwFn,
    KwPrint,
    KwUse,
    KwReturn,

    // punctuators / operators
    Semi,
    Comma,
    Dot,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,

    PlusPlus,
    MinusMinus,

    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,

    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    AndAnd,
    OrOr,

    Eof,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(n) => write!(f, "identifier '{n}'"),
            Self::Int(i) => write!(f, "integer '{i}'"),
            Self::Real(r) => write!(f, "real '{r}'"),
            Self::Str(s) => write!(f, "string {s:?}"),
            Self::Char(c) => write!(f, "char '{c}'"),
            Self::Eof => write!(f, "end of input"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// One lexer token: a kind plus its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub line: u32,
    pub col: u32,
}

const KEYWORDS: &[(&str, SymbolKind)] = &[
    ("if", SymbolKind::KwIf),
    ("while", SymbolKind::KwWhile),
    ("else", SymbolKind::KwElse),
    ("for", SymbolKind::KwFor),
    ("my", SymbolKind::KwMy),
    ("fn", SymbolKind::KwFn),
    ("print", SymbolKind::KwPrint),
    ("use", SymbolKind::KwUse),
    ("return", SymbolKind::KwReturn),
];

fn keyword_lookup(ident: &str) -> Option<SymbolKind> {
    KEYWORDS.iter().find(|(name, _)| *name == ident).map(|(_, kind)| kind.clone())
}

/// A peekable, backtrackable stream of [`Symbol`]s.
///
/// `peek`/`accept`/`force` inspect or consume the current symbol; `mark`/
/// `rewind_to` save and restore a cursor position, giving the parser
/// arbitrary (not just one-symbol) backtracking when it needs to try more
/// than one production.
pub struct SymbolStream {
    symbols: Vec<Symbol>,
    pos: usize,
    source: String,
}

/// An opaque cursor position returned by [`SymbolStream::mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark(usize);

impl SymbolStream {
    /// Lexes `text` in full, tagging every error with `source` for
    /// diagnostics.
    pub fn lex(text: &str, source: &str) -> EvalResult<Self> {
        let symbols = Lexer::new(text, source).tokenize()?;
        Ok(Self { symbols, pos: 0, source: source.to_owned() })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn current(&self) -> &Symbol {
        &self.symbols[self.pos]
    }

    #[must_use]
    pub fn current_loc(&self) -> CodeLoc {
        let cur = self.current();
        CodeLoc::new(self.source.clone(), cur.line, cur.col)
    }

    /// Peeks at the previously-consumed symbol (the `prev` link of the
    /// original doubly-linked stream), used to read a literal payload right
    /// after `accept`/`force` advanced past it.
    #[must_use]
    pub fn prev(&self) -> Option<&Symbol> {
        self.pos.checked_sub(1).map(|i| &self.symbols[i])
    }

    #[must_use]
    pub fn peek(&self, kind: &SymbolKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    /// Advances past the current symbol if it matches `kind`, returning
    /// whether it matched.
    pub fn accept(&mut self, kind: &SymbolKind) -> bool {
        if self.peek(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances past the current symbol if it matches `kind`, or fails with
    /// `SyntaxError`.
    pub fn force(&mut self, kind: &SymbolKind) -> EvalResult<&Symbol> {
        if self.peek(kind) {
            let idx = self.pos;
            self.advance();
            Ok(&self.symbols[idx])
        } else {
            Err(RunError::syntax(
                self.current_loc(),
                format!("expected {kind}, got {}", self.current().kind),
            ))
        }
    }

    pub fn advance(&mut self) {
        if self.pos + 1 < self.symbols.len() {
            self.pos += 1;
        }
    }

    #[must_use]
    pub fn mark(&self) -> Mark {
        Mark(self.pos)
    }

    pub fn rewind_to(&mut self, mark: Mark) {
        self.pos = mark.0;
    }

    #[must_use]
    pub fn at_eof(&self) -> bool {
        matches!(self.current().kind, SymbolKind::Eof)
    }
}

struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
    source: String,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str, source: &str) -> Self {
        Self { bytes: text.as_bytes(), pos: 0, line: 1, col: 1, source: source.to_owned() }
    }

    fn loc(&self) -> CodeLoc {
        CodeLoc::new(self.source.clone(), self.line, self.col)
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'#') => {
                    while let Some(b) = self.peek_byte() {
                        if b == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn tokenize(mut self) -> EvalResult<Vec<Symbol>> {
        let mut out = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let (line, col) = (self.line, self.col);
            let Some(b) = self.peek_byte() else {
                out.push(Symbol { kind: SymbolKind::Eof, line, col });
                break;
            };
            let kind = self.next_kind(b)?;
            out.push(Symbol { kind, line, col });
        }
        Ok(out)
    }

    fn next_kind(&mut self, b: u8) -> EvalResult<SymbolKind> {
        if b.is_ascii_digit() {
            return Ok(self.lex_number());
        }
        if b == b'_' || b.is_ascii_alphabetic() {
            return Ok(self.lex_ident());
        }
        match b {
            b'.' if self.peek_byte_at(1).is_some_and(|n| n.is_ascii_digit()) => Ok(self.lex_number()),
            b'"' => self.lex_string(),
            b'\'' => self.lex_char(),
            _ => self.lex_operator(),
        }
    }

    fn lex_ident(&mut self) -> SymbolKind {
        let start = self.pos;
        while let Some(b) = self.peek_byte() {
            if b == b'_' || b.is_ascii_alphanumeric() {
                self.bump();
            } else {
                break;
            }
        }
        let ident = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or_default();
        keyword_lookup(ident).unwrap_or_else(|| SymbolKind::Name(ident.to_owned()))
    }

    fn lex_number(&mut self) -> SymbolKind {
        let start = self.pos;
        let mut is_real = false;
        while self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
            self.bump();
        }
        if self.peek_byte() == Some(b'.') && self.peek_byte_at(1) != Some(b'.') {
            is_real = true;
            self.bump();
            while self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or_default();
        if is_real {
            let normalized = if text.starts_with('.') {
                format!("0{text}")
            } else if text.ends_with('.') {
                format!("{text}0")
            } else {
                text.to_owned()
            };
            SymbolKind::Real(normalized.parse().unwrap_or(0.0))
        } else {
            SymbolKind::Int(text.parse().unwrap_or(0))
        }
    }

    fn unescape(&mut self) -> EvalResult<char> {
        match self.bump() {
            Some(b'n') => Ok('\n'),
            Some(b't') => Ok('\t'),
            Some(b'a') => Ok('\x07'),
            Some(b'%') => Ok('%'),
            Some(b'\\') => Ok('\\'),
            Some(b'"') => Ok('"'),
            Some(b'\'') => Ok('\''),
            Some(other) => Ok(other as char),
            None => Err(RunError::lex(self.loc(), '\0')),
        }
    }

    fn lex_string(&mut self) -> EvalResult<SymbolKind> {
        self.bump(); // opening quote
        let mut s = String::new();
        loop {
            match self.peek_byte() {
                Some(b'"') => {
                    self.bump();
                    break;
                }
                Some(b'\\') => {
                    self.bump();
                    s.push(self.unescape()?);
                }
                Some(_) => {
                    if let Some(b) = self.bump() {
                        s.push(b as char);
                    }
                }
                None => return Err(RunError::syntax(self.loc(), "unterminated string literal")),
            }
        }
        Ok(SymbolKind::Str(s))
    }

    fn lex_char(&mut self) -> EvalResult<SymbolKind> {
        self.bump(); // opening quote
        let c = match self.peek_byte() {
            Some(b'\\') => {
                self.bump();
                self.unescape()?
            }
            Some(_) => self.bump().map(|b| b as char).unwrap_or('\0'),
            None => return Err(RunError::syntax(self.loc(), "unterminated char literal")),
        };
        if self.peek_byte() != Some(b'\'') {
            return Err(RunError::syntax(self.loc(), "char literal must contain exactly one character"));
        }
        self.bump();
        Ok(SymbolKind::Char(c))
    }

    fn lex_operator(&mut self) -> EvalResult<SymbolKind> {
        let loc = self.loc();
        let b = self.bump().expect("checked by caller");
        let next = self.peek_byte();
        macro_rules! two {
            ($c:expr, $kind:expr) => {
                if next == Some($c) {
                    self.bump();
                    return Ok($kind);
                }
            };
        }
        match b {
            b';' => Ok(SymbolKind::Semi),
            b',' => Ok(SymbolKind::Comma),
            b'.' => Ok(SymbolKind::Dot),
            b'(' => Ok(SymbolKind::LParen),
            b')' => Ok(SymbolKind::RParen),
            b'{' => Ok(SymbolKind::LBrace),
            b'}' => Ok(SymbolKind::RBrace),
            b'[' => Ok(SymbolKind::LBracket),
            b']' => Ok(SymbolKind::RBracket),
            b'+' => {
                two!(b'+', SymbolKind::PlusPlus);
                two!(b'=', SymbolKind::PlusAssign);
                Ok(SymbolKind::Plus)
            }
            b'-' => {
                two!(b'-', SymbolKind::MinusMinus);
                two!(b'=', SymbolKind::MinusAssign);
                Ok(SymbolKind::Minus)
            }
            b'*' => {
                two!(b'=', SymbolKind::StarAssign);
                Ok(SymbolKind::Star)
            }
            b'/' => {
                two!(b'=', SymbolKind::SlashAssign);
                Ok(SymbolKind::Slash)
            }
            b'%' => {
                two!(b'=', SymbolKind::PercentAssign);
                Ok(SymbolKind::Percent)
            }
            b'=' => {
                two!(b'=', SymbolKind::Eq);
                Ok(SymbolKind::Assign)
            }
            b'!' => {
                two!(b'=', SymbolKind::Ne);
                Ok(SymbolKind::Bang)
            }
            b'<' => {
                two!(b'=', SymbolKind::Le);
                Ok(SymbolKind::Lt)
            }
            b'>' => {
                two!(b'=', SymbolKind::Ge);
                Ok(SymbolKind::Gt)
            }
            b'&' if next == Some(b'&') => {
                self.bump();
                Ok(SymbolKind::AndAnd)
            }
            b'|' if next == Some(b'|') => {
                self.bump();
                Ok(SymbolKind::OrOr)
            }
            other => Err(RunError::lex(loc, other as char)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<SymbolKind> {
        SymbolStream::lex(src, "<test>").unwrap().symbols.into_iter().map(|s| s.kind).collect()
    }

    #[test]
    fn skips_whitespace_and_comments() {
        let k = kinds("  # hi\n 1 ");
        assert_eq!(k, vec![SymbolKind::Int(1), SymbolKind::Eof]);
    }

    #[test]
    fn lexes_keywords_vs_names() {
        let k = kinds("my fn forge");
        assert_eq!(k, vec![SymbolKind::KwMy, SymbolKind::KwFn, SymbolKind::Name("forge".into()), SymbolKind::Eof]);
    }

    #[test]
    fn lexes_real_literals_both_sides_optional() {
        assert_eq!(kinds(".5"), vec![SymbolKind::Real(0.5), SymbolKind::Eof]);
        assert_eq!(kinds("5."), vec![SymbolKind::Real(5.0), SymbolKind::Eof]);
        assert_eq!(kinds("5.5"), vec![SymbolKind::Real(5.5), SymbolKind::Eof]);
    }

    #[test]
    fn multi_char_operators_tried_before_single_char() {
        let k = kinds("++ -- == != <= >= += -= *= /= %= && ||");
        assert_eq!(
            k,
            vec![
                SymbolKind::PlusPlus,
                SymbolKind::MinusMinus,
                SymbolKind::Eq,
                SymbolKind::Ne,
                SymbolKind::Le,
                SymbolKind::Ge,
                SymbolKind::PlusAssign,
                SymbolKind::MinusAssign,
                SymbolKind::StarAssign,
                SymbolKind::SlashAssign,
                SymbolKind::PercentAssign,
                SymbolKind::AndAnd,
                SymbolKind::OrOr,
                SymbolKind::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        let k = kinds(r#""a\nb\t\"c\\""#);
        assert_eq!(k, vec![SymbolKind::Str("a\nb\t\"c\\".into()), SymbolKind::Eof]);
    }

    #[test]
    fn char_literal() {
        assert_eq!(kinds("'x'"), vec![SymbolKind::Char('x'), SymbolKind::Eof]);
        assert_eq!(kinds(r"'\n'"), vec![SymbolKind::Char('\n'), SymbolKind::Eof]);
    }

    #[test]
    fn unrecognized_byte_aborts_with_lex_error() {
        let err = SymbolStream::lex("1 ` 2", "<test>").unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::LexError);
    }

    #[test]
    fn reports_one_based_line_and_column() {
        let stream = SymbolStream::lex("\n  foo", "<test>").unwrap();
        assert_eq!(stream.symbols[0].line, 2);
        assert_eq!(stream.symbols[0].col, 3);
    }
}
