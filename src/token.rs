//! Tokens produced by the [`Lexer`](crate::Lexer).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Concentration units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    /// Micromolar, normalized to millimolar by the parser.
    Micromolar,
    Millimolar,
}

/// Reserved words that open a setup instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    /// `init`: population count.
    Init,
    /// `diametre`
    Diameter,
    /// `vitesse`
    Speed,
}

impl Keyword {
    pub const ALL: [Keyword; 3] = [Keyword::Init, Keyword::Diameter, Keyword::Speed];

    /// The spelling used in reaction files.
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Init => "init",
            Keyword::Diameter => "diametre",
            Keyword::Speed => "vitesse",
        }
    }
}

/// Punctuation and operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Punct {
    Arrow,
    Colon,
    Comma,
    Minus,
    Plus,
    Semicolon,
    VBar,
    ParenthesisOpen,
    ParenthesisClose,
    Equal,
}

impl Punct {
    pub fn as_str(self) -> &'static str {
        match self {
            Punct::Arrow => "->",
            Punct::Colon => ":",
            Punct::Comma => ",",
            Punct::Minus => "-",
            Punct::Plus => "+",
            Punct::Semicolon => ";",
            Punct::VBar => "|",
            Punct::ParenthesisOpen => "(",
            Punct::ParenthesisClose => ")",
            Punct::Equal => "=",
        }
    }
}

/// The kind of a [`Token`], without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Unit,
    Keyword,
    Punct,
    /// End of a line.
    End,
    EndOfFile,
    Error,
}

/// A lexical unit of the reaction language.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Token {
    /// Interned identifier id.
    Ident(u32),
    Number(f64),
    Unit(Unit),
    Keyword(Keyword),
    Punct(Punct),
    End,
    EndOfFile,
    /// A character the scanner does not recognize.
    Error(char),
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Ident(_) => TokenKind::Ident,
            Token::Number(_) => TokenKind::Number,
            Token::Unit(_) => TokenKind::Unit,
            Token::Keyword(_) => TokenKind::Keyword,
            Token::Punct(_) => TokenKind::Punct,
            Token::End => TokenKind::End,
            Token::EndOfFile => TokenKind::EndOfFile,
            Token::Error(_) => TokenKind::Error,
        }
    }

    /// Numeric payload: the literal, the identifier id or the variant ordinal.
    pub fn value(&self) -> f64 {
        match *self {
            Token::Ident(id) => f64::from(id),
            Token::Number(n) => n,
            Token::Unit(u) => u as u8 as f64,
            Token::Keyword(k) => k as u8 as f64,
            Token::Punct(p) => p as u8 as f64,
            Token::End | Token::EndOfFile | Token::Error(_) => 0.0,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(id) => write!(f, "IDENT({id})"),
            Token::Number(n) => write!(f, "NUM({n})"),
            Token::Unit(Unit::Micromolar) => f.write_str("uM"),
            Token::Unit(Unit::Millimolar) => f.write_str("mM"),
            Token::Keyword(k) => f.write_str(k.as_str()),
            Token::Punct(p) => f.write_str(p.as_str()),
            Token::End => f.write_str("END"),
            Token::EndOfFile => f.write_str("EOF"),
            Token::Error(ch) => write!(f, "ERROR({ch:?})"),
        }
    }
}
