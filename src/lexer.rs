//! Hand-rolled scanner for the reaction language.
//!
//! [`Lexer::next_token`] runs a small finite-state machine over a [`CharStream`]
//! and returns exactly one token per call. The only state kept between calls is
//! the [`IdentifierTable`], so two lexers fed the same text hand out the same ids.

use crate::error::LexError;
use crate::symbols::IdentifierTable;
use crate::token::{Keyword, Punct, Token, Unit};
use std::str::Chars;

/// Character source with one character of pushback and line tracking.
#[derive(Clone, Debug)]
pub struct CharStream<'a> {
    chars: Chars<'a>,
    pushed_back: Option<char>,
    line: usize,
}

impl<'a> CharStream<'a> {
    /// Starts reading `source` at line 1.
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars(),
            pushed_back: None,
            line: 1,
        }
    }

    /// 1-based line of the next unread character.
    pub fn line(&self) -> usize {
        self.line
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.pushed_back.take().or_else(|| self.chars.next());
        if ch == Some('\n') {
            self.line += 1;
        }
        ch
    }

    fn push_back(&mut self, ch: char) {
        if ch == '\n' {
            self.line -= 1;
        }
        self.pushed_back = Some(ch);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanState {
    Start,
    MaybeArrow,
    MaybeComment,
    Comment,
    Quoted,
    Word,
    Number,
}

#[derive(Clone, Debug, Default)]
pub struct Lexer {
    table: IdentifierTable,
}

impl Lexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a lexer whose identifier table holds at most `capacity` names.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: IdentifierTable::with_capacity(capacity),
        }
    }

    /// Identifiers interned so far.
    pub fn table(&self) -> &IdentifierTable {
        &self.table
    }

    /// Consumes the lexer, keeping its identifier table for name lookups.
    pub fn into_table(self) -> IdentifierTable {
        self.table
    }

    /// Scans the next token from `stream`.
    ///
    /// Unrecognized characters come back as [`Token::Error`]; only table
    /// exhaustion, unterminated quotes and malformed numbers are `Err`.
    pub fn next_token(&mut self, stream: &mut CharStream<'_>) -> Result<Token, LexError> {
        let mut state = ScanState::Start;
        let mut buffer = String::new();

        loop {
            let Some(ch) = stream.next_char() else {
                return self.finish_at_end_of_input(state, &buffer, stream.line());
            };

            match state {
                ScanState::Start => match ch {
                    ' ' | '\t' | '\r' => {}
                    '\n' => return Ok(Token::End),
                    ';' => return Ok(Token::Punct(Punct::Semicolon)),
                    ':' => return Ok(Token::Punct(Punct::Colon)),
                    '+' => return Ok(Token::Punct(Punct::Plus)),
                    '|' => return Ok(Token::Punct(Punct::VBar)),
                    ',' => return Ok(Token::Punct(Punct::Comma)),
                    '(' => return Ok(Token::Punct(Punct::ParenthesisOpen)),
                    ')' => return Ok(Token::Punct(Punct::ParenthesisClose)),
                    '=' => return Ok(Token::Punct(Punct::Equal)),
                    '-' => state = ScanState::MaybeArrow,
                    '/' => state = ScanState::MaybeComment,
                    '"' => state = ScanState::Quoted,
                    c if c.is_ascii_alphabetic() || c == '_' => {
                        buffer.push(c);
                        state = ScanState::Word;
                    }
                    c if c.is_ascii_digit() || c == '.' => {
                        buffer.push(c);
                        state = ScanState::Number;
                    }
                    other => return Ok(Token::Error(other)),
                },

                ScanState::MaybeArrow => {
                    if ch == '>' {
                        return Ok(Token::Punct(Punct::Arrow));
                    }
                    stream.push_back(ch);
                    return Ok(Token::Punct(Punct::Minus));
                }

                ScanState::MaybeComment => {
                    if ch == '/' {
                        state = ScanState::Comment;
                        continue;
                    }
                    stream.push_back(ch);
                    return Ok(Token::Error('/'));
                }

                // The line break that closes a comment still separates statements.
                ScanState::Comment => {
                    if ch == '\n' {
                        return Ok(Token::End);
                    }
                }

                ScanState::Quoted => match ch {
                    '"' => return Ok(Token::Ident(self.table.intern(&buffer)?)),
                    '\n' => {
                        return Err(LexError::UnterminatedIdentifier {
                            line: stream.line() - 1,
                        });
                    }
                    c => buffer.push(c),
                },

                ScanState::Word => {
                    if let Some(unit) = unit_of(&buffer, ch) {
                        return Ok(Token::Unit(unit));
                    }
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        buffer.push(ch);
                        // Reserved words win as soon as they are spelled out.
                        if let Some(keyword) = keyword_of(&buffer) {
                            return Ok(Token::Keyword(keyword));
                        }
                        continue;
                    }
                    stream.push_back(ch);
                    return Ok(Token::Ident(self.table.intern(&buffer)?));
                }

                ScanState::Number => {
                    if ch.is_ascii_digit() || ch == '.' || ch == 'e' {
                        buffer.push(ch);
                        continue;
                    }
                    stream.push_back(ch);
                    return parse_number(&buffer, stream.line());
                }
            }
        }
    }

    /// Scans `stream` to the end. The returned sequence always ends with
    /// [`Token::EndOfFile`].
    pub fn lex_all(&mut self, stream: &mut CharStream<'_>) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token(stream)?;
            match token {
                Token::Error(ch) => {
                    return Err(LexError::UnexpectedCharacter {
                        ch,
                        line: stream.line(),
                    });
                }
                Token::EndOfFile => {
                    tokens.push(token);
                    tracing::debug!(
                        tokens = tokens.len(),
                        identifiers = self.table.len(),
                        "lexed reaction source"
                    );
                    return Ok(tokens);
                }
                _ => tokens.push(token),
            }
        }
    }

    /// Convenience wrapper around [`lex_all`](Self::lex_all) for in-memory text.
    pub fn tokenize(&mut self, source: &str) -> Result<Vec<Token>, LexError> {
        self.lex_all(&mut CharStream::new(source))
    }

    fn finish_at_end_of_input(
        &mut self,
        state: ScanState,
        buffer: &str,
        line: usize,
    ) -> Result<Token, LexError> {
        match state {
            ScanState::Start | ScanState::Comment => Ok(Token::EndOfFile),
            ScanState::MaybeArrow => Ok(Token::Punct(Punct::Minus)),
            ScanState::MaybeComment => Ok(Token::Error('/')),
            ScanState::Quoted => Err(LexError::UnterminatedIdentifier { line }),
            ScanState::Word => Ok(Token::Ident(self.table.intern(buffer)?)),
            ScanState::Number => parse_number(buffer, line),
        }
    }
}

fn unit_of(buffer: &str, next: char) -> Option<Unit> {
    match (buffer, next) {
        ("u", 'M') => Some(Unit::Micromolar),
        ("m", 'M') => Some(Unit::Millimolar),
        _ => None,
    }
}

fn keyword_of(word: &str) -> Option<Keyword> {
    Keyword::ALL.into_iter().find(|k| k.as_str() == word)
}

fn parse_number(text: &str, line: usize) -> Result<Token, LexError> {
    text.parse::<f64>()
        .map(Token::Number)
        .map_err(|_| LexError::InvalidNumber {
            text: text.to_string(),
            line,
        })
}
