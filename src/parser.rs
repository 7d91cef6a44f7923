//! Recursive-descent parser for reaction files.
//!
//! The parser eats a token queue from the front. Inside one statement it consumes
//! unconditionally, so a failed statement leaves the queue wherever the failure
//! happened. [`Parser::parse`] propagates the first statement error; the
//! `*_series` entry points record it, drop one more token and carry on.
//!
//! # Grammar
//!
//! ```text
//! reaction    := IDENT ':' idents '->' idents '|' conc [',' conc] '-' NUM ';' [END]
//! idents      := IDENT ['+' IDENT]
//! conc        := NUM UNIT
//! instruction := KEYWORD '(' IDENT ')' '=' NUM ';' [END]
//! ```

use crate::error::SyntaxError;
use crate::reaction::{MoleculeId, Probabilities, ReactionRule, SetupInstruction};
use crate::token::{Keyword, Punct, Token, TokenKind, Unit};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Millimolar per micromolar.
const MICROMOLAR_TO_MILLIMOLAR: f64 = 1e-3;

/// Conversion from the DSL's units to internal simulation units.
///
/// `diametre` and `vitesse` values are multiplied by these factors when parsed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConversion {
    pub diameter_scale: f64,
    pub speed_scale: f64,
}

impl Default for UnitConversion {
    fn default() -> Self {
        Self {
            diameter_scale: 10.0,
            speed_scale: 5.0,
        }
    }
}

impl UnitConversion {
    /// Leaves every value as written.
    pub const IDENTITY: Self = Self {
        diameter_scale: 1.0,
        speed_scale: 1.0,
    };

    fn apply(&self, kind: Keyword, value: f64) -> f64 {
        match kind {
            Keyword::Init => value,
            Keyword::Diameter => value * self.diameter_scale,
            Keyword::Speed => value * self.speed_scale,
        }
    }
}

/// Statements recovered by a series parse, plus the errors that were skipped.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesOutcome<T> {
    pub parsed: Vec<T>,
    pub errors: Vec<SyntaxError>,
}

impl<T> Default for SeriesOutcome<T> {
    fn default() -> Self {
        Self {
            parsed: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Recursive-descent parser over a queue of lexed tokens.
#[derive(Clone, Debug, Default)]
pub struct Parser {
    tokens: VecDeque<Token>,
    units: UnitConversion,
}

impl Parser {
    /// Queues `tokens` for parsing with the default [`UnitConversion`].
    pub fn new(tokens: impl IntoIterator<Item = Token>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
            units: UnitConversion::default(),
        }
    }

    /// Replaces the factors applied to `diametre` and `vitesse` values.
    pub fn with_units(mut self, units: UnitConversion) -> Self {
        self.units = units;
        self
    }

    /// Tokens not consumed yet.
    pub fn remaining(&self) -> usize {
        self.tokens.len()
    }

    fn front_kind(&self) -> Option<TokenKind> {
        self.tokens.front().map(Token::kind)
    }

    fn discard_one(&mut self) -> Option<Token> {
        self.tokens.pop_front()
    }

    fn at_end(&self) -> bool {
        matches!(self.front_kind(), None | Some(TokenKind::EndOfFile))
    }

    // ---- entry points ----

    /// Parses every statement up to END_OF_FILE.
    ///
    /// Tokens that cannot start a statement (blank-line END tokens, strays) are
    /// dropped. The first malformed statement aborts the parse.
    pub fn parse(
        &mut self,
    ) -> Result<(Vec<ReactionRule>, Vec<SetupInstruction>), SyntaxError> {
        let mut reactions = Vec::new();
        let mut instructions = Vec::new();

        while let Some(token) = self.tokens.front().copied() {
            match token {
                Token::Keyword(_) => instructions.push(self.instruction()?),
                Token::Ident(_) => reactions.push(self.reaction()?),
                Token::EndOfFile => break,
                Token::End => {
                    self.discard_one();
                }
                other => {
                    tracing::debug!(token = %other, "skipping token that cannot start a statement");
                    self.discard_one();
                }
            }
        }

        tracing::debug!(
            reactions = reactions.len(),
            instructions = instructions.len(),
            "parsed reaction source"
        );
        Ok((reactions, instructions))
    }

    /// Parses reactions until the input runs out, skipping malformed ones.
    pub fn reactions_series(&mut self) -> SeriesOutcome<ReactionRule> {
        self.series(Self::reaction)
    }

    /// Parses instructions until the input runs out, skipping malformed ones.
    pub fn instructions_series(&mut self) -> SeriesOutcome<SetupInstruction> {
        self.series(Self::instruction)
    }

    fn series<T>(
        &mut self,
        mut statement: impl FnMut(&mut Self) -> Result<T, SyntaxError>,
    ) -> SeriesOutcome<T> {
        let mut outcome = SeriesOutcome::default();
        while !self.at_end() {
            match statement(self) {
                Ok(item) => outcome.parsed.push(item),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed statement");
                    self.discard_one();
                    outcome.errors.push(err);
                }
            }
        }
        outcome
    }

    // ---- statements ----

    /// `"e" : "s" -> "p" | 200uM - 100;`
    pub fn reaction(&mut self) -> Result<ReactionRule, SyntaxError> {
        let enzyme_id = self.expect_ident("enzyme")?;
        self.expect_punct(Punct::Colon, "':' after enzyme")?;
        let substrate_ids = self.idents_series("substrate")?;
        self.expect_punct(Punct::Arrow, "'->' after substrates")?;
        let product_ids = self.idents_series("product")?;
        self.expect_punct(Punct::VBar, "'|' after products")?;
        let mm = self.concentration_series()?;
        self.expect_punct(Punct::Minus, "'-' before kcat")?;
        let kcat = self.expect_value(TokenKind::Number, "kcat")?;
        self.expect_punct(Punct::Semicolon, "';' after reaction")?;
        self.skip_line_end();

        Ok(ReactionRule {
            enzyme_id,
            substrate_ids,
            product_ids,
            mm,
            kcat,
            probabilities: Probabilities::default(),
        })
    }

    /// `init("e") = 30;`
    pub fn instruction(&mut self) -> Result<SetupInstruction, SyntaxError> {
        let kind = self.expect_keyword("instruction keyword")?;
        self.expect_punct(Punct::ParenthesisOpen, "'(' after keyword")?;
        let molecule_id = self.expect_ident("instruction target")?;
        self.expect_punct(Punct::ParenthesisClose, "')' after target")?;
        self.expect_punct(Punct::Equal, "'=' after target")?;
        let value = self.expect_value(TokenKind::Number, "instruction value")?;
        self.expect_punct(Punct::Semicolon, "';' after instruction")?;
        self.skip_line_end();

        Ok(SetupInstruction {
            kind,
            molecule_id,
            value: self.units.apply(kind, value),
        })
    }

    /// One identifier, optionally followed by `+` and a second one.
    pub fn idents_series(
        &mut self,
        label: &'static str,
    ) -> Result<(MoleculeId, Option<MoleculeId>), SyntaxError> {
        let first = self.expect_ident(label)?;
        let second = if self.try_consume_punct(Punct::Plus) {
            Some(self.expect_ident(label)?)
        } else {
            None
        };
        Ok((first, second))
    }

    /// One or two `number unit` pairs, normalized to millimolar.
    pub fn concentration_series(&mut self) -> Result<(f64, f64), SyntaxError> {
        let first = self.concentration()?;
        let second = if self.try_consume_punct(Punct::Comma) {
            self.concentration()?
        } else {
            0.0
        };
        Ok((first, second))
    }

    fn concentration(&mut self) -> Result<f64, SyntaxError> {
        let value = self.expect_value(TokenKind::Number, "concentration value")?;
        match self.expect_unit("concentration unit")? {
            Unit::Micromolar => Ok(value * MICROMOLAR_TO_MILLIMOLAR),
            Unit::Millimolar => Ok(value),
        }
    }

    fn skip_line_end(&mut self) {
        if self.front_kind() == Some(TokenKind::End) {
            self.discard_one();
        }
    }

    // ---- token primitives ----

    /// Pops the front token if `payload` accepts it. Otherwise the queue is left
    /// alone and the error names `label` and the kind found there.
    fn expect_with<T>(
        &mut self,
        label: &'static str,
        payload: impl FnOnce(Token) -> Option<T>,
    ) -> Result<T, SyntaxError> {
        let front = self.tokens.front().copied();
        match front.and_then(payload) {
            Some(value) => {
                self.discard_one();
                Ok(value)
            }
            None => Err(SyntaxError {
                expected: label,
                found: front.as_ref().map(Token::kind),
            }),
        }
    }

    /// Pops the front token if it has the given kind and returns its value.
    pub fn expect_value(
        &mut self,
        kind: TokenKind,
        label: &'static str,
    ) -> Result<f64, SyntaxError> {
        self.expect_with(label, |t| (t.kind() == kind).then(|| t.value()))
    }

    pub fn expect_ident(&mut self, label: &'static str) -> Result<MoleculeId, SyntaxError> {
        self.expect_with(label, |t| match t {
            Token::Ident(id) => Some(id),
            _ => None,
        })
    }

    pub fn expect_keyword(&mut self, label: &'static str) -> Result<Keyword, SyntaxError> {
        self.expect_with(label, |t| match t {
            Token::Keyword(k) => Some(k),
            _ => None,
        })
    }

    pub fn expect_unit(&mut self, label: &'static str) -> Result<Unit, SyntaxError> {
        self.expect_with(label, |t| match t {
            Token::Unit(u) => Some(u),
            _ => None,
        })
    }

    /// Pops the front token if it is `symbol`. Leaves the queue alone otherwise.
    pub fn try_consume_punct(&mut self, symbol: Punct) -> bool {
        if self.tokens.front() == Some(&Token::Punct(symbol)) {
            self.discard_one();
            true
        } else {
            false
        }
    }

    pub fn try_consume_keyword(&mut self, keyword: Keyword) -> bool {
        if self.tokens.front() == Some(&Token::Keyword(keyword)) {
            self.discard_one();
            true
        } else {
            false
        }
    }

    pub fn expect_punct(&mut self, symbol: Punct, label: &'static str) -> Result<(), SyntaxError> {
        if self.try_consume_punct(symbol) {
            Ok(())
        } else {
            Err(SyntaxError {
                expected: label,
                found: self.front_kind(),
            })
        }
    }
}
