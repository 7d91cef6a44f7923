//! Error types for lexing, parsing and simulation setup.

use crate::token::TokenKind;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that end a lexing session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    /// Every slot of the identifier table is taken.
    #[error("identifier table is full ({capacity} slots)")]
    TableFull { capacity: usize },

    #[error("unexpected character {ch:?} on line {line}")]
    UnexpectedCharacter { ch: char, line: usize },

    #[error("quoted identifier is not closed before end of input (line {line})")]
    UnterminatedIdentifier { line: usize },

    #[error("malformed number {text:?} on line {line}")]
    InvalidNumber { text: String, line: usize },
}

/// A required token was missing at a grammar position.
///
/// `expected` names the position (e.g. `"'->' after substrates"`), `found` is the
/// kind of the token that was there instead, or `None` if the input ran out.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("syntax error: expected {expected}, found {}", describe(.found))]
pub struct SyntaxError {
    pub expected: &'static str,
    pub found: Option<TokenKind>,
}

fn describe(found: &Option<TokenKind>) -> String {
    match found {
        Some(kind) => format!("{kind:?}"),
        None => "end of input".to_string(),
    }
}

/// Everything that can abort [`Simulation::init`](crate::Simulation::init).
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The requested population does not fit on the starting lattice.
    #[error(
        "{requested} molecules requested but the vesicle only holds {available} starting positions"
    )]
    Overcrowded { requested: usize, available: usize },

    /// The molecules are so small relative to the vesicle that the starting
    /// lattice would exceed [`SimulationConfig::max_lattice_points`](crate::SimulationConfig).
    #[error("starting lattice would need {points} points, the limit is {limit}")]
    LatticeTooLarge { points: usize, limit: usize },
}
