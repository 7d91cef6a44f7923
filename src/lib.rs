//! # vesicle-kinetics
//!
//! Stochastic simulation of enzymatic reactions inside a spherical vesicle.
//!
//! A reaction file declares populations, sizes, speeds and kinetics:
//!
//! ```text
//! init("E1") = 30;
//! diametre("E1") = 5;
//! vitesse("E1") = 2;
//! "E1" : "S1" -> "P1" | 200mM - 100;
//! ```
//!
//! The [`Lexer`] and [`Parser`] turn it into [`ReactionRule`]s and
//! [`SetupInstruction`]s, the [`WorldBuilder`] lays the molecules out inside the
//! vesicle, and [`Simulation::advance_tick`] moves them, detects collisions and
//! applies reactions one discrete step at a time. Rendering is left to the caller,
//! which reads [`Simulation::snapshot`] between ticks.

pub mod error;
pub mod lexer;
pub mod molecule;
pub mod parser;
pub mod reaction;
pub mod simulation;
pub mod symbols;
pub mod token;
pub mod world;

pub use error::*;
pub use lexer::*;
pub use molecule::*;
pub use parser::*;
pub use reaction::*;
pub use simulation::*;
pub use symbols::*;
pub use token::*;
pub use world::*;
