//! Parsed statements: reaction rules with their derived per-tick
//! probabilities, and setup instructions.

use crate::token::Keyword;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An interned molecule type id, as handed out by the
/// [`IdentifierTable`](crate::IdentifierTable).
pub type MoleculeId = u32;

/// kcat is divided by this to get the per-tick unbinding probability.
pub const KCAT_SCALE: f64 = 10_000.0;

/// Ratio between unbinding towards the product and back to the substrate.
pub const REVERSE_RATIO: f64 = 10.0;

/// Saturation constant of the binding probability.
pub const SATURATION: f64 = 0.448;

/// Per-tick probabilities derived from a rule's kinetics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Probabilities {
    /// Enzyme and substrate bind on contact.
    pub p1: f64,
    /// A bound complex falls back to enzyme + substrate.
    pub p2: f64,
    /// A bound complex releases its products.
    pub p3: f64,
}

impl Probabilities {
    /// Lumped-parameter heuristic:
    ///
    /// - `p3 = kcat / 10000`
    /// - `p2 = p3 / 10`
    /// - `p1 = (p2 + p3) / (0.448 * (1 + (p2 + p3)^2) * concentration)`
    ///
    /// `p1` is 0 when the concentration is not positive.
    pub fn from_kinetics(kcat: f64, concentration: f64) -> Self {
        let p3 = kcat / KCAT_SCALE;
        let p2 = p3 / REVERSE_RATIO;
        let sum = p2 + p3;
        let p1 = if concentration > 0.0 {
            sum / (SATURATION * (1.0 + sum * sum) * concentration)
        } else {
            0.0
        };
        Self { p1, p2, p3 }
    }
}

/// `enzyme : s1 [+ s2] -> p1 [+ p2] | c1 unit [, c2 unit] - kcat;`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReactionRule {
    pub enzyme_id: MoleculeId,
    pub substrate_ids: (MoleculeId, Option<MoleculeId>),
    pub product_ids: (MoleculeId, Option<MoleculeId>),
    /// Concentrations in millimolar. The second slot is 0 when absent.
    pub mm: (f64, f64),
    pub kcat: f64,
    /// Zero until [`derive_probabilities`](Self::derive_probabilities) runs.
    pub probabilities: Probabilities,
}

impl ReactionRule {
    pub fn derive_probabilities(&mut self) {
        self.probabilities = Probabilities::from_kinetics(self.kcat, self.mm.0);
    }

    pub fn substrates(&self) -> impl Iterator<Item = MoleculeId> {
        std::iter::once(self.substrate_ids.0).chain(self.substrate_ids.1)
    }

    pub fn products(&self) -> impl Iterator<Item = MoleculeId> {
        std::iter::once(self.product_ids.0).chain(self.product_ids.1)
    }

    /// Every molecule type the rule mentions, enzyme first.
    pub fn participants(&self) -> impl Iterator<Item = MoleculeId> {
        std::iter::once(self.enzyme_id)
            .chain(self.substrates())
            .chain(self.products())
    }

    /// True when `enzyme` catalyses this rule and `substrate` is one of its substrates.
    pub fn pairs(&self, enzyme: MoleculeId, substrate: MoleculeId) -> bool {
        self.enzyme_id == enzyme && self.substrates().any(|s| s == substrate)
    }
}

impl fmt::Display for ReactionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.enzyme_id, self.substrate_ids.0)?;
        if let Some(s) = self.substrate_ids.1 {
            write!(f, " + {s}")?;
        }
        write!(f, " -> {}", self.product_ids.0)?;
        if let Some(p) = self.product_ids.1 {
            write!(f, " + {p}")?;
        }
        write!(f, " | {}mM", self.mm.0)?;
        if self.mm.1 != 0.0 {
            write!(f, ", {}mM", self.mm.1)?;
        }
        write!(f, " - {}", self.kcat)
    }
}

/// `init(x) = n;`, `diametre(x) = d;` or `vitesse(x) = v;`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetupInstruction {
    pub kind: Keyword,
    pub molecule_id: MoleculeId,
    /// Already converted to internal units for diameters and speeds.
    pub value: f64,
}

impl fmt::Display for SetupInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) = {}",
            self.kind.as_str(),
            self.molecule_id,
            self.value
        )
    }
}
