//! Molecule state owned by the [`Simulation`](crate::Simulation).

use crate::reaction::{MoleculeId, ReactionRule};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// An enzyme-substrate complex waiting to resolve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Binding {
    /// The rule that matched when the pair fused.
    pub rule: ReactionRule,
    /// The substrate that was absorbed; it comes back if the complex falls apart.
    pub substrate_id: MoleculeId,
}

/// A single molecule inside the vesicle.
///
/// Molecules have no stable identity: they are addressed by their index in the
/// simulation's collection, and partners are found by spatial scan.
#[derive(Clone, Debug, PartialEq)]
pub struct Molecule {
    pub type_id: MoleculeId,
    pub diameter: f32,
    /// Step length of the random walk, per tick.
    pub speed: f32,
    /// Position relative to the vesicle center.
    pub position: Vec3,
    pub binding: Option<Binding>,
    pub(crate) seen_this_tick: bool,
    pub(crate) marked_for_removal: bool,
}

impl Molecule {
    pub fn new(type_id: MoleculeId, diameter: f32, speed: f32, position: Vec3) -> Self {
        Self {
            type_id,
            diameter,
            speed,
            position,
            binding: None,
            seen_this_tick: false,
            marked_for_removal: false,
        }
    }

    pub fn radius(&self) -> f32 {
        self.diameter / 2.0
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// True when a sphere of this molecule's size centered at `at` overlaps or
    /// just touches `other`.
    pub fn touches(&self, at: Vec3, other: &Molecule) -> bool {
        at.distance(other.position) <= self.radius() + other.radius()
    }

    pub fn snapshot(&self) -> MoleculeSnapshot {
        MoleculeSnapshot {
            type_id: self.type_id,
            diameter: self.diameter,
            position: self.position,
            bound: self.is_bound(),
        }
    }
}

/// Read-only view of a molecule handed to renderers and test harnesses.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoleculeSnapshot {
    pub type_id: MoleculeId,
    pub diameter: f32,
    pub position: Vec3,
    pub bound: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_includes_exact_touch() {
        let a = Molecule::new(1, 10.0, 0.0, Vec3::ZERO);
        let b = Molecule::new(2, 6.0, 0.0, Vec3::new(8.0, 0.0, 0.0));
        assert!(a.touches(Vec3::ZERO, &b));
        assert!(!a.touches(Vec3::new(-0.5, 0.0, 0.0), &b));
    }
}
