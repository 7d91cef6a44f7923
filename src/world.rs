//! Turns parsed setup instructions into the initial molecule population.
//!
//! Starting positions come from a cubic lattice centered on the vesicle. The
//! lattice size is a sphere-packing estimate: the usable vesicle volume divided
//! by the volume of one molecule of the largest diameter. Positions are shuffled
//! before molecules are placed so that no type is biased towards a region.

use crate::error::SimulationError;
use crate::molecule::Molecule;
use crate::reaction::{MoleculeId, ReactionRule, SetupInstruction};
use crate::simulation::SimulationConfig;
use crate::token::Keyword;
use bevy_math::primitives::{Measured3d, Sphere};
use glam::Vec3;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

/// Merged setup of one molecule type.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Species {
    pub count: usize,
    /// 0 when no `diametre` instruction names this type.
    pub diameter: f32,
    /// 0 when no `vitesse` instruction names this type.
    pub speed: f32,
}

/// The initial state produced by a [`WorldBuilder`].
#[derive(Clone, Debug, Default)]
pub struct World {
    pub molecules: Vec<Molecule>,
    pub species: BTreeMap<MoleculeId, Species>,
    pub molecule_type_ids: Vec<MoleculeId>,
    pub max_molecule_diameter: f32,
}

/// Lays out the initial population according to a [`SimulationConfig`].
pub struct WorldBuilder<'a> {
    config: &'a SimulationConfig,
}

impl<'a> WorldBuilder<'a> {
    pub fn new(config: &'a SimulationConfig) -> Self {
        Self { config }
    }

    /// Builds the population. `reactions` only contribute the list of molecule
    /// types; the population comes from `instructions`.
    pub fn build<R: Rng + ?Sized>(
        &self,
        reactions: &[ReactionRule],
        instructions: &[SetupInstruction],
        rng: &mut R,
    ) -> Result<World, SimulationError> {
        let max_molecule_diameter = max_diameter(instructions);
        let species = merge_species(instructions);

        let spacing = if max_molecule_diameter > 0.0 {
            max_molecule_diameter
        } else {
            self.config.default_diameter
        };
        let (vesicle, margin) = (self.config.vesicle_diameter, self.config.boundary_margin);

        // Both checks run on the estimate so that nothing is allocated for a
        // layout that cannot be used.
        let requested = total_population(&species);
        let bound = lattice_point_bound(vesicle, spacing, margin);
        if requested > bound {
            return Err(SimulationError::Overcrowded {
                requested,
                available: bound,
            });
        }
        if bound > self.config.max_lattice_points {
            return Err(SimulationError::LatticeTooLarge {
                points: bound,
                limit: self.config.max_lattice_points,
            });
        }

        let mut positions = lattice_positions(vesicle, spacing, margin);
        positions.shuffle(rng);

        let molecules = self.populate(&species, &positions)?;
        tracing::info!(
            molecules = molecules.len(),
            species = species.len(),
            lattice = positions.len(),
            spacing,
            "built initial population"
        );

        Ok(World {
            molecules,
            species,
            molecule_type_ids: molecule_type_ids(reactions),
            max_molecule_diameter,
        })
    }

    /// One molecule per population unit, in increasing type id order.
    fn populate(
        &self,
        species: &BTreeMap<MoleculeId, Species>,
        positions: &[Vec3],
    ) -> Result<Vec<Molecule>, SimulationError> {
        let requested = total_population(species);
        if requested > positions.len() {
            return Err(SimulationError::Overcrowded {
                requested,
                available: positions.len(),
            });
        }

        let mut slots = positions.iter();
        let mut molecules = Vec::with_capacity(requested);
        for (&type_id, s) in species {
            let (diameter, speed) = self.resolve(s);
            for position in slots.by_ref().take(s.count) {
                molecules.push(Molecule::new(type_id, diameter, speed, *position));
            }
        }
        Ok(molecules)
    }

    /// Substitutes the structural defaults for unspecified sizes and speeds.
    pub fn resolve(&self, species: &Species) -> (f32, f32) {
        let diameter = if species.diameter > 0.0 {
            species.diameter
        } else {
            self.config.default_diameter
        };
        let speed = if species.speed > 0.0 {
            species.speed
        } else {
            self.config.default_speed
        };
        (diameter, speed)
    }
}

/// Largest `diametre` value, or 0 if there is none.
pub fn max_diameter(instructions: &[SetupInstruction]) -> f32 {
    instructions
        .iter()
        .filter(|i| i.kind == Keyword::Diameter)
        .map(|i| i.value as f32)
        .fold(0.0, f32::max)
}

/// Distinct molecule types mentioned by any rule, in order of first mention.
pub fn molecule_type_ids(reactions: &[ReactionRule]) -> Vec<MoleculeId> {
    let mut ids = Vec::new();
    for id in reactions.iter().flat_map(ReactionRule::participants) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Folds instructions per molecule type: populations add up, sizes and speeds
/// keep the last value given.
pub fn merge_species(instructions: &[SetupInstruction]) -> BTreeMap<MoleculeId, Species> {
    let mut species: BTreeMap<MoleculeId, Species> = BTreeMap::new();
    for instruction in instructions {
        let entry = species.entry(instruction.molecule_id).or_default();
        match instruction.kind {
            Keyword::Init => {
                entry.count = entry.count.saturating_add(instruction.value as usize);
            }
            Keyword::Diameter => entry.diameter = instruction.value as f32,
            Keyword::Speed => entry.speed = instruction.value as f32,
        }
    }
    species
}

/// Molecules requested over all species, saturating at `usize::MAX`.
pub fn total_population(species: &BTreeMap<MoleculeId, Species>) -> usize {
    species
        .values()
        .fold(0, |total, s| total.saturating_add(s.count))
}

/// Usable radius and points per axis of the starting lattice, or `None` when
/// not even one molecule of `spacing` fits.
fn lattice_extent(vesicle_diameter: f32, spacing: f32, margin: f32) -> Option<(f32, f32)> {
    let radius = vesicle_diameter / 2.0 - spacing / 2.0 - margin;
    if radius <= 0.0 || spacing <= 0.0 {
        return None;
    }

    let usable = Sphere::new(radius).volume();
    let per_molecule = Sphere::new(spacing / 2.0).volume();
    Some((radius, (usable / per_molecule).floor().cbrt()))
}

/// Upper bound on the length of [`lattice_positions`]: the full cube of
/// candidate points, before those outside the vesicle are dropped.
pub fn lattice_point_bound(vesicle_diameter: f32, spacing: f32, margin: f32) -> usize {
    lattice_extent(vesicle_diameter, spacing, margin).map_or(0, |(_, side)| {
        (side.ceil() as usize).saturating_pow(3)
    })
}

/// Candidate starting positions, unshuffled.
///
/// Points are spaced by `spacing` and kept only if they lie within
/// `vesicle_diameter / 2 - spacing / 2 - margin` of the center.
pub fn lattice_positions(vesicle_diameter: f32, spacing: f32, margin: f32) -> Vec<Vec3> {
    let Some((radius, side)) = lattice_extent(vesicle_diameter, spacing, margin) else {
        return Vec::new();
    };
    let steps = side.ceil() as usize;

    let coord = |i: usize| (2.0 * i as f32 + 1.0 - side) * spacing / 2.0;
    let mut positions = Vec::new();
    for x in 0..steps {
        for y in 0..steps {
            for z in 0..steps {
                let p = Vec3::new(coord(x), coord(y), coord(z));
                if p.length() <= radius {
                    positions.push(p);
                }
            }
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn instr(kind: Keyword, molecule_id: MoleculeId, value: f64) -> SetupInstruction {
        SetupInstruction {
            kind,
            molecule_id,
            value,
        }
    }

    #[test]
    fn populations_add_and_sizes_overwrite() {
        let species = merge_species(&[
            instr(Keyword::Init, 7, 10.0),
            instr(Keyword::Diameter, 7, 30.0),
            instr(Keyword::Init, 7, 10.0),
            instr(Keyword::Diameter, 7, 50.0),
            instr(Keyword::Speed, 8, 5.0),
        ]);
        assert_eq!(
            species[&7],
            Species {
                count: 20,
                diameter: 50.0,
                speed: 0.0
            }
        );
        assert_eq!(species[&8].count, 0);
    }

    #[test]
    fn max_diameter_defaults_to_zero() {
        assert_eq!(max_diameter(&[instr(Keyword::Init, 1, 3.0)]), 0.0);
        assert_eq!(
            max_diameter(&[
                instr(Keyword::Diameter, 1, 20.0),
                instr(Keyword::Diameter, 2, 50.0)
            ]),
            50.0
        );
    }

    #[test]
    fn lattice_points_are_spaced_and_inside() {
        let positions = lattice_positions(620.0, 50.0, 10.0);
        let radius = 620.0 / 2.0 - 25.0 - 10.0;
        assert!(!positions.is_empty());
        assert!(positions.iter().all(|p| p.length() <= radius));
        for (i, a) in positions.iter().enumerate() {
            for b in &positions[i + 1..] {
                assert!(a.distance(*b) >= 50.0 - 1e-3);
            }
        }
    }

    #[test]
    fn lattice_is_empty_when_nothing_fits() {
        assert!(lattice_positions(20.0, 50.0, 10.0).is_empty());
        assert_eq!(lattice_point_bound(20.0, 50.0, 10.0), 0);
    }

    #[test]
    fn point_bound_covers_the_lattice() {
        for spacing in [10.0, 23.0, 50.0, 120.0] {
            let bound = lattice_point_bound(620.0, spacing, 10.0);
            assert!(lattice_positions(620.0, spacing, 10.0).len() <= bound);
        }
    }

    #[test]
    fn huge_populations_saturate() {
        let species = merge_species(&[
            instr(Keyword::Init, 1, 1e30),
            instr(Keyword::Init, 1, 1.0),
            instr(Keyword::Init, 2, 1e30),
        ]);
        assert_eq!(species[&1].count, usize::MAX);
        assert_eq!(total_population(&species), usize::MAX);
    }

    #[test]
    fn tiny_spacing_is_refused_before_allocating() {
        let config = SimulationConfig::default();
        let instructions = [
            instr(Keyword::Init, 1, 1.0),
            instr(Keyword::Diameter, 1, 0.1),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = WorldBuilder::new(&config)
            .build(&[], &instructions, &mut rng)
            .unwrap_err();
        match err {
            SimulationError::LatticeTooLarge { points, limit } => {
                assert_eq!(limit, config.max_lattice_points);
                assert!(points > limit);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
