//! The stochastic simulation engine.
//!
//! [`Simulation`] owns the molecule collection and advances it one tick at a time.
//! Every tick each molecule takes one random-walk step, may bind a colliding
//! partner, and a bound complex may fall apart or release its products.
//!
//! # Random stream
//!
//! All randomness comes from one seeded [`ChaCha8Rng`]. It is consumed in a fixed
//! order: the lattice shuffle during construction, then for every processed
//! molecule an angle, a sign, and at most one threshold draw. Together with the
//! alternating sweep order this makes a run fully reproducible from its seed.

use crate::error::SimulationError;
use crate::lexer::Lexer;
use crate::molecule::{Binding, Molecule, MoleculeSnapshot};
use crate::parser::{Parser, UnitConversion};
use crate::reaction::{MoleculeId, ReactionRule};
use crate::symbols::DEFAULT_CAPACITY;
use crate::world::{Species, WorldBuilder};
use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Configuration for building and running a simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Diameter of the spherical vesicle, centered at the origin.
    pub vesicle_diameter: f32,
    /// Extra clearance between the starting lattice and the vesicle wall.
    pub boundary_margin: f32,
    /// Diameter of a molecule type without a `diametre` instruction.
    pub default_diameter: f32,
    /// Speed of a molecule type without a `vitesse` instruction.
    pub default_speed: f32,
    /// Slots in the identifier table.
    pub identifier_capacity: usize,
    /// Largest starting lattice that will be generated.
    pub max_lattice_points: usize,
    pub units: UnitConversion,
    /// Seed of the random stream. `None` seeds from the operating system.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            vesicle_diameter: 620.0,
            boundary_margin: 10.0,
            default_diameter: 10.0,
            default_speed: 5.0,
            identifier_capacity: DEFAULT_CAPACITY,
            max_lattice_points: 2_000_000,
            units: UnitConversion::default(),
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Fixes the random stream so that runs are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Order in which molecules are visited during a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepDirection {
    Forward,
    Reverse,
}

impl SweepDirection {
    fn toggled(self) -> Self {
        match self {
            SweepDirection::Forward => SweepDirection::Reverse,
            SweepDirection::Reverse => SweepDirection::Forward,
        }
    }
}

/// What happened during one call to [`Simulation::advance_tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Enzyme-substrate pairs that fused; each removed one substrate.
    pub fusions: usize,
    /// Complexes that resolved.
    pub releases: usize,
    /// Molecules created by those resolutions.
    pub released_molecules: usize,
}

/// A running simulation. Owns the molecules inside the vesicle together with
/// the rules and the random stream that move them.
///
/// Build one with [`Simulation::init`] or [`Simulation::from_source`], then call
/// [`Simulation::advance_tick`] once per frame and read
/// [`Simulation::snapshot`] to render.
#[derive(Clone, Debug)]
pub struct Simulation {
    config: SimulationConfig,
    molecules: Vec<Molecule>,
    reactions: Vec<ReactionRule>,
    species: BTreeMap<MoleculeId, Species>,
    molecule_type_ids: Vec<MoleculeId>,
    names: BTreeMap<MoleculeId, String>,
    max_molecule_diameter: f32,
    tick_count: u64,
    sweep: SweepDirection,
    rng: ChaCha8Rng,
}

impl Simulation {
    /// Reads the reaction file at `path` and builds the initial state.
    pub fn init(
        path: impl AsRef<Path>,
        config: SimulationConfig,
    ) -> Result<Self, SimulationError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| SimulationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loading reaction file");
        Self::from_source(&source, config)
    }

    /// Builds the initial state from reaction source text.
    pub fn from_source(source: &str, config: SimulationConfig) -> Result<Self, SimulationError> {
        let mut lexer = Lexer::with_capacity(config.identifier_capacity);
        let tokens = lexer.tokenize(source)?;
        let (mut reactions, instructions) = Parser::new(tokens).with_units(config.units).parse()?;

        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let world = WorldBuilder::new(&config).build(&reactions, &instructions, &mut rng)?;

        for rule in &mut reactions {
            rule.derive_probabilities();
            tracing::debug!(
                %rule,
                p1 = rule.probabilities.p1,
                p2 = rule.probabilities.p2,
                p3 = rule.probabilities.p3,
                "derived reaction probabilities"
            );
        }

        tracing::info!(
            reactions = reactions.len(),
            molecule_types = world.molecule_type_ids.len(),
            molecules = world.molecules.len(),
            "simulation ready"
        );

        Ok(Self {
            config,
            molecules: world.molecules,
            reactions,
            species: world.species,
            molecule_type_ids: world.molecule_type_ids,
            names: lexer.table().names(),
            max_molecule_diameter: world.max_molecule_diameter,
            tick_count: 0,
            sweep: SweepDirection::Forward,
            rng,
        })
    }

    /// Replaces the molecule collection, e.g. to replay a fixed layout.
    pub fn with_molecules(mut self, molecules: Vec<Molecule>) -> Self {
        self.molecules = molecules;
        for m in &mut self.molecules {
            m.seen_this_tick = false;
            m.marked_for_removal = false;
        }
        self
    }

    // ---- accessors ----

    /// Configuration the simulation was built with.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Every molecule, in processing order.
    pub fn molecules(&self) -> &[Molecule] {
        &self.molecules
    }

    /// Render-ready copy of every molecule.
    pub fn snapshot(&self) -> Vec<MoleculeSnapshot> {
        self.molecules.iter().map(Molecule::snapshot).collect()
    }

    /// Rules with their derived probabilities.
    pub fn reactions(&self) -> &[ReactionRule] {
        &self.reactions
    }

    /// Merged setup per molecule type.
    pub fn species(&self) -> &BTreeMap<MoleculeId, Species> {
        &self.species
    }

    /// Distinct molecule types mentioned by the reactions.
    pub fn molecule_type_ids(&self) -> &[MoleculeId] {
        &self.molecule_type_ids
    }

    /// Every identifier interned while lexing, by id.
    pub fn names(&self) -> &BTreeMap<MoleculeId, String> {
        &self.names
    }

    /// Name of the molecule type `id`.
    pub fn name_of(&self, id: MoleculeId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Id of the molecule type called `name`.
    pub fn id_of(&self, name: &str) -> Option<MoleculeId> {
        self.names
            .iter()
            .find_map(|(&id, n)| (n == name).then_some(id))
    }

    pub fn vesicle_diameter(&self) -> f32 {
        self.config.vesicle_diameter
    }

    /// Largest `diametre` value after unit conversion, 0 if none was given.
    pub fn max_molecule_diameter(&self) -> f32 {
        self.max_molecule_diameter
    }

    /// Ticks advanced so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Direction of the next tick's sweep.
    pub fn sweep_direction(&self) -> SweepDirection {
        self.sweep
    }

    /// Number of molecules of the given type, bound or not.
    pub fn population_of(&self, type_id: MoleculeId) -> usize {
        self.molecules.iter().filter(|m| m.type_id == type_id).count()
    }

    /// Number of enzyme-substrate complexes.
    pub fn bound_count(&self) -> usize {
        self.molecules.iter().filter(|m| m.is_bound()).count()
    }

    // ---- stepping ----

    /// Advances every molecule by one tick.
    ///
    /// Molecules present at the start of the tick are visited front to back on
    /// even ticks and back to front on odd ones. Molecules created during the
    /// tick are not visited until the next one.
    pub fn advance_tick(&mut self) -> TickStats {
        let mut stats = TickStats::default();
        let count = self.molecules.len();

        for step in 0..count {
            let index = match self.sweep {
                SweepDirection::Forward => step,
                SweepDirection::Reverse => count - 1 - step,
            };
            self.process(index, &mut stats);
        }

        self.molecules.retain(|m| !m.marked_for_removal);
        for m in &mut self.molecules {
            m.seen_this_tick = false;
        }
        self.sweep = self.sweep.toggled();
        self.tick_count += 1;

        tracing::debug!(
            tick = self.tick_count,
            molecules = self.molecules.len(),
            fusions = stats.fusions,
            releases = stats.releases,
            "advanced tick"
        );
        stats
    }

    fn process(&mut self, index: usize, stats: &mut TickStats) {
        if self.molecules[index].seen_this_tick {
            return;
        }
        self.molecules[index].seen_this_tick = true;

        let candidate = self.candidate_position(index);
        let contained = self.is_contained(candidate, self.molecules[index].diameter);

        if let Some(binding) = self.molecules[index].binding {
            if contained {
                self.molecules[index].position = candidate;
            }
            self.resolve_binding(index, binding, stats);
            return;
        }

        // Rejected steps leave the molecule where it is.
        if !contained {
            return;
        }

        if let Some(partner) = self.first_contact(index, candidate)
            && let Some((enzyme, substrate, rule)) = self.match_pair(index, partner)
        {
            let draw: f64 = self.rng.gen_range(0.0..1.0);
            if draw < rule.probabilities.p1 {
                self.fuse(enzyme, substrate, rule);
                stats.fusions += 1;
                return;
            }
        }

        // Overlap without a reaction does not block movement.
        self.molecules[index].position = candidate;
    }

    /// One random-walk step: `speed` in a random planar direction plus `speed`
    /// up or down along Z.
    fn candidate_position(&mut self, index: usize) -> Vec3 {
        let Molecule {
            position, speed, ..
        } = self.molecules[index];
        let angle = self.rng.gen_range(0.0..360.0f32).to_radians();
        let sign = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        position + Vec3::new(speed * angle.cos(), speed * angle.sin(), speed * sign)
    }

    fn containment_radius(&self, diameter: f32) -> f32 {
        self.config.vesicle_diameter / 2.0 - diameter / 2.0
    }

    fn is_contained(&self, position: Vec3, diameter: f32) -> bool {
        position.length() <= self.containment_radius(diameter)
    }

    /// First unseen molecule touching `index` if it were at `candidate`.
    fn first_contact(&self, index: usize, candidate: Vec3) -> Option<usize> {
        let mover = &self.molecules[index];
        self.molecules
            .iter()
            .enumerate()
            .find(|&(j, other)| {
                j != index && !other.seen_this_tick && mover.touches(candidate, other)
            })
            .map(|(j, _)| j)
    }

    /// Finds a rule in which one of the two molecules is the (unbound) enzyme and
    /// the other its substrate. Returns `(enzyme, substrate, rule)`.
    fn match_pair(&self, a: usize, b: usize) -> Option<(usize, usize, ReactionRule)> {
        let (ma, mb) = (&self.molecules[a], &self.molecules[b]);
        self.reactions.iter().find_map(|rule| {
            if !ma.is_bound() && rule.pairs(ma.type_id, mb.type_id) {
                Some((a, b, *rule))
            } else if !mb.is_bound() && rule.pairs(mb.type_id, ma.type_id) {
                Some((b, a, *rule))
            } else {
                None
            }
        })
    }

    fn fuse(&mut self, enzyme: usize, substrate: usize, rule: ReactionRule) {
        let substrate_id = self.molecules[substrate].type_id;

        let s = &mut self.molecules[substrate];
        s.marked_for_removal = true;
        s.seen_this_tick = true;

        let e = &mut self.molecules[enzyme];
        e.binding = Some(Binding { rule, substrate_id });
        e.seen_this_tick = true;

        tracing::trace!(enzyme = rule.enzyme_id, substrate = substrate_id, "fused");
    }

    /// Draws once: below `p2` the substrate comes back, in `[p2, p3)` the
    /// products are released, otherwise the complex persists.
    fn resolve_binding(&mut self, index: usize, binding: Binding, stats: &mut TickStats) {
        let draw: f64 = self.rng.gen_range(0.0..1.0);
        let p = binding.rule.probabilities;
        let released: Vec<MoleculeId> = if draw < p.p2 {
            vec![binding.substrate_id]
        } else if draw < p.p3 {
            binding.rule.products().collect()
        } else {
            return;
        };

        self.molecules[index].binding = None;
        let enzyme_position = self.molecules[index].position;
        let enzyme_radius = self.molecules[index].radius();

        for (k, type_id) in released.iter().copied().enumerate() {
            let (diameter, speed) = self.geometry_of(type_id);
            // First release goes to +X, a second one to -X.
            let side = if k == 0 { 1.0 } else { -1.0 };
            let offset = Vec3::X * side * (enzyme_radius + diameter / 2.0);
            let position = (enzyme_position + offset)
                .clamp_length_max(self.containment_radius(diameter).max(0.0));

            let mut molecule = Molecule::new(type_id, diameter, speed, position);
            molecule.seen_this_tick = true;
            self.molecules.push(molecule);
        }

        stats.releases += 1;
        stats.released_molecules += released.len();
        tracing::trace!(
            enzyme = binding.rule.enzyme_id,
            released = ?released,
            "complex resolved"
        );
    }

    fn geometry_of(&self, type_id: MoleculeId) -> (f32, f32) {
        let species = self.species.get(&type_id).copied().unwrap_or_default();
        WorldBuilder::new(&self.config).resolve(&species)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULE: &str = "\"E\" : \"S\" -> \"P\" | 1uM - 100;\n";

    fn empty_sim(source: &str) -> Simulation {
        Simulation::from_source(source, SimulationConfig::default().with_seed(7)).unwrap()
    }

    fn id(sim: &Simulation, name: &str) -> MoleculeId {
        sim.id_of(name).unwrap()
    }

    #[test]
    fn rejected_step_keeps_position() {
        let sim = empty_sim(RULE);
        let e = id(&sim, "E");
        // Any step of this length leaves the vesicle.
        let mut sim = sim.with_molecules(vec![Molecule::new(e, 10.0, 1000.0, Vec3::ZERO)]);
        for _ in 0..10 {
            sim.advance_tick();
            assert_eq!(sim.molecules()[0].position, Vec3::ZERO);
        }
    }

    #[test]
    fn step_has_speed_along_z_and_in_plane() {
        let sim = empty_sim(RULE);
        let e = id(&sim, "E");
        let mut sim = sim.with_molecules(vec![Molecule::new(e, 10.0, 3.0, Vec3::ZERO)]);
        sim.advance_tick();
        let p = sim.molecules()[0].position;
        assert!((p.z.abs() - 3.0).abs() < 1e-5);
        assert!((p.truncate().length() - 3.0).abs() < 1e-4);
    }

    #[test]
    fn touching_enzyme_and_substrate_fuse() {
        let sim = empty_sim(RULE);
        let (e, s) = (id(&sim, "E"), id(&sim, "S"));
        let mut sim = sim.with_molecules(vec![
            Molecule::new(e, 10.0, 0.0, Vec3::ZERO),
            Molecule::new(s, 10.0, 0.0, Vec3::new(5.0, 0.0, 0.0)),
        ]);
        // p1 is far above 1 at micromolar concentration.
        assert!(sim.reactions()[0].probabilities.p1 > 1.0);

        let stats = sim.advance_tick();
        assert_eq!(stats.fusions, 1);
        assert_eq!(sim.molecules().len(), 1);
        let enzyme = &sim.molecules()[0];
        assert_eq!(enzyme.type_id, e);
        assert_eq!(enzyme.binding.map(|b| b.substrate_id), Some(s));
        assert!(sim.molecules().iter().all(|m| !m.marked_for_removal && !m.seen_this_tick));
    }

    #[test]
    fn substrate_visited_first_still_binds_the_enzyme() {
        let sim = empty_sim(RULE);
        let (e, s) = (id(&sim, "E"), id(&sim, "S"));
        let mut sim = sim.with_molecules(vec![
            Molecule::new(s, 10.0, 0.0, Vec3::ZERO),
            Molecule::new(e, 10.0, 0.0, Vec3::new(5.0, 0.0, 0.0)),
        ]);
        sim.advance_tick();
        assert_eq!(sim.molecules().len(), 1);
        assert_eq!(sim.molecules()[0].type_id, e);
        assert_eq!(sim.molecules()[0].position, Vec3::new(5.0, 0.0, 0.0));
        assert!(sim.molecules()[0].is_bound());
    }

    #[test]
    fn unrelated_overlap_does_not_block_movement() {
        let sim = empty_sim(RULE);
        let (s, p) = (id(&sim, "S"), id(&sim, "P"));
        let mut sim = sim.with_molecules(vec![
            Molecule::new(s, 10.0, 2.0, Vec3::ZERO),
            Molecule::new(p, 10.0, 0.0, Vec3::new(1.0, 0.0, 0.0)),
        ]);
        sim.advance_tick();
        assert_ne!(sim.molecules()[0].position, Vec3::ZERO);
        assert_eq!(sim.molecules().len(), 2);
    }

    #[test]
    fn saturated_complex_always_resolves() {
        let sim = empty_sim("\"E\" : \"S\" -> \"P\" | 1uM - 10000;\n");
        let (e, s, p) = (id(&sim, "E"), id(&sim, "S"), id(&sim, "P"));
        let rule = sim.reactions()[0];
        let mut enzyme = Molecule::new(e, 10.0, 0.0, Vec3::ZERO);
        enzyme.binding = Some(Binding {
            rule,
            substrate_id: s,
        });
        let mut sim = sim.with_molecules(vec![enzyme]);

        let stats = sim.advance_tick();
        assert_eq!(stats.releases, 1);
        assert_eq!(sim.molecules().len(), 2);
        assert!(!sim.molecules()[0].is_bound());
        let released = &sim.molecules()[1];
        assert!(released.type_id == s || released.type_id == p);
        // Adjacent on +X, radii summed with the default diameter.
        assert_eq!(released.position, Vec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn zero_kcat_complex_never_resolves() {
        let sim = empty_sim("\"E\" : \"S\" -> \"P\" | 1uM - 0;\n");
        let (e, s) = (id(&sim, "E"), id(&sim, "S"));
        let rule = sim.reactions()[0];
        let mut enzyme = Molecule::new(e, 10.0, 1.0, Vec3::ZERO);
        enzyme.binding = Some(Binding {
            rule,
            substrate_id: s,
        });
        let mut sim = sim.with_molecules(vec![enzyme]);
        for _ in 0..200 {
            assert_eq!(sim.advance_tick().releases, 0);
        }
        assert_eq!(sim.bound_count(), 1);
    }

    #[test]
    fn two_products_are_released_on_both_sides() {
        let sim = empty_sim("\"E\" : \"S\" -> \"P\" + \"Q\" | 1uM - 10000;\n");
        let (e, s) = (id(&sim, "E"), id(&sim, "S"));
        let mut rule = sim.reactions()[0];
        // Force the product branch.
        rule.probabilities.p2 = 0.0;
        rule.probabilities.p3 = 1.0;
        let mut enzyme = Molecule::new(e, 10.0, 0.0, Vec3::ZERO);
        enzyme.binding = Some(Binding {
            rule,
            substrate_id: s,
        });
        let mut sim = sim.with_molecules(vec![enzyme]);
        sim.advance_tick();
        let xs: Vec<f32> = sim.molecules()[1..].iter().map(|m| m.position.x).collect();
        assert_eq!(xs, vec![10.0, -10.0]);
        assert_eq!(sim.population_of(id(&sim, "Q")), 1);
    }

    #[test]
    fn sweep_order_decides_which_substrate_binds() {
        let sim = empty_sim(RULE);
        let (e, s) = (id(&sim, "E"), id(&sim, "S"));
        // Both substrates touch the enzyme but not each other.
        let layout = vec![
            Molecule::new(s, 4.0, 0.0, Vec3::new(6.0, 0.0, 0.0)),
            Molecule::new(e, 10.0, 0.0, Vec3::ZERO),
            Molecule::new(s, 4.0, 0.0, Vec3::new(-6.0, 0.0, 0.0)),
        ];

        let mut forward = sim.clone().with_molecules(layout.clone());
        assert_eq!(forward.sweep_direction(), SweepDirection::Forward);
        assert_eq!(forward.advance_tick().fusions, 1);
        let left: Vec<f32> = forward
            .molecules()
            .iter()
            .filter(|m| m.type_id == s)
            .map(|m| m.position.x)
            .collect();
        assert_eq!(left, vec![-6.0], "the front substrate binds first");

        let mut reverse = sim.with_molecules(Vec::new());
        reverse.advance_tick();
        let mut reverse = reverse.with_molecules(layout);
        assert_eq!(reverse.sweep_direction(), SweepDirection::Reverse);
        assert_eq!(reverse.advance_tick().fusions, 1);
        let left: Vec<f32> = reverse
            .molecules()
            .iter()
            .filter(|m| m.type_id == s)
            .map(|m| m.position.x)
            .collect();
        assert_eq!(left, vec![6.0], "the back substrate binds first");
    }

    #[test]
    fn sweep_direction_alternates() {
        let mut sim = empty_sim(RULE);
        assert_eq!(sim.sweep_direction(), SweepDirection::Forward);
        sim.advance_tick();
        assert_eq!(sim.sweep_direction(), SweepDirection::Reverse);
        sim.advance_tick();
        assert_eq!(sim.sweep_direction(), SweepDirection::Forward);
        assert_eq!(sim.tick_count(), 2);
    }
}
