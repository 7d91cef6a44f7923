//! Fixed-capacity string interner used by the lexer.
//!
//! Identifiers are hashed with a polynomial rolling hash and stored by open
//! addressing. The id of a name is the slot it landed in, so ids are stable for
//! the lifetime of the table but not dense.

use crate::error::LexError;
use std::collections::BTreeMap;

/// Default number of slots, large enough for any realistic reaction file.
pub const DEFAULT_CAPACITY: usize = 200_000;

const HASH_SEED: usize = 11;
const HASH_MULTIPLIER: usize = 19;
const PROBE_STRIDE: usize = 41;

/// Open-addressing identifier table.
///
/// Probing walks the table with a stride of 41 and wraps around. The capacity
/// should be coprime with 41, otherwise some slots are never probed and the table
/// reports [`LexError::TableFull`] early.
#[derive(Clone, Debug)]
pub struct IdentifierTable {
    slots: Vec<Option<String>>,
    len: usize,
}

impl Default for IdentifierTable {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl IdentifierTable {
    /// Creates a table with [`DEFAULT_CAPACITY`] slots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table with `capacity` slots (at least one). The capacity never
    /// changes afterwards.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            len: 0,
        }
    }

    /// Total number of slots, free or taken.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of interned names.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Hash of `name` folded into `[0, capacity)`.
    pub fn hash(&self, name: &str) -> usize {
        let capacity = self.capacity();
        name.bytes().fold(HASH_SEED % capacity, |h, b| {
            ((h * HASH_MULTIPLIER) ^ b as usize) % capacity
        })
    }

    /// Returns the id of `name`, inserting it first if it is not known yet.
    pub fn intern(&mut self, name: &str) -> Result<u32, LexError> {
        match self.probe(name) {
            Probe::Found(slot) => Ok(slot as u32),
            Probe::Vacant(slot) => {
                self.slots[slot] = Some(name.to_string());
                self.len += 1;
                Ok(slot as u32)
            }
            Probe::Full => Err(LexError::TableFull {
                capacity: self.capacity(),
            }),
        }
    }

    /// Looks `name` up without inserting it.
    pub fn resolve_id(&self, name: &str) -> Option<u32> {
        match self.probe(name) {
            Probe::Found(slot) => Some(slot as u32),
            Probe::Vacant(_) | Probe::Full => None,
        }
    }

    /// Name stored under `id`, if any.
    pub fn resolve_name(&self, id: u32) -> Option<&str> {
        self.slots.get(id as usize)?.as_deref()
    }

    /// Rebuilds the `id -> name` mapping of every interned identifier.
    pub fn names(&self) -> BTreeMap<u32, String> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, name)| name.as_ref().map(|n| (slot as u32, n.clone())))
            .collect()
    }

    fn probe(&self, name: &str) -> Probe {
        let capacity = self.capacity();
        let mut slot = self.hash(name);
        for _ in 0..capacity {
            match &self.slots[slot] {
                None => return Probe::Vacant(slot),
                Some(existing) if existing == name => return Probe::Found(slot),
                Some(_) => slot = (slot + PROBE_STRIDE) % capacity,
            }
        }
        Probe::Full
    }
}

enum Probe {
    Found(usize),
    Vacant(usize),
    Full,
}
