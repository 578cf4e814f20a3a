//! Atoms of an atomization.
//!
//! An atom is identified, for equality and hashing, by its upper constant
//! segment alone. The bookkeeping fields record when and how it was produced:
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `epoch` | crossing step that created it |
//! | `gen` | batch generation, used to segregate redundancy passes |
//! | `g` | crossing depth (0 for seeded singletons) |
//! | `id` | process-unique, monotonic identity |
//!
//! Cloning an atom keeps its id: the atomization and the union model may hold
//! the same atom. [`Atom::duplicate`] is the divergent copy with a fresh id and
//! no cached trace.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::segment::{Constant, Segment};
use crate::error::{EngineError, Result};

static NEXT_ATOM_ID: AtomicU64 = AtomicU64::new(1);

/// Unique atom identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AtomId(u64);

impl AtomId {
    fn next() -> Self {
        Self(NEXT_ATOM_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Trace memoized inside an atom, stamped with the tracer period that
/// computed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomTrace {
    /// Indicator positions the atom is not free of.
    pub trace: Segment,
    /// Tracer period at computation time.
    pub period: u64,
}

/// An atom: an upper constant segment plus bookkeeping.
#[derive(Clone)]
pub struct Atom {
    ucs: Segment,
    /// Crossing step that produced the atom.
    pub epoch: u64,
    /// Batch generation.
    pub gen: u64,
    /// Crossing depth.
    pub g: u32,
    id: AtomId,
    pub(crate) redundancy_checked: bool,
    pub(crate) union_entrance: Option<u64>,
    trace: RefCell<Option<AtomTrace>>,
}

impl Atom {
    /// Create an atom with depth 0.
    pub fn new(ucs: Segment, epoch: u64, gen: u64) -> Self {
        Self {
            ucs,
            epoch,
            gen,
            g: 0,
            id: AtomId::next(),
            redundancy_checked: false,
            union_entrance: None,
            trace: RefCell::new(None),
        }
    }

    /// Create the singleton atom `{c}`.
    pub fn singleton(c: Constant, epoch: u64, gen: u64) -> Self {
        Self::new(Segment::singleton(c), epoch, gen)
    }

    /// Upper constant segment.
    pub fn ucs(&self) -> &Segment {
        &self.ucs
    }

    /// Unique id.
    pub fn id(&self) -> AtomId {
        self.id
    }

    /// Number of constants in the ucs.
    pub fn len(&self) -> usize {
        self.ucs.len()
    }

    /// Whether the ucs is empty (a zero atom).
    pub fn is_empty(&self) -> bool {
        self.ucs.is_empty()
    }

    /// Whether the ucs holds exactly one constant.
    pub fn is_singleton(&self) -> bool {
        self.ucs.len() == 1
    }

    /// Whether the atom has passed a marking redundancy check.
    pub fn is_redundancy_checked(&self) -> bool {
        self.redundancy_checked
    }

    /// Union model update counter at which the atom entered, if stamped.
    pub fn union_entrance(&self) -> Option<u64> {
        self.union_entrance
    }

    /// Union of two atoms.
    ///
    /// The result takes the later generation of the two and depth
    /// `max(self.g + 1, other.g)`; `self` is the discriminant side.
    pub fn union(&self, other: &Atom, epoch: u64) -> Atom {
        let mut atom = Atom::new(self.ucs.union(&other.ucs), epoch, self.gen.max(other.gen));
        atom.g = (self.g + 1).max(other.g);
        atom
    }

    /// Divergent copy: fresh id, no cached trace, not stamped.
    pub fn duplicate(&self) -> Atom {
        let mut atom = Atom::new(self.ucs.clone(), self.epoch, self.gen);
        atom.g = self.g;
        atom
    }

    /// Complement of the ucs within `constants`.
    ///
    /// Fails on a zero atom, whose pinning term would be every constant.
    pub fn pinning_term(&self, constants: &Segment) -> Result<Segment> {
        if self.ucs.is_empty() {
            return Err(EngineError::invariant(format!("zero atom {}", self.id)));
        }
        Ok(constants.difference(&self.ucs))
    }

    /// Cached trace, if any. Read-only diagnostics.
    pub fn trace(&self) -> Option<AtomTrace> {
        self.trace.borrow().clone()
    }

    pub(crate) fn cached_trace(&self) -> std::cell::Ref<'_, Option<AtomTrace>> {
        self.trace.borrow()
    }

    pub(crate) fn store_trace(&self, trace: Segment, period: u64) {
        *self.trace.borrow_mut() = Some(AtomTrace { trace, period });
    }

    /// Drop the cached trace.
    pub fn clear_trace(&self) {
        *self.trace.borrow_mut() = None;
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.ucs == other.ucs
    }
}

impl Eq for Atom {}

impl Hash for Atom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ucs.hash(state);
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("id", &self.id)
            .field("ucs", &self.ucs)
            .field("epoch", &self.epoch)
            .field("gen", &self.gen)
            .field("g", &self.g)
            .finish()
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom{}", self.ucs)
    }
}

/// An ordered collection of atoms.
pub type Atomization = Vec<Atom>;

/// Duplicate every atom of `atoms`.
pub fn atomization_copy(atoms: &[Atom]) -> Atomization {
    atoms.iter().map(Atom::duplicate).collect()
}
