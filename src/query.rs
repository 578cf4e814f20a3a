//! Subsumption queries over an atomization.
//!
//! The lower atomic segment of a term is the set of atoms intersecting it.
//! `L ≤ R` holds iff the lower atomic segment of `L` is contained in that of
//! `R`, that is iff no atom intersects `L` while being disjoint from `R`.
//! Such atoms form the *discriminant* of the pair.

use std::collections::BTreeMap;

use crate::types::{Atom, Constant, Segment};

/// Partition of an atomization by a pair of terms.
///
/// Entries are positions in the atomization that was partitioned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discriminant {
    /// Atoms intersecting the left term and disjoint from the right term.
    pub discriminant: Vec<usize>,
    /// Every other atom.
    pub non_discriminant: Vec<usize>,
    /// Atoms intersecting the right term. Only filled when the discriminant
    /// is non-empty.
    pub right: Vec<usize>,
}

impl Discriminant {
    /// Whether the pair already holds.
    pub fn is_empty(&self) -> bool {
        self.discriminant.is_empty()
    }
}

/// Whether `left ≤ right` holds in `atoms`.
pub fn lower_or_equal(left: &Segment, right: &Segment, atoms: &[Atom]) -> bool {
    !atoms
        .iter()
        .any(|at| at.ucs().intersects(left) && at.ucs().is_disjoint(right))
}

/// Partition `atoms` into discriminant and non-discriminant atoms of the
/// pair `(left, right)`.
pub fn separate_discriminant(left: &Segment, right: &Segment, atoms: &[Atom]) -> Discriminant {
    let mut out = Discriminant::default();
    for (x, at) in atoms.iter().enumerate() {
        if at.ucs().intersects(left) && at.ucs().is_disjoint(right) {
            out.discriminant.push(x);
        } else {
            out.non_discriminant.push(x);
        }
    }

    // The right side is only needed to cross; skip the disjointness tests
    // when there is nothing to cross.
    if !out.discriminant.is_empty() {
        out.right = out
            .non_discriminant
            .iter()
            .copied()
            .filter(|&x| atoms[x].ucs().intersects(right))
            .collect();
    }
    out
}

/// Atoms forming part of the lower atomic segment of `term`.
pub fn atoms_in<'a>(atoms: &'a [Atom], term: &Segment) -> Vec<&'a Atom> {
    atoms.iter().filter(|at| at.ucs().intersects(term)).collect()
}

/// Atoms outside the lower atomic segment of `term`.
pub fn atoms_not_in<'a>(atoms: &'a [Atom], term: &Segment) -> Vec<&'a Atom> {
    atoms.iter().filter(|at| at.ucs().is_disjoint(term)).collect()
}

/// Map each constant of `constants` to the positions of the atoms that
/// contain it. Constants in no atom are absent from the map.
pub fn lower_atomic_segment(atoms: &[Atom], constants: &Segment) -> BTreeMap<Constant, Segment> {
    let mut las: BTreeMap<Constant, Segment> = BTreeMap::new();
    for (x, at) in atoms.iter().enumerate() {
        for c in &at.ucs().intersection(constants) {
            las.entry(c).or_default().insert(x as u32);
        }
    }
    las
}

/// Lower atomic segment of `term` as atom positions, from a per-constant map.
pub fn term_lower_atomic_segment(term: &Segment, las: &BTreeMap<Constant, Segment>) -> Segment {
    let mut out = Segment::new();
    for c in term {
        if let Some(positions) = las.get(&c) {
            out.union_with(positions);
        }
    }
    out
}
