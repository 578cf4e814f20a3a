//! Minimal atom subsets refuting a set of negative duples.
//!
//! A negative duple `(L, R)` is refuted by an atom that intersects `L` and is
//! disjoint from `R`. Both strategies build a small selection greedily from a
//! shuffled copy of the candidates; leftover unrefuted duples are reported
//! through [`Selection::inconsistent`] and never as an error.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::types::{Atom, Duple, Segment};

/// Outcome of an atom selection.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Selected atoms, a subset of the candidates.
    pub selected: Vec<Atom>,
    /// Candidates left out.
    pub unused: Vec<Atom>,
    /// Some duple is refuted by no candidate.
    pub inconsistent: bool,
}

fn refutes(atom: &Atom, duple: &Duple) -> bool {
    atom.ucs().intersects(&duple.left) && atom.ucs().is_disjoint(&duple.right)
}

// Shuffle, then stable-sort by overlap with the out-of-context set so ties
// stay in random order.
fn prioritize<R: Rng + ?Sized>(atoms: &mut [Atom], out_of_context: &Segment, rng: &mut R) {
    atoms.shuffle(rng);
    atoms.sort_by_cached_key(|at| at.ucs().intersection_len(out_of_context));
}

/// Select atoms refuting `negatives`, preferring atoms that reach least
/// outside `context`.
///
/// Candidates are visited by increasing overlap with the out-of-context set
/// `OutK` (initially `context`). An atom is accepted when it refutes a duple
/// still outstanding; each accepted atom removes its constants from `OutK`
/// and the remaining candidates are re-prioritized. With `repeat`, the
/// selection is selected again with [`select_atoms`] and its leftovers are
/// recycled into `unused`.
pub fn select_atoms_with_context<R: Rng + ?Sized>(
    atoms: &[Atom],
    negatives: &[Duple],
    context: &Segment,
    repeat: bool,
    rng: &mut R,
) -> Selection {
    if atoms.is_empty() {
        return Selection {
            inconsistent: !negatives.is_empty(),
            ..Default::default()
        };
    }

    let mut outstanding: Vec<&Duple> = negatives.iter().collect();
    outstanding.shuffle(rng);

    let mut candidates: Vec<Atom> = atoms.to_vec();
    candidates.shuffle(rng);
    let mut out_of_context = context.clone();
    prioritize(&mut candidates, &out_of_context, rng);

    let mut selected = Vec::new();
    let mut unused = Vec::new();
    let mut queue = VecDeque::from(candidates);
    while let Some(at) = queue.pop_front() {
        let before = outstanding.len();
        outstanding.retain(|d| !refutes(&at, d));

        if outstanding.len() == before {
            unused.push(at);
        } else {
            let narrowed = out_of_context.difference(at.ucs());
            selected.push(at);
            if narrowed.len() != out_of_context.len() && !outstanding.is_empty() {
                out_of_context = narrowed;
                let mut rest: Vec<Atom> = queue.into_iter().collect();
                prioritize(&mut rest, &out_of_context, rng);
                queue = rest.into();
            }
        }

        if outstanding.is_empty() {
            break;
        }
    }

    let inconsistent = !outstanding.is_empty();
    info!(
        before = atoms.len(),
        after = selected.len(),
        negatives = negatives.len(),
        "Atom set reduced"
    );

    unused.extend(queue);
    if repeat && selected.len() != atoms.len() {
        info!("Repeating selection");
        let again = select_atoms(&selected, negatives, repeat, rng);
        unused.extend(again.unused);
        return Selection {
            selected: again.selected,
            unused,
            inconsistent: again.inconsistent,
        };
    }

    Selection {
        selected,
        unused,
        inconsistent,
    }
}

/// Select atoms refuting `negatives`, one duple at a time.
///
/// Duples are visited in random order; a duple already refuted by the
/// selection is skipped, otherwise the first refuting candidate of a shuffled
/// pool is moved into the selection.
pub fn select_atoms<R: Rng + ?Sized>(
    atoms: &[Atom],
    negatives: &[Duple],
    repeat: bool,
    rng: &mut R,
) -> Selection {
    if atoms.is_empty() {
        return Selection {
            inconsistent: !negatives.is_empty(),
            ..Default::default()
        };
    }

    let mut order: Vec<&Duple> = negatives.iter().collect();
    order.shuffle(rng);

    let mut pool: Vec<Atom> = atoms.to_vec();
    pool.shuffle(rng);

    let mut selected: Vec<Atom> = Vec::new();
    let mut inconsistent = false;
    for duple in order {
        if selected.iter().any(|at| refutes(at, duple)) {
            continue;
        }
        match pool.iter().position(|at| refutes(at, duple)) {
            Some(x) => selected.push(pool.remove(x)),
            None => inconsistent = true,
        }
    }

    info!(
        before = atoms.len(),
        after = selected.len(),
        negatives = negatives.len(),
        "Atom set reduced"
    );

    if repeat && selected.len() != atoms.len() {
        info!("Repeating selection");
        let again = select_atoms(&selected, negatives, repeat, rng);
        pool.extend(again.unused);
        return Selection {
            selected: again.selected,
            unused: pool,
            inconsistent: again.inconsistent,
        };
    }

    Selection {
        selected,
        unused: pool,
        inconsistent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::lower_or_equal;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn fixture() -> (Vec<Atom>, Vec<Duple>) {
        let atoms = vec![
            Atom::new(Segment::from([0, 1]), 0, 0),
            Atom::new(Segment::from([0, 5]), 0, 0),
            Atom::new(Segment::from([2]), 0, 0),
            Atom::new(Segment::from([2, 3, 4]), 0, 0),
            Atom::new(Segment::from([6]), 0, 0),
        ];
        let negatives = vec![
            Duple::negative(Segment::from([0]), Segment::from([1])),
            Duple::negative(Segment::from([2]), Segment::from([3])),
        ];
        (atoms, negatives)
    }

    fn assert_sound(selection: &Selection, atoms: &[Atom], negatives: &[Duple]) {
        let ids: HashSet<_> = atoms.iter().map(Atom::id).collect();
        assert!(selection.selected.iter().all(|at| ids.contains(&at.id())));
        if !selection.inconsistent {
            for d in negatives {
                assert!(!lower_or_equal(&d.left, &d.right, &selection.selected));
            }
        }
        assert_eq!(selection.selected.len() + selection.unused.len(), atoms.len());
    }

    #[test]
    fn test_select_with_context() {
        let (atoms, negatives) = fixture();
        for seed in 0..8 {
            let mut rng = StdRng::seed_from_u64(seed);
            let sel = select_atoms_with_context(
                &atoms,
                &negatives,
                &Segment::from([0, 1, 2, 3, 4, 5, 6]),
                false,
                &mut rng,
            );
            assert!(!sel.inconsistent);
            assert_eq!(sel.selected.len(), 2);
            assert_sound(&sel, &atoms, &negatives);
        }
    }

    #[test]
    fn test_context_prefers_atoms_inside() {
        let (mut atoms, negatives) = fixture();
        atoms.push(Atom::new(Segment::from([2, 4]), 0, 0));
        // {2} and {2,4} both refute {2} <= {3}; only {2,4} reaches into {4}
        for seed in 0..8 {
            let mut rng = StdRng::seed_from_u64(seed);
            let sel = select_atoms_with_context(&atoms, &negatives, &Segment::from([4]), false, &mut rng);
            assert!(sel.selected.iter().any(|at| at.ucs() == &Segment::from([2])));
            assert!(!sel.selected.iter().any(|at| at.ucs() == &Segment::from([2, 4])));
            assert_sound(&sel, &atoms, &negatives);
        }
    }

    #[test]
    fn test_select_plain() {
        let (atoms, negatives) = fixture();
        let mut rng = StdRng::seed_from_u64(9);
        let sel = select_atoms(&atoms, &negatives, true, &mut rng);
        assert!(!sel.inconsistent);
        assert_sound(&sel, &atoms, &negatives);
    }

    #[test]
    fn test_unrefutable_duple_is_reported() {
        let (atoms, mut negatives) = fixture();
        negatives.push(Duple::negative(Segment::from([7]), Segment::from([0])));
        let mut rng = StdRng::seed_from_u64(2);

        let sel = select_atoms(&atoms, &negatives, false, &mut rng);
        assert!(sel.inconsistent);
        assert_sound(&sel, &atoms, &negatives);

        let sel = select_atoms_with_context(&atoms, &negatives, &Segment::new(), true, &mut rng);
        assert!(sel.inconsistent);
        assert_sound(&sel, &atoms, &negatives);
    }

    #[test]
    fn test_empty_candidates() {
        let mut rng = StdRng::seed_from_u64(0);
        let sel = select_atoms(&[], &fixture().1, true, &mut rng);
        assert!(sel.selected.is_empty());
        assert!(sel.inconsistent);

        let sel = select_atoms(&[], &[], true, &mut rng);
        assert!(!sel.inconsistent);
    }
}
