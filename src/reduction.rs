//! Repetition and redundancy removal.
//!
//! - **Repetition**: atoms with equal ucs collapse into the first occurrence,
//!   which keeps the earliest epoch and the latest generation.
//! - **Redundancy**: an atom is redundant when its ucs is the union of the
//!   ucs of other atoms of the atomization. Redundant atoms do not change any
//!   `lower_or_equal` answer and are dropped.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::types::{Atom, Constant, Segment};

/// Collapse atoms with equal ucs.
pub fn remove_repeated(atoms: Vec<Atom>) -> Vec<Atom> {
    let before = atoms.len();
    let mut seen: HashMap<Segment, usize> = HashMap::with_capacity(atoms.len());
    let mut out: Vec<Atom> = Vec::with_capacity(atoms.len());

    for at in atoms {
        match seen.get(at.ucs()) {
            Some(&x) => {
                let kept = &mut out[x];
                kept.epoch = kept.epoch.min(at.epoch);
                kept.gen = kept.gen.max(at.gen);
            }
            None => {
                seen.insert(at.ucs().clone(), out.len());
                out.push(at);
            }
        }
    }

    debug!(before, after = out.len(), "Removed repeated atoms");
    out
}

/// Drop atoms that are unions of other atoms.
///
/// Atoms are processed by increasing ucs size. The smallest size class always
/// survives; an atom of a larger class is redundant when the union of the
/// surviving atoms contained in it (within `constants`) covers its ucs. Atoms
/// already marked as checked are kept without testing. With `mark_checked`
/// every survivor is marked.
///
/// The result is ordered by ucs size.
pub fn remove_redundant(mut atoms: Vec<Atom>, constants: &Segment, mark_checked: bool) -> Vec<Atom> {
    if atoms.is_empty() {
        return atoms;
    }
    let before = atoms.len();
    atoms.sort_by_key(Atom::len);

    let mut confirmed: Vec<Atom> = Vec::with_capacity(atoms.len());
    // constant -> positions in `confirmed` of atoms containing it
    let mut las: BTreeMap<Constant, Segment> = BTreeMap::new();
    let mut all = Segment::new();

    let mut class: Vec<Atom> = Vec::new();
    let mut class_len = atoms[0].len();
    let mut first_class = true;

    for at in atoms {
        if at.len() > class_len {
            class_len = at.len();
            let class_atoms = std::mem::take(&mut class);
            admit_class(class_atoms, first_class, constants, mark_checked, &mut confirmed, &mut las, &mut all);
            first_class = false;
        }
        class.push(at);
    }
    admit_class(class, first_class, constants, mark_checked, &mut confirmed, &mut las, &mut all);

    debug!(before, after = confirmed.len(), "Removed redundant atoms");
    confirmed
}

fn admit_class(
    class: Vec<Atom>,
    first_class: bool,
    constants: &Segment,
    mark_checked: bool,
    confirmed: &mut Vec<Atom>,
    las: &mut BTreeMap<Constant, Segment>,
    all: &mut Segment,
) {
    let survivors: Vec<Atom> = if first_class {
        class
    } else {
        class
            .into_iter()
            .filter(|at| at.redundancy_checked || !is_covered(at, constants, &*confirmed, &*las, &*all))
            .collect()
    };

    for mut at in survivors {
        if mark_checked {
            at.redundancy_checked = true;
        }
        let x = confirmed.len() as u32;
        all.insert(x);
        for c in at.ucs() {
            las.entry(c).or_default().insert(x);
        }
        confirmed.push(at);
    }
}

fn is_covered(
    at: &Atom,
    constants: &Segment,
    confirmed: &[Atom],
    las: &BTreeMap<Constant, Segment>,
    all: &Segment,
) -> bool {
    // Confirmed atoms with no constant outside `at`
    let mut inside = all.clone();
    for c in &constants.difference(at.ucs()) {
        if let Some(positions) = las.get(&c) {
            inside.difference_with(positions);
            if inside.is_empty() {
                return false;
            }
        }
    }

    let mut rest = at.ucs().clone();
    for x in &inside {
        rest.difference_with(confirmed[x as usize].ucs());
        if rest.is_empty() {
            return true;
        }
    }
    false
}

/// Redundancy removal run separately on the atoms of `generation` and on the
/// older ones, so fresh atoms are never explained away by older atoms.
pub fn remove_redundant_segregating_generation(
    atoms: Vec<Atom>,
    constants: &Segment,
    generation: u64,
) -> Vec<Atom> {
    let (current, previous): (Vec<Atom>, Vec<Atom>) =
        atoms.into_iter().partition(|at| at.gen == generation);
    let mut out = remove_redundant(previous, constants, true);
    out.extend(remove_redundant(current, constants, true));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn atoms(ucs: &[&[Constant]]) -> Vec<Atom> {
        ucs.iter()
            .map(|u| Atom::new(Segment::from(*u), 0, 0))
            .collect()
    }

    fn ucs_set(atoms: &[Atom]) -> HashSet<Segment> {
        atoms.iter().map(|at| at.ucs().clone()).collect()
    }

    #[test]
    fn test_remove_repeated_merges_bookkeeping() {
        let mut a = Atom::new(Segment::from([0, 1]), 5, 1);
        a.g = 2;
        let b = Atom::new(Segment::from([1, 0]), 3, 4);
        let c = Atom::new(Segment::from([2]), 0, 0);
        let id = a.id();

        let out = remove_repeated(vec![a, b, c]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id(), id);
        assert_eq!(out[0].epoch, 3);
        assert_eq!(out[0].gen, 4);
        assert_eq!(out[0].g, 2);
    }

    #[test]
    fn test_remove_redundant_drops_unions() {
        let constants = Segment::full(4);
        let a = atoms(&[&[0, 1, 2], &[0], &[1, 2], &[3], &[2, 3]]);
        let out = remove_redundant(a, &constants, false);

        // {0,1,2} = {0} ∪ {1,2}; {2,3} is not a union of survivors
        assert_eq!(
            ucs_set(&out),
            ucs_set(&atoms(&[&[0], &[3], &[1, 2], &[2, 3]]))
        );
    }

    #[test]
    fn test_smallest_class_always_survives() {
        let constants = Segment::full(3);
        let a = atoms(&[&[0, 1], &[1, 2], &[0, 2]]);
        let out = remove_redundant(a, &constants, false);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_checked_atoms_are_kept() {
        let constants = Segment::full(2);
        let mut a = atoms(&[&[0], &[1], &[0, 1]]);
        a[2].redundancy_checked = true;
        let out = remove_redundant(a, &constants, false);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_mark_checked() {
        let constants = Segment::full(2);
        let out = remove_redundant(atoms(&[&[0], &[1]]), &constants, true);
        assert!(out.iter().all(Atom::is_redundancy_checked));

        let out = remove_redundant(atoms(&[&[0], &[1]]), &constants, false);
        assert!(out.iter().all(|at| !at.is_redundancy_checked()));
    }

    #[test]
    fn test_remove_redundant_idempotent() {
        let constants = Segment::full(5);
        let a = atoms(&[&[0], &[1], &[0, 1], &[2, 3], &[2], &[0, 1, 2, 3], &[4, 0]]);
        let once = remove_redundant(a, &constants, false);
        let twice = remove_redundant(once.clone(), &constants, false);
        assert_eq!(ucs_set(&once), ucs_set(&twice));
    }

    #[test]
    fn test_segregating_generation() {
        let constants = Segment::full(2);
        let mut a = atoms(&[&[0], &[1], &[0, 1]]);
        a[2].gen = 1;

        // The fresh union survives because older atoms cannot explain it
        let out = remove_redundant_segregating_generation(a.clone(), &constants, 1);
        assert_eq!(out.len(), 3);

        let out = remove_redundant(a, &constants, false);
        assert_eq!(out.len(), 2);
    }
}
