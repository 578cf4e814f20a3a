//! Crossing: growing the atomization until a batch of duples holds.
//!
//! Both engines replace the *discriminant* atoms of a positive duple
//! `(L, R)` (atoms intersecting `L` and disjoint from `R`) by unions with
//! atoms intersecting `R`:
//!
//! - [`FullCrossingEngine`] takes every such union. Exact, exponential in
//!   the worst case, meant for small constant universes.
//! - [`SparseCrossingEngine`] samples a covering set of unions guided by a
//!   [`Tracer`](crate::tracer::Tracer), then simplifies.
//!
//! After a batch, every non-hypothesis positive duple satisfies
//! `lower_or_equal`. Failing hypothesis duples are dropped; failing
//! non-hypothesis duples are an inconsistency, returned as an error under
//! [`Strictness::Raise`] and flagged in the report otherwise.

pub mod full;
pub mod sparse;

use tracing::{debug, error};

use crate::error::{EngineError, Result};
use crate::policy::Strictness;
use crate::query::lower_or_equal;
use crate::types::{Atom, Duple};

pub use full::{CrossingReport, FullCrossingEngine};
pub use sparse::{SparseCrossingEngine, SparseReport, SparseVars};

/// Outcome of checking a batch against an atomization.
#[derive(Debug, Clone, Default)]
pub(crate) struct BatchCheck {
    pub dropped_hypotheses: usize,
    pub violations: Vec<Duple>,
}

/// Check every duple; failing hypotheses are dropped, failing
/// non-hypothesis duples are collected.
pub(crate) fn check_batch<'a>(
    duples: impl IntoIterator<Item = &'a Duple>,
    atoms: &[Atom],
) -> BatchCheck {
    let mut check = BatchCheck::default();
    for duple in duples {
        if lower_or_equal(&duple.left, &duple.right, atoms) == duple.positive {
            continue;
        }
        if duple.hypothesis {
            debug!(duple = %duple, "Hypothesis dropped");
            check.dropped_hypotheses += 1;
        } else {
            check.violations.push(duple.clone());
        }
    }
    check
}

/// Turn batch violations into an error or a flag.
pub(crate) fn settle(
    violations: &[Duple],
    strictness: Strictness,
    stage: &'static str,
) -> Result<bool> {
    let Some(first) = violations.first() else {
        return Ok(false);
    };
    match strictness {
        Strictness::Raise => Err(EngineError::inconsistent(
            stage,
            format!("{} duple(s) violated after enforcement, first: {}", violations.len(), first),
        )),
        Strictness::Report => {
            error!(stage, violated = violations.len(), first = %first, "Inconsistent batch");
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Segment;

    #[test]
    fn test_check_batch() {
        let atoms = vec![Atom::singleton(0, 0, 0), Atom::singleton(1, 0, 0)];
        let duples = vec![
            Duple::negative(Segment::from([0]), Segment::from([1])),
            Duple::positive(Segment::from([0]), Segment::from([1])),
            Duple::positive(Segment::from([1]), Segment::from([0])).as_hypothesis(),
        ];
        let check = check_batch(&duples, &atoms);
        assert_eq!(check.dropped_hypotheses, 1);
        assert_eq!(check.violations, vec![duples[1].clone()]);

        assert!(settle(&check.violations, Strictness::Raise, "test")
            .unwrap_err()
            .is_inconsistency());
        assert!(settle(&check.violations, Strictness::Report, "test").unwrap());
        assert!(!settle(&[], Strictness::Raise, "test").unwrap());
    }
}
