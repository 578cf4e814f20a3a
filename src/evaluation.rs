//! Read-only evaluation of an atomization.
//!
//! The number of *misses* of a duple `(L, R)` is the number of atoms in the
//! lower atomic segment of `L` but not in that of `R`. A duple is classified
//! positive when its misses stay below a cutoff; cutoff 1 is plain
//! `lower_or_equal`.
//!
//! Choosing an optimal cutoff is left to reporting code.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::query::lower_atomic_segment;
use crate::types::{Atom, Constant, Duple, Segment};

/// Classification counts and rates over a set of duples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Accuracy {
    /// Positive duples evaluated.
    pub positives: usize,
    /// Negative duples evaluated.
    pub negatives: usize,
    /// Negative duples classified positive.
    pub false_positives: usize,
    /// Positive duples classified negative.
    pub false_negatives: usize,
}

impl Accuracy {
    /// False positive rate, `None` without negatives.
    pub fn fpr(&self) -> Option<f64> {
        (self.negatives > 0).then(|| self.false_positives as f64 / self.negatives as f64)
    }

    /// False negative rate, `None` without positives.
    pub fn fnr(&self) -> Option<f64> {
        (self.positives > 0).then(|| self.false_negatives as f64 / self.positives as f64)
    }

    /// Fraction of misclassified duples, `None` without duples.
    pub fn error(&self) -> Option<f64> {
        let total = self.positives + self.negatives;
        (total > 0).then(|| (self.false_positives + self.false_negatives) as f64 / total as f64)
    }
}

impl std::fmt::Display for Accuracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.positives + self.negatives == 0 {
            return write!(f, "No data");
        }
        let rate = |r: Option<f64>| r.map_or_else(|| "n/a".to_string(), |r| format!("{:.4}", r));
        write!(f, "FPR: {}  FNR: {}", rate(self.fpr()), rate(self.fnr()))
    }
}

/// Atoms meeting `left` and missing `right`.
pub fn misses(duple: &Duple, atoms: &[Atom]) -> usize {
    atoms
        .iter()
        .filter(|at| at.ucs().intersects(&duple.left) && at.ucs().is_disjoint(&duple.right))
        .count()
}

/// Classify `duples` with the given misses cutoff.
///
/// A duple is classified positive when it has fewer than `cutoff` misses.
/// With `region`, only duples of that region are evaluated.
pub fn evaluate_at_cutoff(
    duples: &[Duple],
    atoms: &[Atom],
    region: Option<u32>,
    cutoff: usize,
) -> Accuracy {
    let mut acc = Accuracy::default();
    for duple in duples.iter().filter(|d| region.map_or(true, |r| d.region == r)) {
        let assigned_positive = misses(duple, atoms) < cutoff;
        if duple.positive {
            acc.positives += 1;
            if !assigned_positive {
                acc.false_negatives += 1;
            }
        } else {
            acc.negatives += 1;
            if assigned_positive {
                acc.false_positives += 1;
            }
        }
    }
    acc
}

/// Classify `duples` with `lower_or_equal`.
pub fn test_accuracy(duples: &[Duple], atoms: &[Atom], region: Option<u32>) -> Accuracy {
    evaluate_at_cutoff(duples, atoms, region, 1)
}

/// Atom counts by crossing depth.
pub fn g_spectrum(atoms: &[Atom]) -> BTreeMap<u32, usize> {
    let mut out = BTreeMap::new();
    for at in atoms {
        *out.entry(at.g).or_insert(0) += 1;
    }
    out
}

/// Atom counts by ucs size.
pub fn l_spectrum(atoms: &[Atom]) -> BTreeMap<usize, usize> {
    let mut out = BTreeMap::new();
    for at in atoms {
        *out.entry(at.len()).or_insert(0) += 1;
    }
    out
}

/// Atom counts by generation.
pub fn gen_spectrum(atoms: &[Atom]) -> BTreeMap<u64, usize> {
    let mut out = BTreeMap::new();
    for at in atoms {
        *out.entry(at.gen).or_insert(0) += 1;
    }
    out
}

/// Number of atoms containing each constant of `constants`, zero included.
pub fn c_spectrum(atoms: &[Atom], constants: &Segment) -> BTreeMap<Constant, usize> {
    let las = lower_atomic_segment(atoms, constants);
    constants
        .iter()
        .map(|c| (c, las.get(&c).map_or(0, Segment::len)))
        .collect()
}

/// Log the G, L and GEN spectra at info level.
pub fn log_spectra(atoms: &[Atom]) {
    if !tracing::enabled!(tracing::Level::INFO) {
        return;
    }
    info!(spectrum = ?g_spectrum(atoms), "G spectrum");
    info!(spectrum = ?l_spectrum(atoms), "L spectrum");
    info!(spectrum = ?gen_spectrum(atoms), "GEN spectrum");
}
