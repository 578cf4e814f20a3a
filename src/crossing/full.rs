//! Full crossing.

use std::cmp::Reverse;
use std::collections::VecDeque;

use tracing::{debug, info};

use super::{check_batch, settle};
use crate::error::Result;
use crate::evaluation::log_spectra;
use crate::model::Model;
use crate::policy::FullCrossingParams;
use crate::query::{atoms_in, lower_or_equal, separate_discriminant};
use crate::reduction::{remove_redundant, remove_redundant_segregating_generation, remove_repeated};
use crate::types::{Atom, Duple};

/// Outcome of a full crossing batch.
#[derive(Debug, Clone, Default)]
pub struct CrossingReport {
    /// Positive duples that needed crossing.
    pub crossed: usize,
    /// Positive duples already holding.
    pub satisfied: usize,
    /// Hypothesis duples dropped.
    pub dropped_hypotheses: usize,
    /// Non-hypothesis duples failing after enforcement.
    pub violations: Vec<Duple>,
    /// Whether `violations` is non-empty.
    pub inconsistent: bool,
    /// Atomization size before the batch.
    pub atoms_before: usize,
    /// Atomization size after the batch.
    pub atoms_after: usize,
}

/// Exact crossing engine.
#[derive(Debug, Clone, Default)]
pub struct FullCrossingEngine {
    params: FullCrossingParams,
}

impl FullCrossingEngine {
    /// Create an engine, validating `params`.
    pub fn new(params: FullCrossingParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Engine parameters.
    pub fn params(&self) -> &FullCrossingParams {
        &self.params
    }

    /// Enforce a batch of duples on `model`.
    ///
    /// Non-hypothesis positives are crossed first, in input order or by
    /// solvability with `sort_duples`. Hypothesis positives follow; one whose
    /// crossing breaks a non-hypothesis negative of the batch is rolled back
    /// and dropped. Negatives are only checked.
    pub fn enforce(&self, model: &mut Model, duples: &[Duple]) -> Result<CrossingReport> {
        self.params.validate()?;

        let mut report = CrossingReport {
            atoms_before: model.atomization.len(),
            ..Default::default()
        };
        let (hypotheses, firm): (Vec<&Duple>, Vec<&Duple>) = duples
            .iter()
            .filter(|d| d.positive)
            .partition(|d| d.hypothesis);
        let firm_negatives: Vec<&Duple> = duples
            .iter()
            .filter(|d| !d.positive && !d.hypothesis)
            .collect();
        info!(
            positives = firm.len(),
            hypotheses = hypotheses.len(),
            atoms = report.atoms_before,
            "Full crossing batch"
        );

        let mut queue: VecDeque<&Duple> = firm.into();
        while !queue.is_empty() {
            if self.params.sort_duples {
                sort_by_solvability(&model.atomization, queue.make_contiguous());
            }
            let Some(duple) = queue.pop_front() else {
                break;
            };
            if self.cross(model, duple) {
                report.crossed += 1;
            } else {
                report.satisfied += 1;
            }
        }

        for duple in hypotheses {
            let held: Vec<bool> = firm_negatives
                .iter()
                .map(|d| !lower_or_equal(&d.left, &d.right, &model.atomization))
                .collect();
            let saved = (model.atomization.clone(), model.epoch);

            let crossed = self.cross(model, duple);
            let broken = firm_negatives
                .iter()
                .zip(&held)
                .any(|(d, &held)| held && lower_or_equal(&d.left, &d.right, &model.atomization));
            if broken {
                (model.atomization, model.epoch) = saved;
                debug!(duple = %duple, "Hypothesis dropped");
                report.dropped_hypotheses += 1;
            } else if crossed {
                report.crossed += 1;
            } else {
                report.satisfied += 1;
            }
        }

        let check = check_batch(
            duples.iter().filter(|d| !(d.positive && d.hypothesis)),
            &model.atomization,
        );
        report.dropped_hypotheses += check.dropped_hypotheses;
        report.inconsistent = settle(&check.violations, self.params.strictness, "full_crossing")?;
        report.violations = check.violations;
        report.atoms_after = model.atomization.len();

        log_spectra(&model.atomization);
        info!(
            crossed = report.crossed,
            satisfied = report.satisfied,
            dropped = report.dropped_hypotheses,
            before = report.atoms_before,
            after = report.atoms_after,
            "Full crossing done"
        );
        Ok(report)
    }

    // Replace the discriminant of `duple` by its products with the atoms
    // intersecting the right side. Returns false when the duple held.
    fn cross(&self, model: &mut Model, duple: &Duple) -> bool {
        let split = separate_discriminant(&duple.left, &duple.right, &model.atomization);
        if split.is_empty() {
            return false;
        }

        model.epoch += 1;
        let epoch = model.epoch;
        let constants = model.registry.live().clone();
        let atoms = &model.atomization;

        let right: Vec<&Atom> = split
            .right
            .iter()
            .map(|&x| &atoms[x])
            .filter(|at| !self.params.binary || at.is_singleton())
            .collect();

        let mut next: Vec<Atom> = split
            .non_discriminant
            .iter()
            .map(|&x| atoms[x].clone())
            .collect();
        for (k, &x) in split.discriminant.iter().enumerate() {
            let left = &atoms[x];
            next.extend(right.iter().map(|at| left.union(at, epoch)));

            if next.len() >= self.params.reduction_batch {
                next = remove_redundant(remove_repeated(next), &constants, false);
                debug!(
                    progress = k + 1,
                    discriminant = split.discriminant.len(),
                    atoms = next.len(),
                    "Intermediate reduction"
                );
            }
        }

        let produced = next.len();
        next = remove_repeated(next);
        let unique = next.len();
        next = remove_redundant(next, &constants, true);
        info!(
            epoch,
            produced,
            unique,
            kept = next.len(),
            "Crossed duple"
        );

        if self.params.remove_repetitions {
            next = remove_repeated(next);
        }
        if self.params.calculate_redundancy {
            next = if model.generation == 0 {
                remove_redundant(next, &constants, true)
            } else {
                remove_redundant_segregating_generation(next, &constants, model.generation)
            };
        }

        model.atomization = next;
        true
    }
}

/// Order duples by increasing `|discriminant| * (|atoms in R| - 1)`,
/// larger right sides first on ties.
fn sort_by_solvability(atoms: &[Atom], duples: &mut [&Duple]) {
    debug!(duples = duples.len(), "Sorting duples");
    duples.sort_by_cached_key(|d| {
        let disc = separate_discriminant(&d.left, &d.right, atoms).discriminant.len() as i64;
        let right_atoms = atoms_in(atoms, &d.right).len() as i64;
        (disc * (right_atoms - 1), Reverse(d.right.len()))
    });
}
