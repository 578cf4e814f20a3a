//! Sparse crossing.
//!
//! ## Batch pipeline
//!
//! ```text
//! union model update → constants bookkeeping → tracer (indicators, pinning)
//!   → term space → useful indicators → trace closure (seed atoms)
//!   → cross all positives (sampled products, periodic simplification)
//!   → union model append → store positives → clean up → verify
//! ```
//!
//! A fresh [`Tracer`] is built for every batch with the next period; the
//! previous tracer is kept only to carry the period and the warning flag.
//! Crossed positives are stored and replayed with the next batch, negatives
//! are only kept for the batch that supplied them.
//!
//! A batch that returns `Err` leaves the engine as it was before the call.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{check_batch, settle};
use crate::error::Result;
use crate::evaluation::{log_spectra, test_accuracy, Accuracy};
use crate::model::Model;
use crate::policy::SparseCrossingParams;
use crate::query::separate_discriminant;
use crate::reduction::remove_repeated;
use crate::tracer::{TermSpace, Tracer};
use crate::types::{Atom, Duple, Segment};
use crate::union_model::{UnionModel, UnionUpdate};

/// Counters carried across batches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVars {
    /// Region-bearing positive duples received.
    pub pcount: usize,
    /// Region-bearing negative duples received.
    pub ncount: usize,
    /// Plain indicators of the last batch.
    pub ndi: usize,
    /// Fraction of plain indicators among all indicators of the last batch.
    pub frac: f64,
    /// Thinning level of the union model used for pinning.
    pub union_model_fraction: u32,
}

/// Outcome of a sparse crossing batch.
#[derive(Debug, Clone, Default)]
pub struct SparseReport {
    /// Positive duples crossed.
    pub crossed: usize,
    /// Positive duples already holding.
    pub not_crossed: usize,
    /// Hypothesis duples dropped.
    pub dropped_hypotheses: usize,
    /// Atoms seeded before crossing.
    pub seeded: usize,
    /// Constants seen for the first time.
    pub new_constants: usize,
    /// Singletons seeded again for batch constants no atom covered.
    pub reseeded: usize,
    /// Indicators after reduction.
    pub indicators: usize,
    /// Plain indicators after reduction.
    pub negative_indicators: usize,
    /// Union model partition before appending the batch.
    pub union_update: UnionUpdate,
    /// Constants retired at the end of the batch.
    pub retired: Segment,
    /// Trace violations counted under `Strictness::Report`.
    pub trace_violations: usize,
    /// Non-hypothesis duples of the batch failing after enforcement.
    pub violations: Vec<Duple>,
    /// Whether the batch is inconsistent.
    pub inconsistent: bool,
    /// Atomization size after the batch.
    pub atoms: usize,
}

/// Trace-guided crossing engine with cross-batch state.
#[derive(Debug, Clone)]
pub struct SparseCrossingEngine {
    model: Model,
    params: SparseCrossingParams,
    vars: SparseVars,
    tracer: Option<Tracer>,
    union_model: UnionModel,
    example_set: Vec<Duple>,
    counterexample_set: Vec<Duple>,
    constants_in_training: Segment,
    constants_in_master_and_training: Segment,
    clean_up: bool,
}

impl SparseCrossingEngine {
    /// Create an engine over `model`, validating `params`.
    pub fn new(model: Model, params: SparseCrossingParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            model,
            params,
            vars: SparseVars::default(),
            tracer: None,
            union_model: UnionModel::new(),
            example_set: Vec::new(),
            counterexample_set: Vec::new(),
            constants_in_training: Segment::new(),
            constants_in_master_and_training: Segment::new(),
            clean_up: false,
        })
    }

    /// The model being trained.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Mutable access to the model, for registering constants.
    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    /// Give the model back.
    pub fn into_model(self) -> Model {
        self.model
    }

    /// Replace the atomization.
    pub fn set_atomization(&mut self, atoms: Vec<Atom>) {
        self.model.atomization = atoms;
    }

    /// Engine parameters.
    pub fn params(&self) -> &SparseCrossingParams {
        &self.params
    }

    /// Mutable parameters; validated again on the next batch.
    pub fn params_mut(&mut self) -> &mut SparseCrossingParams {
        &mut self.params
    }

    /// Cross-batch counters.
    pub fn vars(&self) -> &SparseVars {
        &self.vars
    }

    /// Tracer of the last batch.
    pub fn tracer(&self) -> Option<&Tracer> {
        self.tracer.as_ref()
    }

    /// Union model.
    pub fn union_model(&self) -> &UnionModel {
        &self.union_model
    }

    /// Positive duples replayed with the next batch.
    pub fn stored_positives(&self) -> &[Duple] {
        &self.example_set
    }

    /// Add atoms produced elsewhere to the union model. The next batch
    /// rechecks them against every stored positive.
    pub fn extend_union_model(&mut self, atoms: impl IntoIterator<Item = Atom>) {
        self.union_model.extend_external(atoms);
    }

    /// Classify `duples` against the union model.
    pub fn test(&self, duples: &[Duple], region: Option<u32>) -> Accuracy {
        test_accuracy(duples, self.union_model.atoms(), region)
    }

    /// Enforce a batch of positive and negative duples.
    ///
    /// On `Err` the model, stored duples, union model and counters are
    /// restored to their state before the call.
    pub fn enforce<R: Rng + ?Sized>(
        &mut self,
        positives: Vec<Duple>,
        negatives: Vec<Duple>,
        rng: &mut R,
    ) -> Result<SparseReport> {
        self.params.validate()?;
        let checkpoint = self.clone();
        let outcome = self.run_batch(positives, negatives, rng);
        if let Err(err) = &outcome {
            warn!(error = %err, "Sparse crossing batch rolled back");
            *self = checkpoint;
        }
        outcome
    }

    fn run_batch<R: Rng + ?Sized>(
        &mut self,
        positives: Vec<Duple>,
        negatives: Vec<Duple>,
        rng: &mut R,
    ) -> Result<SparseReport> {
        let mut report = SparseReport::default();

        self.vars.pcount += positives.iter().filter(|d| d.region != 0).count();
        self.vars.ncount += negatives.iter().filter(|d| d.region != 0).count();
        let batch: Vec<Duple> = positives.iter().chain(&negatives).cloned().collect();

        let mut positives = positives;
        report.union_update = self.update_union_model(&mut positives)?;

        positives.shuffle(rng);
        positives.append(&mut self.example_set);
        self.example_set = positives;
        self.counterexample_set.extend(negatives);
        (report.new_constants, report.reseeded) = self.update_constants()?;
        info!(
            positives = self.example_set.len(),
            negatives = self.counterexample_set.len(),
            atoms = self.model.atomization.len(),
            "Sparse crossing batch"
        );

        let mut tracer = self.build_tracer(&report.union_update, rng);

        let mut space = TermSpace::new();
        for duple in self.counterexample_set.iter().chain(&self.example_set) {
            space.add(&duple.left);
            space.add(&duple.right);
        }
        space.free_trace_all(&tracer)?;

        let useful = tracer.select_useful_indicators(
            &self.counterexample_set,
            Some(&space),
            &self.model.registry,
        )?;
        if self.params.use_reduce_indicators {
            let mut singles = Segment::new();
            tracer.reduce_indicators(
                &self.counterexample_set,
                &useful,
                Some(&space),
                &self.model.registry,
                &mut singles,
                rng,
            )?;
        }
        tracer.remove_discarded_indicators();
        space.clear_free_traces();
        report.dropped_hypotheses += useful_dropped_hypotheses(&self.counterexample_set, &useful);

        self.vars.ndi = tracer.num_plain_indicators();
        self.vars.frac = self.vars.ndi as f64 / tracer.num_indicators().max(1) as f64;
        report.indicators = tracer.num_indicators();
        report.negative_indicators = self.vars.ndi;
        info!(
            indicators = report.indicators,
            negative = self.vars.ndi,
            "Final number of indicators"
        );

        let seeded = self.seed_atoms(&mut tracer, &mut space, &useful, rng)?;
        report.seeded = seeded.len();

        let segregate = self.params.segregate_by_generation;
        if segregate {
            self.model.generation += 1;
        }
        let generation = self.model.generation;
        self.model.atomization.extend(seeded.into_iter().map(|mut at| {
            if segregate {
                at.gen = generation;
            }
            at
        }));
        self.model.atomization = remove_repeated(std::mem::take(&mut self.model.atomization));
        tracer.store_traces_of_constants(&self.constants_in_training, &self.model.atomization)?;

        let crossed = self.cross_all(&mut tracer, &space, &mut report, rng)?;
        log_spectra(&self.model.atomization);

        self.union_model.append_batch(&self.model.atomization);
        if self.params.store_positives {
            info!(stored = crossed.len(), "Stored positives");
            self.example_set = crossed;
        } else {
            self.example_set.clear();
        }

        if let Some(threshold) = self.params.negative_indicator_threshold {
            if self.vars.frac < f64::from(threshold) {
                self.vars.union_model_fraction += 1;
            }
            info!(
                fraction = self.vars.frac,
                union_model_fraction = self.vars.union_model_fraction,
                "Fraction of negative indicators"
            );
        }

        self.counterexample_set.clear();
        if !self.params.static_constants && self.clean_up {
            report.retired = self.model.registry.retire_unused(
                &self.model.atomization,
                self.union_model.atoms(),
                &self.example_set,
            );
        }

        report.trace_violations = tracer.violations();
        self.tracer = Some(tracer);

        let check = check_batch(&batch, &self.model.atomization);
        report.dropped_hypotheses += check.dropped_hypotheses;
        let violated = settle(&check.violations, self.params.strictness, "sparse_crossing")?;
        report.inconsistent = violated || report.trace_violations > 0;
        report.violations = check.violations;
        report.atoms = self.model.atomization.len();

        info!(
            crossed = report.crossed,
            not_crossed = report.not_crossed,
            seeded = report.seeded,
            atoms = report.atoms,
            union_model = self.union_model.len(),
            "Sparse crossing done"
        );
        Ok(report)
    }

    // Check the union model against this batch's positives plus the stored
    // hypotheses, or every stored positive after an external extension.
    fn update_union_model(&mut self, positives: &mut [Duple]) -> Result<UnionUpdate> {
        let refresh = self.union_model.take_refresh_flag();
        let stored = self
            .example_set
            .iter_mut()
            .filter(|d| refresh || d.hypothesis);
        self.union_model
            .update_with_positive_duples(positives.iter_mut().chain(stored))
    }

    // Seed a singleton for every constant new to the training set, and for
    // every training constant left in no atom by an earlier simplification.
    // Every constant is checked against the registry. Returns the number of
    // new and of reseeded constants.
    fn update_constants(&mut self) -> Result<(usize, usize)> {
        let mut training = Segment::new();
        for duple in self.example_set.iter().chain(&self.counterexample_set) {
            training.union_with(&duple.left);
            training.union_with(&duple.right);
        }
        let mut covered = Segment::new();
        for at in &self.model.atomization {
            covered.union_with(at.ucs());
        }
        let master_and_training = training.union(&covered);
        self.model.registry.ensure_known(&master_and_training)?;

        let fresh = training.difference(&self.constants_in_training);
        let uncovered = training.difference(&covered).difference(&fresh);
        if !uncovered.is_empty() {
            info!(constants = %uncovered, "Reseeding uncovered constants");
        }
        self.model.seed_singletons(&fresh.union(&uncovered));

        self.clean_up = !master_and_training
            .difference(&self.constants_in_master_and_training)
            .is_empty();
        self.constants_in_training = training;
        self.constants_in_master_and_training = master_and_training;
        Ok((fresh.len(), uncovered.len()))
    }

    fn build_tracer<R: Rng + ?Sized>(&self, update: &UnionUpdate, rng: &mut R) -> Tracer {
        let (period, warning_sent) = self
            .tracer
            .as_ref()
            .map_or((0, false), |t| (t.period(), t.warning_sent()));
        let mut tracer = Tracer::new(period + 1, self.params.strictness);
        tracer.set_warning_sent(warning_sent);
        tracer.check_stored_traces = self.params.check_stored_traces;

        let mut seen = HashSet::new();
        for duple in &self.counterexample_set {
            if seen.insert(&duple.right) {
                tracer.add_negative_indicator(duple.right.clone());
            }
        }
        for at in self.union_model.pinning_candidates(
            &update.excluded,
            self.vars.union_model_fraction,
            rng,
        ) {
            tracer.add_pinning_atom(at);
        }

        tracer.ensure_indicators_unique();
        tracer.consider_positive_duples(&self.example_set);
        tracer.ensure_indicators_unique();
        tracer
    }

    // Atoms seeded before crossing: trace closure, or one singleton per
    // known constant when trace constraints are off.
    fn seed_atoms<R: Rng + ?Sized>(
        &self,
        tracer: &mut Tracer,
        space: &mut TermSpace,
        useful: &[usize],
        rng: &mut R,
    ) -> Result<Vec<Atom>> {
        let epoch = self.model.epoch;
        let generation = self.model.generation;

        if !self.params.enforce_trace_constraints {
            let seeded: Vec<Atom> = self
                .constants_in_master_and_training
                .iter()
                .map(|c| Atom::singleton(c, epoch, generation))
                .collect();
            let mut all = self.model.atomization.clone();
            all.extend(seeded.iter().cloned());
            space.trace_all(tracer, &all)?;
            return Ok(seeded);
        }

        let mut negatives: Vec<&Duple> = useful.iter().map(|&x| &self.counterexample_set[x]).collect();
        negatives.shuffle(rng);
        let mut positives: Vec<&Duple> = self.example_set.iter().collect();
        positives.shuffle(rng);

        let atoms = &self.model.atomization;
        space.trace_all(tracer, atoms)?;
        tracer.trace_closure(
            space,
            &positives,
            &negatives,
            atoms,
            self.params
                .by_quotient
                .then_some(&self.constants_in_master_and_training),
            epoch,
            generation,
            rng,
        )
    }

    fn growth_measure(&self) -> usize {
        if self.params.ignore_single_const_ucs {
            self.model
                .atomization
                .iter()
                .filter(|at| !at.is_singleton())
                .count()
        } else {
            self.model.atomization.len()
        }
    }

    // Cross every stored and new positive in order. Returns the crossed
    // region-bearing positives.
    fn cross_all<R: Rng + ?Sized>(
        &mut self,
        tracer: &mut Tracer,
        space: &TermSpace,
        report: &mut SparseReport,
        rng: &mut R,
    ) -> Result<Vec<Duple>> {
        let mut last_size = self.growth_measure();
        let mut crossed = Vec::new();
        let total = self.example_set.len();

        for i in 0..total {
            let duple = &self.example_set[i];
            let mut split = separate_discriminant(&duple.left, &duple.right, &self.model.atomization);
            if split.is_empty() {
                if duple.region != 0 {
                    report.not_crossed += 1;
                }
                continue;
            }
            if split.right.is_empty() && duple.hypothesis {
                debug!(duple = %duple, "Hypothesis dropped");
                report.dropped_hypotheses += 1;
                continue;
            }
            if split.right.is_empty() && !duple.right.is_empty() {
                // Simplification left every constant of the right side bare
                debug!(duple = %duple, "Reseeding right side");
                self.model.seed_singletons(&duple.right);
                report.reseeded += duple.right.len();
                split = separate_discriminant(&duple.left, &duple.right, &self.model.atomization);
            }

            self.model.epoch += 1;
            let products = {
                let atoms = &self.model.atomization;
                let disc: Vec<&Atom> = split.discriminant.iter().map(|&x| &atoms[x]).collect();
                let right: Vec<&Atom> = split.right.iter().map(|&x| &atoms[x]).collect();
                tracer.calculate_atom_set_product(&disc, &right, self.model.epoch, rng)?
            };

            let discriminant: Segment = split.discriminant.iter().map(|&x| x as u32).collect();
            let mut position = 0u32;
            self.model.atomization.retain(|_| {
                let keep = !discriminant.contains(position);
                position += 1;
                keep
            });
            self.model.atomization.extend(products);
            if self.params.remove_repetitions {
                self.model.atomization = remove_repeated(std::mem::take(&mut self.model.atomization));
            }

            if duple.region != 0 {
                crossed.push(duple.clone());
            }
            report.crossed += 1;

            let size = self.growth_measure();
            if size as f64 > f64::from(self.params.simplify_threshold) * last_size as f64 {
                self.reduce_by_traces(tracer, space, rng)?;
                last_size = self.growth_measure();
                info!(
                    progress = (i + 1) as f64 / total as f64,
                    atoms = self.model.atomization.len(),
                    "Simplified during crossing"
                );
            }
        }

        self.reduce_by_traces(tracer, space, rng)?;
        Ok(crossed)
    }

    fn reduce_by_traces<R: Rng + ?Sized>(
        &mut self,
        tracer: &mut Tracer,
        space: &TermSpace,
        rng: &mut R,
    ) -> Result<()> {
        if !self.params.reduction_by_traces {
            return Ok(());
        }
        let atoms = std::mem::take(&mut self.model.atomization);
        self.model.atomization = if self.params.use_simplify_from_terms {
            tracer.simplify_from_terms(&self.constants_in_training, atoms, space, rng)?
        } else {
            tracer.simplify_from_constants(&self.constants_in_training, atoms, rng)?
        };
        Ok(())
    }
}

// Hypothesis negatives left without a useful indicator.
fn useful_dropped_hypotheses(negatives: &[Duple], useful: &[usize]) -> usize {
    let useful: HashSet<usize> = useful.iter().copied().collect();
    negatives
        .iter()
        .enumerate()
        .filter(|(x, d)| d.hypothesis && !useful.contains(x))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Strictness;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seg(c: &[u32]) -> Segment {
        Segment::from(c)
    }

    fn engine(constants: usize, params: SparseCrossingParams) -> SparseCrossingEngine {
        let mut model = Model::new();
        model.registry.new_constants(constants);
        SparseCrossingEngine::new(model, params).unwrap()
    }

    #[test]
    fn test_batch_satisfies_duples() {
        let mut engine = engine(6, SparseCrossingParams::default());
        let mut rng = StdRng::seed_from_u64(42);
        let positives = vec![
            Duple::positive(seg(&[0]), seg(&[1])),
            Duple::positive(seg(&[2]), seg(&[3])),
        ];
        let negatives = vec![Duple::negative(seg(&[4]), seg(&[5]))];

        let report = engine
            .enforce(positives.clone(), negatives.clone(), &mut rng)
            .unwrap();
        assert!(!report.inconsistent);
        assert_eq!(report.crossed, 2);
        assert_eq!(report.new_constants, 6);
        assert_eq!(engine.model().generation, 1);

        let model = engine.model();
        for d in &positives {
            assert!(model.lower_or_equal(&d.left, &d.right));
        }
        for d in &negatives {
            assert!(!model.lower_or_equal(&d.left, &d.right));
        }
        assert_eq!(engine.stored_positives().len(), 2);
        assert!(!engine.union_model().is_empty());
    }

    #[test]
    fn test_without_simplification_keeps_all_products() {
        let params = SparseCrossingParams {
            reduction_by_traces: false,
            ..Default::default()
        };
        let mut engine = engine(6, params);
        let mut rng = StdRng::seed_from_u64(1);
        engine
            .enforce(
                vec![Duple::positive(seg(&[0]), seg(&[1]))],
                vec![Duple::negative(seg(&[4]), seg(&[5]))],
                &mut rng,
            )
            .unwrap();

        let ucs: HashSet<Segment> = engine
            .model()
            .atomization
            .iter()
            .map(|at| at.ucs().clone())
            .collect();
        // Only constants named by the batch get singletons
        let expected: HashSet<Segment> = vec![seg(&[0, 1]), seg(&[1]), seg(&[4]), seg(&[5])]
            .into_iter()
            .collect();
        assert_eq!(ucs, expected);
    }

    #[test]
    fn test_unknown_constant_rejected() {
        let mut engine = engine(2, SparseCrossingParams::default());
        let mut rng = StdRng::seed_from_u64(0);
        let err = engine
            .enforce(vec![Duple::positive(seg(&[0]), seg(&[7]))], vec![], &mut rng)
            .unwrap_err();
        assert!(matches!(err, crate::error::EngineError::Registry(_)));
    }

    #[test]
    fn test_contradiction_raises() {
        let mut engine = engine(4, SparseCrossingParams::default());
        let mut rng = StdRng::seed_from_u64(3);
        let err = engine
            .enforce(
                vec![Duple::positive(seg(&[0]), seg(&[1]))],
                vec![Duple::negative(seg(&[0]), seg(&[1]))],
                &mut rng,
            )
            .unwrap_err();
        assert!(err.is_inconsistency());
    }

    #[test]
    fn test_contradiction_reported() {
        let params = SparseCrossingParams {
            strictness: Strictness::Report,
            ..Default::default()
        };
        let mut engine = engine(4, params);
        let mut rng = StdRng::seed_from_u64(3);
        let report = engine
            .enforce(
                vec![Duple::positive(seg(&[0]), seg(&[1]))],
                vec![Duple::negative(seg(&[0]), seg(&[1]))],
                &mut rng,
            )
            .unwrap();
        assert!(report.inconsistent);
        assert!(report.trace_violations > 0);
    }

    #[test]
    fn test_raised_batch_is_rolled_back() {
        let mut engine = engine(8, SparseCrossingParams::default());
        let mut rng = StdRng::seed_from_u64(3);
        engine
            .enforce(
                vec![Duple::positive(seg(&[0]), seg(&[1]))],
                vec![Duple::negative(seg(&[0]), seg(&[1]))],
                &mut rng,
            )
            .unwrap_err();
        assert!(engine.stored_positives().is_empty());
        assert!(engine.union_model().is_empty());
        assert!(engine.model().atomization.is_empty());
        assert!(engine.tracer().is_none());
        assert_eq!(engine.vars(), &SparseVars::default());

        let positives = vec![Duple::positive(seg(&[4]), seg(&[5]))];
        let negatives = vec![Duple::negative(seg(&[6]), seg(&[7]))];
        let report = engine
            .enforce(positives.clone(), negatives.clone(), &mut rng)
            .unwrap();
        assert!(!report.inconsistent);
        assert_eq!(report.new_constants, 4);
        assert!(engine.model().lower_or_equal(&seg(&[4]), &seg(&[5])));
        assert!(!engine.model().lower_or_equal(&seg(&[6]), &seg(&[7])));
        assert_eq!(engine.stored_positives().len(), 1);
        assert_eq!(engine.stored_positives()[0].left, positives[0].left);
    }

    #[test]
    fn test_empty_right_side_vacuous() {
        for strictness in [Strictness::Raise, Strictness::Report] {
            let params = SparseCrossingParams {
                strictness,
                ..Default::default()
            };
            let positive = Duple::positive(seg(&[0]), Segment::new());

            let mut engine = engine(4, params);
            let mut rng = StdRng::seed_from_u64(21);
            let report = engine.enforce(vec![positive.clone()], vec![], &mut rng).unwrap();
            assert!(!report.inconsistent);
            assert_eq!(report.crossed, 1);
            assert!(engine.model().lower_or_equal(&positive.left, &positive.right));

            let mut model = Model::with_constants(4);
            let full = crate::crossing::FullCrossingEngine::new(Default::default()).unwrap();
            let full_report = full.enforce(&mut model, &[positive.clone()]).unwrap();
            assert_eq!(full_report.inconsistent, report.inconsistent);
            assert!(model.lower_or_equal(&positive.left, &positive.right));
        }
    }

    #[test]
    fn test_uncovered_constant_reseeded() {
        let mut engine = engine(6, SparseCrossingParams::default());
        let mut rng = StdRng::seed_from_u64(17);
        engine
            .enforce(
                vec![Duple::positive(seg(&[0]), seg(&[1]))],
                vec![Duple::negative(seg(&[4]), seg(&[5]))],
                &mut rng,
            )
            .unwrap();

        // Leave constant 1 in no atom
        let kept: Vec<Atom> = engine
            .model()
            .atomization
            .iter()
            .filter(|at| !at.ucs().contains(1))
            .cloned()
            .collect();
        engine.set_atomization(kept);

        let report = engine
            .enforce(
                vec![Duple::positive(seg(&[5]), seg(&[1]))],
                vec![Duple::negative(seg(&[1]), seg(&[5]))],
                &mut rng,
            )
            .unwrap();
        assert!(report.reseeded >= 1);
        assert!(!report.inconsistent);

        let model = engine.model();
        assert!(model.lower_or_equal(&seg(&[0]), &seg(&[1])));
        assert!(model.lower_or_equal(&seg(&[5]), &seg(&[1])));
        assert!(!model.lower_or_equal(&seg(&[1]), &seg(&[5])));
    }

    #[test]
    fn test_brute_force_seeding() {
        let params = SparseCrossingParams {
            enforce_trace_constraints: false,
            ..Default::default()
        };
        let mut engine = engine(4, params);
        let mut rng = StdRng::seed_from_u64(8);
        let report = engine
            .enforce(
                vec![Duple::positive(seg(&[0]), seg(&[1]))],
                vec![Duple::negative(seg(&[2]), seg(&[3]))],
                &mut rng,
            )
            .unwrap();
        assert_eq!(report.seeded, 4);
        assert!(!report.inconsistent);
        assert!(engine.model().lower_or_equal(&seg(&[0]), &seg(&[1])));
        assert!(!engine.model().lower_or_equal(&seg(&[2]), &seg(&[3])));
    }

    #[test]
    fn test_second_batch_carries_period_and_positives() {
        let mut engine = engine(6, SparseCrossingParams::default());
        let mut rng = StdRng::seed_from_u64(5);
        engine
            .enforce(
                vec![Duple::positive(seg(&[0]), seg(&[1]))],
                vec![Duple::negative(seg(&[4]), seg(&[5]))],
                &mut rng,
            )
            .unwrap();
        let period = engine.tracer().unwrap().period();
        let union_before = engine.union_model().len();

        let report = engine
            .enforce(
                vec![Duple::positive(seg(&[2]), seg(&[3]))],
                vec![Duple::negative(seg(&[1]), seg(&[0]))],
                &mut rng,
            )
            .unwrap();
        assert!(!report.inconsistent);
        assert!(engine.tracer().unwrap().period() > period);
        assert_eq!(engine.model().generation, 2);
        assert_eq!(report.union_update.total(), union_before);

        let model = engine.model();
        assert!(model.lower_or_equal(&seg(&[0]), &seg(&[1])));
        assert!(model.lower_or_equal(&seg(&[2]), &seg(&[3])));
        assert!(!model.lower_or_equal(&seg(&[1]), &seg(&[0])));
    }

    #[test]
    fn test_union_model_evaluation() {
        let mut engine = engine(4, SparseCrossingParams::default());
        let mut rng = StdRng::seed_from_u64(13);
        let positives = vec![Duple::positive(seg(&[0]), seg(&[1]))];
        let negatives = vec![Duple::negative(seg(&[2]), seg(&[3]))];
        engine
            .enforce(positives.clone(), negatives.clone(), &mut rng)
            .unwrap();

        let all: Vec<Duple> = positives.into_iter().chain(negatives).collect();
        let acc = engine.test(&all, None);
        assert_eq!(acc.positives, 1);
        assert_eq!(acc.fnr(), Some(0.0));
        assert_eq!(acc.fpr(), Some(0.0));
    }
}
