//! Indicator cache guiding sparse crossing.
//!
//! A tracer holds a list of *indicators* against which constants, terms and
//! atoms are summarized as bitsets called traces. Indicator positions are
//! numbered as follows:
//!
//! | Positions | Indicator | Free when |
//! |-----------|-----------|-----------|
//! | `0..p` | plain indicator (a segment) | the term is a subset of it |
//! | `p..p+q` | pinning atom | the term is disjoint from its ucs |
//!
//! The *free trace* of a term is the set of positions it is free of. The
//! trace of an atom is the union of the free traces of its constants; the
//! trace of a term in an atomization is the intersection of the traces of the
//! atoms intersecting it.
//!
//! ## Versioning
//!
//! Every mutation of the indicator list bumps `period`. Atoms memoize their
//! trace stamped with the period that computed it; a stamp older than the
//! tracer is stale and recomputed, a stamp newer than the tracer is an
//! invariant violation.

pub mod closure;
pub mod simplify;
pub mod term_space;

use std::collections::{HashMap, HashSet};

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, Result};
use crate::policy::Strictness;
use crate::types::{Atom, Constant, ConstantRegistry, Duple, Segment};

pub use term_space::{TermSpace, WrappedTerm};

/// Indicator cache.
#[derive(Debug, Clone)]
pub struct Tracer {
    indicators: Vec<Segment>,
    pinning: Vec<Atom>,
    discarded: Segment,
    period: u64,
    /// Memoize atom traces inside the atoms.
    pub store_traces: bool,
    /// Re-validate term traces against free traces.
    pub check_stored_traces: bool,
    strictness: Strictness,
    warning_sent: bool,
    violations: usize,
    constant_free_traces: HashMap<Constant, (Segment, u64)>,
    constant_stored_traces: HashMap<Constant, (Segment, u64)>,
}

impl Tracer {
    /// Create an empty tracer starting at `period`.
    pub fn new(period: u64, strictness: Strictness) -> Self {
        Self {
            indicators: Vec::new(),
            pinning: Vec::new(),
            discarded: Segment::new(),
            period,
            store_traces: true,
            check_stored_traces: false,
            strictness,
            warning_sent: false,
            violations: 0,
            constant_free_traces: HashMap::new(),
            constant_stored_traces: HashMap::new(),
        }
    }

    /// Current period.
    pub fn period(&self) -> u64 {
        self.period
    }

    /// Plain plus pinning indicators.
    pub fn num_indicators(&self) -> usize {
        self.indicators.len() + self.pinning.len()
    }

    /// Number of plain indicators.
    pub fn num_plain_indicators(&self) -> usize {
        self.indicators.len()
    }

    /// Plain indicators.
    pub fn indicators(&self) -> &[Segment] {
        &self.indicators
    }

    /// Pinning atoms.
    pub fn pinning_atoms(&self) -> &[Atom] {
        &self.pinning
    }

    /// Indicators marked for removal.
    pub fn discarded(&self) -> &Segment {
        &self.discarded
    }

    /// Whether a trace violation was already reported.
    pub fn warning_sent(&self) -> bool {
        self.warning_sent
    }

    /// Carry the reported flag over from a previous tracer.
    pub fn set_warning_sent(&mut self, sent: bool) {
        self.warning_sent = sent;
    }

    /// Trace violations seen so far, reported or not.
    pub fn violations(&self) -> usize {
        self.violations
    }

    /// Add a plain indicator.
    pub fn add_negative_indicator(&mut self, indicator: Segment) {
        self.indicators.push(indicator);
        self.period += 1;
    }

    /// Add a pinning atom.
    pub fn add_pinning_atom(&mut self, atom: Atom) {
        self.pinning.push(atom);
        self.period += 1;
    }

    /// Close every plain indicator under the positive duples: whenever the
    /// right side of a duple is inside an indicator, its left side is added.
    pub fn consider_positive_duples<'a>(&mut self, positives: impl IntoIterator<Item = &'a Duple> + Clone) {
        for indicator in &mut self.indicators {
            let mut modified = true;
            while modified {
                modified = false;
                for duple in positives.clone() {
                    if duple.right.is_subset(indicator) {
                        let before = indicator.len();
                        indicator.union_with(&duple.left);
                        modified |= indicator.len() > before;
                    }
                }
            }
        }
        self.period += 1;
    }

    /// Remove repeated plain indicators, keeping first occurrences.
    pub fn ensure_indicators_unique(&mut self) {
        let before = self.num_indicators();
        let mut seen = HashSet::with_capacity(self.indicators.len());
        self.indicators.retain(|ind| seen.insert(ind.clone()));
        self.period += 1;
        info!(before, after = self.num_indicators(), "Unique indicators");
    }

    fn require_no_discarded(&self, stage: &str) -> Result<()> {
        if self.discarded.is_empty() {
            Ok(())
        } else {
            Err(EngineError::invariant(format!(
                "{}: {} discarded indicators not removed",
                stage,
                self.discarded.len()
            )))
        }
    }

    // Free trace without the discarded-indicator guard; positions are those
    // of the full indicator list.
    fn raw_free_trace_of_term(&self, term: &Segment) -> Segment {
        let shift = self.indicators.len() as u32;
        let mut out = Segment::new();
        for (i, ind) in self.indicators.iter().enumerate() {
            if term.is_subset(ind) {
                out.insert(i as u32);
            }
        }
        for (j, at) in self.pinning.iter().enumerate() {
            if at.ucs().is_disjoint(term) {
                out.insert(shift + j as u32);
            }
        }
        out
    }

    /// Positions of the indicators `term` is free of.
    pub fn free_trace_of_term(&self, term: &Segment) -> Result<Segment> {
        self.require_no_discarded("free_trace_of_term")?;
        Ok(self.raw_free_trace_of_term(term))
    }

    /// Free trace of `term` restricted to the positions of `subset`.
    pub fn free_trace_over_subset(&self, term: &Segment, subset: &Segment) -> Result<Segment> {
        self.require_no_discarded("free_trace_over_subset")?;
        let shift = self.indicators.len() as u32;
        let mut out = Segment::new();
        for i in subset {
            let free = if i < shift {
                self.indicators
                    .get(i as usize)
                    .is_some_and(|ind| term.is_subset(ind))
            } else {
                self.pinning
                    .get((i - shift) as usize)
                    .is_some_and(|at| at.ucs().is_disjoint(term))
            };
            if free {
                out.insert(i);
            }
        }
        Ok(out)
    }

    /// Free trace of the singleton term `{c}`, memoized per period.
    pub fn free_trace_of_constant(&mut self, c: Constant) -> Result<Segment> {
        if let Some((trace, period)) = self.constant_free_traces.get(&c) {
            if *period == self.period {
                return Ok(trace.clone());
            }
        }
        let trace = self.free_trace_of_term(&Segment::singleton(c))?;
        self.constant_free_traces
            .insert(c, (trace.clone(), self.period));
        Ok(trace)
    }

    /// Trace of an atom, served from its cache when current.
    pub fn trace_of_atom(&mut self, atom: &Atom) -> Result<Segment> {
        if let Some(cached) = atom.cached_trace().as_ref() {
            if cached.period > self.period {
                return Err(EngineError::invariant(format!(
                    "atom {} trace stamped at period {} ahead of tracer period {}",
                    atom.id(),
                    cached.period,
                    self.period
                )));
            }
            if cached.period == self.period {
                return Ok(cached.trace.clone());
            }
        }

        let mut trace = Segment::new();
        for c in atom.ucs() {
            trace.union_with(&self.free_trace_of_constant(c)?);
        }
        if self.store_traces {
            atom.store_trace(trace.clone(), self.period);
        }
        Ok(trace)
    }

    /// Trace of an atom computed straight from the indicators, bypassing
    /// every cache.
    pub fn trace_of_atom_direct(&self, atom: &Atom) -> Segment {
        let shift = self.indicators.len() as u32;
        let mut out = Segment::new();
        for (i, ind) in self.indicators.iter().enumerate() {
            if atom.ucs().intersects(ind) {
                out.insert(i as u32);
            }
        }
        for (j, pin) in self.pinning.iter().enumerate() {
            if !atom.ucs().is_subset(pin.ucs()) {
                out.insert(shift + j as u32);
            }
        }
        out
    }

    fn full_trace(&self) -> Segment {
        Segment::full(self.num_indicators())
    }

    /// Trace of `term` in `atoms`: the intersection of the traces of the
    /// atoms intersecting it.
    pub fn trace_of_term(&mut self, term: &Segment, atoms: &[Atom]) -> Result<Segment> {
        self.require_no_discarded("trace_of_term")?;

        let mut trace = self.full_trace();
        for at in atoms.iter().filter(|at| at.ucs().intersects(term)) {
            trace.intersect_with(&self.trace_of_atom(at)?);
        }

        if self.check_stored_traces {
            let free = self.free_trace_of_term(term)?;
            if !free.is_subset(&trace) {
                for at in atoms {
                    at.clear_trace();
                }
                let mut fresh = self.full_trace();
                for at in atoms.iter().filter(|at| at.ucs().intersects(term)) {
                    fresh.intersect_with(&self.trace_of_atom(at)?);
                }
                if free.is_subset(&fresh) {
                    error!(term = %term, "Stale atom trace cache");
                }
                return Err(EngineError::invariant(format!(
                    "free trace of {} not contained in its trace",
                    term
                )));
            }
        }
        Ok(trace)
    }

    /// Record a trace violation. Under [`Strictness::Raise`] the first one is
    /// returned as an error; later ones, and every one under
    /// [`Strictness::Report`], are only counted.
    pub(crate) fn violation(&mut self, stage: &'static str, detail: String) -> Result<()> {
        self.violations += 1;
        if self.strictness == Strictness::Raise && !self.warning_sent {
            self.warning_sent = true;
            error!(stage, %detail, "Trace violation");
            return Err(EngineError::inconsistent(stage, detail));
        }
        debug!(stage, %detail, "Trace violation");
        Ok(())
    }

    /// Log a trace warning once under [`Strictness::Raise`]. Warnings do not
    /// count as violations.
    pub(crate) fn warn_once(&mut self, stage: &'static str, detail: String) {
        if self.strictness == Strictness::Raise && !self.warning_sent {
            self.warning_sent = true;
            warn!(stage, %detail, "Trace warning");
        }
    }

    fn side_free_traces(&self, duple: &Duple, space: Option<&TermSpace>) -> (Segment, Segment) {
        let lookup = |term: &Segment| {
            space
                .and_then(|s| s.free_trace(term))
                .cloned()
                .unwrap_or_else(|| self.raw_free_trace_of_term(term))
        };
        (lookup(&duple.left), lookup(&duple.right))
    }

    /// Keep every indicator discriminating at least one negative duple.
    ///
    /// Returns the positions in `negatives` of the duples that remain
    /// discriminable. A hypothesis with no discriminating indicator is
    /// dropped; any other such duple is a trace violation.
    pub fn select_useful_indicators(
        &mut self,
        negatives: &[Duple],
        space: Option<&TermSpace>,
        registry: &ConstantRegistry,
    ) -> Result<Vec<usize>> {
        self.require_no_discarded("select_useful_indicators")?;

        let mut take = Segment::new();
        let mut kept = Vec::with_capacity(negatives.len());
        for (x, duple) in negatives.iter().enumerate() {
            let (free_left, free_right) = self.side_free_traces(duple, space);
            let useful = free_right.difference(&free_left);
            if useful.is_empty() {
                if duple.hypothesis {
                    debug!(duple = %duple, "Hypothesis deleted");
                } else {
                    let detail = format!(
                        "no indicator separates {:?} from {:?}",
                        registry.interpret(&duple.left),
                        registry.interpret(&duple.right)
                    );
                    self.violation("select_useful_indicators", detail)?;
                }
            } else {
                take.union_with(&useful);
                kept.push(x);
            }
        }

        self.discarded = self.full_trace().difference(&take);
        info!(useful = take.len(), "Selected useful indicators");
        Ok(kept)
    }

    /// Shrink the useful indicators further towards a small (not minimal)
    /// set that still discriminates every duple of `selected`.
    ///
    /// `selected` are positions in `negatives`. `singles` collects indicators
    /// that are the only discriminator of some duple.
    pub fn reduce_indicators<R: Rng + ?Sized>(
        &mut self,
        negatives: &[Duple],
        selected: &[usize],
        space: Option<&TermSpace>,
        registry: &ConstantRegistry,
        singles: &mut Segment,
        rng: &mut R,
    ) -> Result<()> {
        let mut pending: Vec<usize> = selected.to_vec();
        loop {
            pending.shuffle(rng);

            let mut take = Segment::new();
            let mut settled: HashSet<usize> = HashSet::new();
            for &x in &pending {
                let duple = &negatives[x];
                let (free_left, free_right) = self.side_free_traces(duple, space);
                let disc = free_right.difference(&free_left).difference(&self.discarded);
                if disc.is_empty() {
                    let detail = format!(
                        "reduction left no indicator separating {:?} from {:?}",
                        registry.interpret(&duple.left),
                        registry.interpret(&duple.right)
                    );
                    self.violation("reduce_indicators", detail)?;
                } else if disc.is_disjoint(singles) {
                    if disc.len() == 1 {
                        singles.union_with(&disc);
                        settled.insert(x);
                    } else if disc.is_disjoint(&take) {
                        if let Some(i) = disc.choose(rng) {
                            take.insert(i);
                        }
                    }
                } else {
                    settled.insert(x);
                }
            }

            take.union_with(singles);
            pending.retain(|x| !settled.contains(x));
            info!(indicators = take.len(), "Reduced indicators");

            let discarded = self.full_trace().difference(&take);
            let shrinking = discarded.len() > self.discarded.len();
            self.discarded = discarded;
            if !shrinking || pending.is_empty() {
                return Ok(());
            }
        }
    }

    /// Drop the discarded indicators and renumber the rest.
    pub fn remove_discarded_indicators(&mut self) {
        let shift = self.indicators.len() as u32;
        let discarded = std::mem::take(&mut self.discarded);

        let mut position = 0u32;
        self.indicators.retain(|_| {
            let keep = !discarded.contains(position);
            position += 1;
            keep
        });
        let mut position = shift;
        self.pinning.retain(|_| {
            let keep = !discarded.contains(position);
            position += 1;
            keep
        });
        self.period += 1;
    }

    /// Sparse product of discriminant atoms with right-side atoms.
    ///
    /// For each discriminant atom, the indicators missing from its trace are
    /// covered one at a time: a random uncovered indicator is chosen and the
    /// discriminant atom is united with a random right atom lacking it. Each
    /// union is a new atom. If no union was needed, one random right atom is
    /// used. With no right atoms the product is empty and the discriminant
    /// atoms vanish, as in full crossing.
    pub fn calculate_atom_set_product<R: Rng + ?Sized>(
        &mut self,
        discriminant: &[&Atom],
        right: &[&Atom],
        epoch: u64,
        rng: &mut R,
    ) -> Result<Vec<Atom>> {
        if right.is_empty() {
            debug!(discriminant = discriminant.len(), "No right atom, discriminant vanishes");
            return Ok(Vec::new());
        }
        let max_trace = self.full_trace();

        // indicator -> right atoms not carrying it
        let mut lacking: Vec<Vec<usize>> = vec![Vec::new(); self.num_indicators()];
        let mut right_traces = Vec::with_capacity(right.len());
        for (x, at) in right.iter().enumerate() {
            let trace = self.trace_of_atom(at)?;
            for i in &max_trace.difference(&trace) {
                lacking[i as usize].push(x);
            }
            right_traces.push(trace);
        }

        let mut out = Vec::new();
        for at_l in discriminant {
            let trace_l = self.trace_of_atom(at_l)?;
            let mut picked = false;

            let mut uncovered = max_trace.difference(&trace_l);
            while let Some(eta) = uncovered.choose(rng) {
                match lacking[eta as usize].choose(rng) {
                    Some(&x) => {
                        uncovered.intersect_with(&right_traces[x]);
                        out.push(self.product_atom(at_l, &trace_l, right[x], &right_traces[x], epoch));
                        picked = true;
                    }
                    None => {
                        self.violation(
                            "calculate_atom_set_product",
                            format!("no right atom covers indicator {} for {}", eta, at_l),
                        )?;
                        uncovered.remove(eta);
                    }
                }
            }

            if !picked {
                let x = rng.random_range(0..right.len());
                out.push(self.product_atom(at_l, &trace_l, right[x], &right_traces[x], epoch));
            }
        }
        Ok(out)
    }

    fn product_atom(
        &self,
        left: &Atom,
        left_trace: &Segment,
        right: &Atom,
        right_trace: &Segment,
        epoch: u64,
    ) -> Atom {
        let atom = left.union(right, epoch);
        if self.store_traces {
            atom.store_trace(left_trace.union(right_trace), self.period);
        }
        atom
    }

    /// Store the trace of every constant of `constants` in `atoms`.
    pub fn store_traces_of_constants(&mut self, constants: &Segment, atoms: &[Atom]) -> Result<()> {
        info!(constants = constants.len(), "Storing traces of constants");
        for c in constants {
            let trace = self.trace_of_term(&Segment::singleton(c), atoms)?;
            self.constant_stored_traces.insert(c, (trace, self.period));
        }
        Ok(())
    }

    /// Trace of `c` stored at the current period.
    pub fn stored_trace_of_constant(&self, c: Constant) -> Result<Segment> {
        match self.constant_stored_traces.get(&c) {
            Some((trace, period)) if *period == self.period => Ok(trace.clone()),
            Some((_, period)) => Err(EngineError::invariant(format!(
                "stored trace of constant {} from period {} (tracer at {})",
                c, period, self.period
            ))),
            None => Err(EngineError::invariant(format!(
                "no stored trace for constant {}",
                c
            ))),
        }
    }
}
