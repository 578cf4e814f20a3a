//! Trace simplification.
//!
//! After crossing, many atoms are interchangeable as far as the stored traces
//! are concerned. Simplification keeps a random subset of atoms that still
//! reproduces the stored trace of every training constant (or of every term
//! in the term space), and drops the rest.

use std::collections::BTreeMap;

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use tracing::info;

use super::{TermSpace, Tracer};
use crate::error::{EngineError, Result};
use crate::types::{Atom, Constant, Segment};

struct TraceTables {
    max_trace: Segment,
    // indicator -> positions of atoms not carrying it
    lacking: Vec<Segment>,
    // constant -> positions of atoms containing it
    las: BTreeMap<Constant, Segment>,
    traces: Vec<Segment>,
}

impl Tracer {
    fn trace_tables(&mut self, constants: &Segment, atoms: &[Atom]) -> Result<TraceTables> {
        let max_trace = Segment::full(self.num_indicators());
        let mut lacking = vec![Segment::new(); self.num_indicators()];
        let mut las: BTreeMap<Constant, Segment> =
            constants.iter().map(|c| (c, Segment::new())).collect();
        let mut traces = Vec::with_capacity(atoms.len());

        for (x, at) in atoms.iter().enumerate() {
            let trace = self.trace_of_atom(at)?;
            for i in &max_trace.difference(&trace) {
                lacking[i as usize].insert(x as u32);
            }
            for c in &at.ucs().intersection(constants) {
                las.entry(c).or_default().insert(x as u32);
            }
            traces.push(trace);
        }

        Ok(TraceTables {
            max_trace,
            lacking,
            las,
            traces,
        })
    }

    // Cover `out` with atoms among `pool`, reusing already selected atoms
    // when possible.
    #[allow(clippy::too_many_arguments)]
    fn cover<R: Rng + ?Sized>(
        &mut self,
        tables: &TraceTables,
        pool: &Segment,
        mut out: Segment,
        selected: &mut Segment,
        order: &mut Vec<usize>,
        stage: &'static str,
        rng: &mut R,
    ) -> usize {
        let mut steps = 0;
        while let Some(eta) = out.choose(rng) {
            steps += 1;
            let candidates = tables.lacking[eta as usize].intersection(pool);
            if candidates.is_empty() {
                self.warn_once(stage, format!("indicator {} cannot be covered", eta));
                break;
            }

            let reused = candidates.intersection(selected);
            let x = match reused.choose(rng) {
                Some(x) => x,
                None => match candidates.choose(rng) {
                    Some(x) => {
                        selected.insert(x);
                        order.push(x as usize);
                        x
                    }
                    None => break,
                },
            };
            out.intersect_with(&tables.traces[x as usize]);
        }
        steps
    }

    /// Keep a subset of `atoms` reproducing the stored trace of every
    /// constant of `constants`.
    pub fn simplify_from_constants<R: Rng + ?Sized>(
        &mut self,
        constants: &Segment,
        atoms: Vec<Atom>,
        rng: &mut R,
    ) -> Result<Vec<Atom>> {
        let tables = self.trace_tables(constants, &atoms)?;

        let mut constant_list = constants.to_vec();
        constant_list.shuffle(rng);

        let mut selected = Segment::new();
        let mut order = Vec::new();
        let mut steps = 0;
        for c in constant_list {
            let stored = self.stored_trace_of_constant(c)?;
            let pool = tables.las.get(&c).cloned().unwrap_or_default();
            let out = tables.max_trace.difference(&stored);
            steps += self.cover(&tables, &pool, out, &mut selected, &mut order, "simplify_from_constants", rng);
        }

        info!(before = atoms.len(), after = order.len(), steps, "Trace simplification");
        Ok(take_positions(atoms, &order))
    }

    /// Keep a subset of `atoms` reproducing the trace of every term of
    /// `space`. Terms touching no atom keep nothing; terms with a full trace
    /// keep one atom of their lower atomic segment.
    pub fn simplify_from_terms<R: Rng + ?Sized>(
        &mut self,
        constants: &Segment,
        atoms: Vec<Atom>,
        space: &TermSpace,
        rng: &mut R,
    ) -> Result<Vec<Atom>> {
        let tables = self.trace_tables(constants, &atoms)?;

        let mut terms: Vec<usize> = (0..space.len()).collect();
        terms.shuffle(rng);

        let mut selected = Segment::new();
        let mut order = Vec::new();
        for x in terms {
            let wt = &space.terms()[x];
            let mut pool = Segment::new();
            for c in &wt.term {
                if let Some(positions) = tables.las.get(&c) {
                    pool.union_with(positions);
                }
            }

            let trace = wt.trace.as_ref().ok_or_else(|| {
                EngineError::invariant(format!("term {} has no trace", wt.term))
            })?;
            let out = tables.max_trace.difference(trace);

            if out.is_empty() && !pool.is_empty() && pool.is_disjoint(&selected) {
                let candidates = pool.to_vec();
                if let Some(&y) = candidates.choose(rng) {
                    selected.insert(y);
                }
            }
            self.cover(&tables, &pool, out, &mut selected, &mut order, "simplify_from_terms", rng);
        }

        info!(before = atoms.len(), after = selected.len(), "Trace simplification from terms");
        let ascending: Vec<usize> = selected.iter().map(|x| x as usize).collect();
        Ok(take_positions(atoms, &ascending))
    }
}

fn take_positions(atoms: Vec<Atom>, positions: &[usize]) -> Vec<Atom> {
    let mut slots: Vec<Option<Atom>> = atoms.into_iter().map(Some).collect();
    positions
        .iter()
        .filter_map(|&x| slots.get_mut(x).and_then(Option::take))
        .collect()
}
