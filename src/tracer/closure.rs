//! Trace closure: seeding atoms until traces respect the batch.
//!
//! Before crossing, the traces of every duple side must already agree with
//! the duple: a negative duple needs an indicator in `trace(R) − trace(L)`,
//! a positive duple needs `trace(R) − trace(L)` to be empty. Small atoms are
//! seeded until both hold for every duple of the batch.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use super::{TermSpace, Tracer};
use crate::error::{EngineError, Result};
use crate::query::lower_atomic_segment;
use crate::reduction::remove_repeated;
use crate::types::{Atom, Constant, Duple, Segment};

impl Tracer {
    fn side_traces(
        &mut self,
        duple: &Duple,
        atoms: &[Atom],
        space: &TermSpace,
    ) -> Result<(Segment, Segment)> {
        let left = match space.trace(&duple.left) {
            Some(trace) => trace.clone(),
            None => self.trace_of_term(&duple.left, atoms)?,
        };
        let right = match space.trace(&duple.right) {
            Some(trace) => trace.clone(),
            None => self.trace_of_term(&duple.right, atoms)?,
        };
        Ok((left, right))
    }

    /// Seed at most one singleton `{c}`, `c ∈ R`, shrinking
    /// `trace(R) − trace(L)` of a positive duple.
    pub fn enforce_positive_trace_constraint<R: Rng + ?Sized>(
        &mut self,
        duple: &Duple,
        atoms: &[Atom],
        space: &TermSpace,
        epoch: u64,
        generation: u64,
        rng: &mut R,
    ) -> Result<Vec<Atom>> {
        if !duple.positive {
            return Err(EngineError::invariant(format!("not a positive duple: {}", duple)));
        }
        let (trace_l, trace_r) = self.side_traces(duple, atoms, space)?;

        let mut out = trace_r.difference(&trace_l);
        if out.is_empty() {
            return Ok(Vec::new());
        }
        // Crossing an empty right side removes the left atoms instead
        if duple.right.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates = duple.right.to_vec();
        candidates.shuffle(rng);
        let before = out.len();
        while let Some(c) = candidates.pop() {
            out = self.free_trace_over_subset(&Segment::singleton(c), &out)?;
            if out.len() < before {
                return Ok(vec![Atom::singleton(c, epoch, generation)]);
            }
        }

        self.warn_once(
            "enforce_positive_trace_constraint",
            format!("no constant of the right side shrinks the trace of {}", duple),
        );
        Ok(Vec::new())
    }

    /// Seed at most one singleton `{c}`, `c ∈ L ∖ R`, making
    /// `trace(R) − trace(L)` of a negative duple non-empty.
    pub fn enforce_negative_trace_constraint<R: Rng + ?Sized>(
        &mut self,
        duple: &Duple,
        atoms: &[Atom],
        space: &TermSpace,
        epoch: u64,
        generation: u64,
        rng: &mut R,
    ) -> Result<Vec<Atom>> {
        if duple.positive {
            return Err(EngineError::invariant(format!("not a negative duple: {}", duple)));
        }
        let (trace_l, trace_r) = self.side_traces(duple, atoms, space)?;
        if !trace_r.difference(&trace_l).is_empty() {
            return Ok(Vec::new());
        }

        let mut extra = duple.left.difference(&duple.right).to_vec();
        if extra.is_empty() {
            self.violation(
                "enforce_negative_trace_constraint",
                format!("left side contained in right side: {}", duple),
            )?;
            return Ok(Vec::new());
        }

        extra.shuffle(rng);
        while let Some(c) = extra.pop() {
            let narrowed = trace_l.intersection(&self.free_trace_of_constant(c)?);
            if !trace_r.difference(&narrowed).is_empty() {
                return Ok(vec![Atom::singleton(c, epoch, generation)]);
            }
        }

        self.violation(
            "enforce_negative_trace_constraint",
            format!("no constant separates the traces of {}", duple),
        )?;
        Ok(Vec::new())
    }

    /// Like [`Tracer::enforce_negative_trace_constraint`], but first tries
    /// quotient atoms `a.ucs ∖ R` of the atoms containing a constant of
    /// `L ∖ R`, keeping those that retain the largest share of their atom.
    ///
    /// `las` maps constants to positions in `atoms`.
    #[allow(clippy::too_many_arguments)]
    pub fn enforce_negative_trace_constraint_by_quotient<R: Rng + ?Sized>(
        &mut self,
        duple: &Duple,
        atoms: &[Atom],
        space: &TermSpace,
        las: &BTreeMap<Constant, Segment>,
        epoch: u64,
        generation: u64,
        rng: &mut R,
    ) -> Result<Vec<Atom>> {
        if duple.positive {
            return Err(EngineError::invariant(format!("not a negative duple: {}", duple)));
        }
        let (trace_l, trace_r) = self.side_traces(duple, atoms, space)?;
        if !trace_r.difference(&trace_l).is_empty() {
            return Ok(Vec::new());
        }

        let mut extra = duple.left.difference(&duple.right).to_vec();
        if extra.is_empty() {
            self.violation(
                "enforce_negative_trace_constraint_by_quotient",
                format!("left side contained in right side: {}", duple),
            )?;
            return Ok(Vec::new());
        }

        extra.shuffle(rng);
        while let Some(c) = extra.pop() {
            let mut best_ratio = 0.0f64;
            let mut quotients: Vec<Atom> = Vec::new();

            let mut candidates = las.get(&c).cloned().unwrap_or_default();
            while let Some(x) = candidates.choose(rng) {
                candidates.remove(x);
                let source = &atoms[x as usize];
                let ucs = source.ucs().difference(&duple.right);
                if ucs.len() <= 1 {
                    continue;
                }
                let ratio = ucs.len() as f64 / source.len() as f64;
                if ratio < best_ratio {
                    continue;
                }
                let quotient = Atom::new(ucs, epoch, generation);
                let narrowed = trace_l.intersection(&self.trace_of_atom(&quotient)?);
                if !trace_r.difference(&narrowed).is_empty() {
                    if ratio > best_ratio {
                        best_ratio = ratio;
                        quotients.clear();
                    }
                    quotients.push(quotient);
                }
            }

            if !quotients.is_empty() {
                return Ok(quotients);
            }

            let narrowed = trace_l.intersection(&self.free_trace_of_constant(c)?);
            if !trace_r.difference(&narrowed).is_empty() {
                return Ok(vec![Atom::singleton(c, epoch, generation)]);
            }
        }

        self.violation(
            "enforce_negative_trace_constraint_by_quotient",
            format!("no quotient or constant separates the traces of {}", duple),
        )?;
        Ok(Vec::new())
    }

    /// Repeat the trace constraints over all negatives, then all positives,
    /// until a full round seeds nothing. Returns the deduplicated seeds.
    ///
    /// `space` traces must describe `atoms`; they are narrowed as atoms are
    /// seeded. Duple sides missing from `space` are registered and traced.
    /// With `by_quotient`, quotient atoms are built over the constants of
    /// `constants`.
    #[allow(clippy::too_many_arguments)]
    pub fn trace_closure<R: Rng + ?Sized>(
        &mut self,
        space: &mut TermSpace,
        positives: &[&Duple],
        negatives: &[&Duple],
        atoms: &[Atom],
        by_quotient: Option<&Segment>,
        epoch: u64,
        generation: u64,
        rng: &mut R,
    ) -> Result<Vec<Atom>> {
        for duple in positives.iter().chain(negatives) {
            for term in [&duple.left, &duple.right] {
                if space.trace(term).is_none() {
                    let trace = self.trace_of_term(term, atoms)?;
                    space.set_trace(term, trace);
                }
            }
        }

        let las = by_quotient.map(|constants| {
            debug!("Calculating lower atomic segments");
            lower_atomic_segment(atoms, constants)
        });

        let mut seeded: Vec<Atom> = Vec::new();
        let mut rounds = 0usize;
        loop {
            rounds += 1;
            let mut enforced = true;

            for duple in negatives {
                let new_atoms = match &las {
                    Some(las) => self.enforce_negative_trace_constraint_by_quotient(
                        duple, atoms, space, las, epoch, generation, rng,
                    )?,
                    None => self.enforce_negative_trace_constraint(
                        duple, atoms, space, epoch, generation, rng,
                    )?,
                };
                if !new_atoms.is_empty() {
                    enforced = false;
                    space.update_traces(self, &new_atoms)?;
                    seeded.extend(new_atoms);
                }
            }

            for duple in positives {
                let new_atoms = self.enforce_positive_trace_constraint(
                    duple, atoms, space, epoch, generation, rng,
                )?;
                if !new_atoms.is_empty() {
                    enforced = false;
                    space.update_traces(self, &new_atoms)?;
                    seeded.extend(new_atoms);
                }
            }

            debug!(rounds, seeded = seeded.len(), "Trace closure round");
            if enforced {
                break;
            }
        }

        let seeded = remove_repeated(seeded);
        info!(seeded = seeded.len(), rounds, "Traces enforced");
        Ok(seeded)
    }
}
