//! Deduplicating registry of terms with memoized traces.
//!
//! Every duple side of a batch is registered once, so traces of terms shared
//! by many duples are computed a single time and updated incrementally while
//! the trace closure seeds atoms.

use std::collections::HashMap;

use tracing::info;

use super::Tracer;
use crate::error::Result;
use crate::types::{Atom, Segment};

/// A registered term and its cached traces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedTerm {
    /// The term.
    pub term: Segment,
    /// Trace of the term in the working atomization.
    pub trace: Option<Segment>,
    /// Free trace of the term.
    pub free_trace: Option<Segment>,
}

/// Set of distinct terms.
#[derive(Debug, Clone, Default)]
pub struct TermSpace {
    index: HashMap<Segment, usize>,
    terms: Vec<WrappedTerm>,
}

impl TermSpace {
    /// Create an empty space.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `term` and return its position. Equal terms share one entry.
    pub fn add(&mut self, term: &Segment) -> usize {
        if let Some(&x) = self.index.get(term) {
            return x;
        }
        let x = self.terms.len();
        self.index.insert(term.clone(), x);
        self.terms.push(WrappedTerm {
            term: term.clone(),
            trace: None,
            free_trace: None,
        });
        x
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the space is empty.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Registered terms in registration order.
    pub fn terms(&self) -> &[WrappedTerm] {
        &self.terms
    }

    /// Entry for `term`, if registered.
    pub fn get(&self, term: &Segment) -> Option<&WrappedTerm> {
        self.index.get(term).map(|&x| &self.terms[x])
    }

    /// Cached trace of `term`.
    pub fn trace(&self, term: &Segment) -> Option<&Segment> {
        self.get(term).and_then(|wt| wt.trace.as_ref())
    }

    /// Cached free trace of `term`.
    pub fn free_trace(&self, term: &Segment) -> Option<&Segment> {
        self.get(term).and_then(|wt| wt.free_trace.as_ref())
    }

    /// Register `term` if needed and set its trace.
    pub fn set_trace(&mut self, term: &Segment, trace: Segment) {
        let x = self.add(term);
        self.terms[x].trace = Some(trace);
    }

    /// Compute the free trace of every term.
    pub fn free_trace_all(&mut self, tracer: &Tracer) -> Result<()> {
        info!(terms = self.terms.len(), "Calculating free traces");
        for wt in &mut self.terms {
            wt.free_trace = Some(tracer.free_trace_of_term(&wt.term)?);
        }
        Ok(())
    }

    /// Drop every free trace; needed once indicators are renumbered.
    pub fn clear_free_traces(&mut self) {
        for wt in &mut self.terms {
            wt.free_trace = None;
        }
    }

    /// Compute the trace of every term in `atoms`.
    pub fn trace_all(&mut self, tracer: &mut Tracer, atoms: &[Atom]) -> Result<()> {
        info!(terms = self.terms.len(), atoms = atoms.len(), "Calculating traces");
        for wt in &mut self.terms {
            wt.trace = Some(tracer.trace_of_term(&wt.term, atoms)?);
        }
        Ok(())
    }

    /// Narrow the cached traces by atoms newly added to the atomization.
    pub fn update_traces(&mut self, tracer: &mut Tracer, new_atoms: &[Atom]) -> Result<()> {
        for wt in &mut self.terms {
            for at in new_atoms.iter().filter(|at| at.ucs().intersects(&wt.term)) {
                let atom_trace = tracer.trace_of_atom(at)?;
                if let Some(trace) = wt.trace.as_mut() {
                    trace.intersect_with(&atom_trace);
                }
            }
        }
        Ok(())
    }
}
