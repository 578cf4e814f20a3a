//! Model snapshots for external persistence.
//!
//! A snapshot carries what is needed to rebuild a model: the registry (name
//! map, live set, last allocated id), the step counters and one
//! `(ucs, gen, g)` record per atom. Traces and periods are never persisted;
//! they are recomputed lazily by the next tracer.
//!
//! The `fingerprint` is the xxh64 canonical hash of every other field, atoms
//! in atomization order (order is part of the state: it drives the random
//! choices of later crossings).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_hash_hex, to_canonical_bytes};
use crate::error::{EngineError, Result};
use crate::model::Model;
use crate::types::{Atom, Constant, ConstantRegistry, Segment};
use crate::SNAPSHOT_SCHEMA_VERSION;

/// Persisted form of an atom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomRecord {
    /// Upper constant segment.
    pub ucs: Segment,
    /// Generation.
    pub gen: u64,
    /// Crossing depth.
    pub g: u32,
}

impl From<&Atom> for AtomRecord {
    fn from(atom: &Atom) -> Self {
        Self {
            ucs: atom.ucs().clone(),
            gen: atom.gen,
            g: atom.g,
        }
    }
}

/// Persisted form of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// Snapshot schema version.
    pub schema_version: String,
    /// Constant names by id.
    pub names: BTreeMap<Constant, String>,
    /// Live constants.
    pub live: Segment,
    /// Highest allocated constant.
    pub last_defined: Option<Constant>,
    /// Crossing step counter.
    pub epoch: u64,
    /// Batch generation counter.
    pub generation: u64,
    /// Atoms in atomization order.
    pub atoms: Vec<AtomRecord>,
    /// Hash of all fields above.
    pub fingerprint: String,
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    schema_version: &'a str,
    names: &'a BTreeMap<Constant, String>,
    live: &'a Segment,
    last_defined: Option<Constant>,
    epoch: u64,
    generation: u64,
    atoms: &'a [AtomRecord],
}

impl ModelSnapshot {
    /// Capture `model`.
    pub fn capture(model: &Model) -> Self {
        let mut snapshot = Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION.to_string(),
            names: model.registry.names().clone(),
            live: model.registry.live().clone(),
            last_defined: model.registry.last_defined(),
            epoch: model.epoch,
            generation: model.generation,
            atoms: model.atomization.iter().map(AtomRecord::from).collect(),
            fingerprint: String::new(),
        };
        snapshot.fingerprint = snapshot.compute_fingerprint();
        snapshot
    }

    fn compute_fingerprint(&self) -> String {
        canonical_hash_hex(&FingerprintInput {
            schema_version: &self.schema_version,
            names: &self.names,
            live: &self.live,
            last_defined: self.last_defined,
            epoch: self.epoch,
            generation: self.generation,
            atoms: &self.atoms,
        })
    }

    /// Whether the fingerprint matches the content.
    pub fn verify(&self) -> bool {
        self.fingerprint == self.compute_fingerprint()
    }

    /// Rebuild the model. Atoms get fresh ids and the snapshot epoch.
    ///
    /// Fails on a fingerprint mismatch, a zero atom, or a constant beyond
    /// the last allocated one.
    pub fn restore(&self) -> Result<Model> {
        if !self.verify() {
            return Err(EngineError::invariant(format!(
                "snapshot fingerprint mismatch: stored {}, computed {}",
                self.fingerprint,
                self.compute_fingerprint()
            )));
        }

        let registry =
            ConstantRegistry::restore(self.last_defined, self.names.clone(), self.live.clone());
        registry.ensure_known(&self.live)?;

        let mut atomization = Vec::with_capacity(self.atoms.len());
        for record in &self.atoms {
            if record.ucs.is_empty() {
                return Err(EngineError::invariant("zero atom in snapshot"));
            }
            registry.ensure_known(&record.ucs)?;
            let mut atom = Atom::new(record.ucs.clone(), self.epoch, record.gen);
            atom.g = record.g;
            atomization.push(atom);
        }

        Ok(Model {
            epoch: self.epoch,
            generation: self.generation,
            registry,
            atomization,
        })
    }

    /// Serialize to canonical JSON bytes.
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        to_canonical_bytes(self)
    }
}
