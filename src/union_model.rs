//! Cross-batch union model.
//!
//! The union model accumulates copies of every atomization produced by the
//! sparse engine. It is a reference independent of atomization compaction:
//! evaluation queries it, and its atoms pin traces of later batches.
//!
//! Each update call bumps the update counter. Atoms are stamped with the
//! counter value at which they entered; duples remember the last update that
//! enforced them. An atom only has to be checked against duples enforced
//! before it entered.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::error::{EngineError, Result};
use crate::reduction::remove_repeated;
use crate::types::{Atom, AtomId, Duple};

/// Partition of the union model produced by an update.
#[derive(Debug, Clone, Default)]
pub struct UnionUpdate {
    /// Atoms kept and usable for pinning.
    pub kept: usize,
    /// Atoms kept but violating a hypothesis duple; not used for pinning.
    pub excluded: HashSet<AtomId>,
    /// Atoms violating a non-hypothesis duple, removed.
    pub deleted: Vec<Atom>,
}

impl UnionUpdate {
    /// Number of atoms accounted for.
    pub fn total(&self) -> usize {
        self.kept + self.excluded.len() + self.deleted.len()
    }
}

/// Append-mostly atom list maintained across batches.
#[derive(Debug, Clone, Default)]
pub struct UnionModel {
    atoms: Vec<Atom>,
    updates: u64,
    refresh_with_stored: bool,
}

impl UnionModel {
    /// Create an empty union model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current atoms.
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Number of atoms.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Whether the union model holds no atom.
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Update counter.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Remove atoms contradicting positive duples enforced since they
    /// entered.
    ///
    /// Unstamped atoms are stamped with the new counter value. Duples are
    /// visited by increasing last update; for each atom the walk stops at
    /// the first duple enforced after the atom entered. An atom intersecting
    /// `L` and disjoint from `R` is deleted, or only excluded from pinning
    /// when the duple is a hypothesis. Non-hypothesis duples are then
    /// stamped with the counter.
    pub fn update_with_positive_duples<'a>(
        &mut self,
        duples: impl IntoIterator<Item = &'a mut Duple>,
    ) -> Result<UnionUpdate> {
        let prior = self.atoms.len();
        self.updates += 1;
        info!(size = prior, update = self.updates, "Updating union model");

        let mut sorted: Vec<&mut Duple> = duples.into_iter().collect();
        sorted.sort_by_key(|d| d.last_union_update);

        let mut update = UnionUpdate::default();
        let mut retained = Vec::with_capacity(prior);
        for mut at in std::mem::take(&mut self.atoms) {
            let entrance = *at.union_entrance.get_or_insert(self.updates);

            let mut verdict = None;
            for duple in sorted.iter() {
                if duple.last_union_update.is_some_and(|last| entrance <= last) {
                    break;
                }
                if at.ucs().intersects(&duple.left) && at.ucs().is_disjoint(&duple.right) {
                    verdict = Some(duple.hypothesis);
                    break;
                }
            }

            match verdict {
                Some(false) => update.deleted.push(at),
                Some(true) => {
                    update.excluded.insert(at.id());
                    retained.push(at);
                }
                None => {
                    update.kept += 1;
                    retained.push(at);
                }
            }
        }
        self.atoms = retained;

        for duple in sorted {
            if !duple.hypothesis {
                duple.last_union_update = Some(self.updates);
            }
        }

        if update.total() != prior {
            return Err(EngineError::invariant(format!(
                "union model partition {} + {} + {} does not add up to {}",
                update.kept,
                update.excluded.len(),
                update.deleted.len(),
                prior
            )));
        }
        info!(
            kept = update.kept,
            excluded = update.excluded.len(),
            deleted = update.deleted.len(),
            "Union model updated"
        );
        Ok(update)
    }

    /// Append divergent copies of `atoms`, stamped with the current counter,
    /// and deduplicate.
    pub fn append_batch(&mut self, atoms: &[Atom]) {
        for at in atoms {
            let mut copy = at.duplicate();
            copy.union_entrance = Some(self.updates);
            self.atoms.push(copy);
        }
        self.atoms = remove_repeated(std::mem::take(&mut self.atoms));
    }

    /// Append atoms produced outside the engine. The next update is checked
    /// against every stored positive duple, not only stored hypotheses.
    pub fn extend_external(&mut self, atoms: impl IntoIterator<Item = Atom>) {
        self.atoms.extend(atoms);
        self.atoms = remove_repeated(std::mem::take(&mut self.atoms));
        self.refresh_with_stored = true;
    }

    /// Read and clear the external-extension flag.
    pub(crate) fn take_refresh_flag(&mut self) -> bool {
        std::mem::take(&mut self.refresh_with_stored)
    }

    /// Atoms usable for pinning, shuffled.
    ///
    /// Excluded atoms are skipped. With a positive `fraction`, singleton atoms
    /// are always taken and every other atom with probability
    /// `1 / (fraction + 1)`.
    pub fn pinning_candidates<R: Rng + ?Sized>(
        &self,
        excluded: &HashSet<AtomId>,
        fraction: u32,
        rng: &mut R,
    ) -> Vec<Atom> {
        let mut out: Vec<Atom> = Vec::with_capacity(self.atoms.len());
        for at in &self.atoms {
            if excluded.contains(&at.id()) {
                continue;
            }
            if fraction == 0 || at.is_singleton() || rng.random_range(0..=fraction) == 0 {
                out.push(at.clone());
            }
        }
        out.shuffle(rng);
        out
    }
}
