//! The learned model: registry, atomization and step counters.

use crate::types::{Atom, Atomization, ConstantRegistry, Segment};

/// A symbolic model.
///
/// `epoch` advances on every crossing step, `generation` on every sparse
/// batch that seeds atoms.
#[derive(Debug, Clone, Default)]
pub struct Model {
    /// Crossing step counter.
    pub epoch: u64,
    /// Batch generation counter.
    pub generation: u64,
    /// Constant registry.
    pub registry: ConstantRegistry,
    /// Current atoms.
    pub atomization: Atomization,
}

impl Model {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a model with `n` fresh constants and one singleton atom each.
    pub fn with_constants(n: usize) -> Self {
        let mut model = Self::new();
        let constants = model.registry.new_constants(n);
        model.seed_singletons(&constants);
        model
    }

    /// Append a singleton atom for each constant of `constants`.
    pub fn seed_singletons(&mut self, constants: &Segment) {
        for c in constants {
            self.atomization
                .push(Atom::singleton(c, self.epoch, self.generation));
        }
    }

    /// Live constants of the registry.
    pub fn constants(&self) -> &Segment {
        self.registry.live()
    }

    /// Whether `left ≤ right` holds in the current atomization.
    pub fn lower_or_equal(&self, left: &Segment, right: &Segment) -> bool {
        crate::query::lower_or_equal(left, right, &self.atomization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_constants() {
        let model = Model::with_constants(3);
        assert_eq!(model.atomization.len(), 3);
        assert_eq!(model.constants(), &Segment::full(3));
        assert!(model.atomization.iter().all(Atom::is_singleton));
        assert!(!model.lower_or_equal(&Segment::from([0]), &Segment::from([1])));
    }
}
