//! Constant registry.
//!
//! Constants are allocated sequentially from zero. A constant may carry a
//! name supplied by the embedding; names map both ways. The registry also
//! tracks the *live* set: constants that are still referenced somewhere in the
//! model. Retirement only shrinks the live set; ids are never reused.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::atom::Atom;
use super::duple::Duple;
use super::segment::{Constant, Segment};

/// Errors raised by the constant registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The name is already bound to another constant.
    #[error("Constant name '{name}' already bound to {existing}")]
    DuplicateName {
        /// Rejected name.
        name: String,
        /// Constant already holding the name.
        existing: Constant,
    },
    /// A constant id beyond the last allocated one was referenced.
    #[error("Unknown constant {constant} (last defined: {last_defined:?})")]
    UnknownConstant {
        /// Offending constant.
        constant: Constant,
        /// Highest allocated id, if any.
        last_defined: Option<Constant>,
    },
}

/// Allocates constants and keeps the name map and live set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantRegistry {
    last_defined: Option<Constant>,
    by_name: BTreeMap<String, Constant>,
    names: BTreeMap<Constant, String>,
    live: Segment,
}

impl ConstantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh unnamed constant.
    pub fn new_constant(&mut self) -> Constant {
        let c = self.last_defined.map_or(0, |last| last + 1);
        self.last_defined = Some(c);
        self.live.insert(c);
        c
    }

    /// Allocate a fresh constant bound to `name`.
    pub fn new_named(&mut self, name: impl Into<String>) -> Result<Constant, RegistryError> {
        let name = name.into();
        if let Some(&existing) = self.by_name.get(&name) {
            return Err(RegistryError::DuplicateName { name, existing });
        }
        let c = self.new_constant();
        self.names.insert(c, name.clone());
        self.by_name.insert(name, c);
        Ok(c)
    }

    /// Allocate `n` unnamed constants and return them as a segment.
    pub fn new_constants(&mut self, n: usize) -> Segment {
        (0..n).map(|_| self.new_constant()).collect()
    }

    /// Constant bound to `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<Constant> {
        self.by_name.get(name).copied()
    }

    /// Name of `c`, if it has one.
    pub fn name_of(&self, c: Constant) -> Option<&str> {
        self.names.get(&c).map(String::as_str)
    }

    /// Highest allocated id.
    pub fn last_defined(&self) -> Option<Constant> {
        self.last_defined
    }

    /// Constants still referenced by the model.
    pub fn live(&self) -> &Segment {
        &self.live
    }

    /// Number of allocated constants, live or retired.
    pub fn allocated(&self) -> usize {
        self.last_defined.map_or(0, |last| last as usize + 1)
    }

    /// Name map in id order.
    pub fn names(&self) -> &BTreeMap<Constant, String> {
        &self.names
    }

    /// Fail if any constant of `segment` was never allocated.
    pub fn ensure_known(&self, segment: &Segment) -> Result<(), RegistryError> {
        match (segment.max(), self.last_defined) {
            (None, _) => Ok(()),
            (Some(max), Some(last)) if max <= last => Ok(()),
            (Some(max), last_defined) => Err(RegistryError::UnknownConstant {
                constant: max,
                last_defined,
            }),
        }
    }

    /// Shrink the live set to constants still referenced by `atoms`,
    /// `union_model` or `duples`. Returns the retired constants.
    pub fn retire_unused<'a>(
        &mut self,
        atoms: impl IntoIterator<Item = &'a Atom>,
        union_model: impl IntoIterator<Item = &'a Atom>,
        duples: impl IntoIterator<Item = &'a Duple>,
    ) -> Segment {
        let mut standing = Segment::new();
        for atom in atoms.into_iter().chain(union_model) {
            standing.union_with(atom.ucs());
        }
        for duple in duples {
            standing.union_with(&duple.left);
            standing.union_with(&duple.right);
        }

        let retired = self.live.difference(&standing);
        info!(
            standing = standing.len(),
            retiring = retired.len(),
            "Removing unused constants"
        );
        if !retired.is_empty() {
            self.live.intersect_with(&standing);
        }
        retired
    }

    /// Render a term with constant names; unnamed constants print as `c!`.
    pub fn interpret(&self, term: &Segment) -> Vec<String> {
        term.iter()
            .map(|c| match self.names.get(&c) {
                Some(name) => name.clone(),
                None => format!("{}!", c),
            })
            .collect()
    }

    pub(crate) fn restore(
        last_defined: Option<Constant>,
        names: BTreeMap<Constant, String>,
        live: Segment,
    ) -> Self {
        let by_name = names.iter().map(|(c, n)| (n.clone(), *c)).collect();
        Self {
            last_defined,
            by_name,
            names,
            live,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_allocation() {
        let mut reg = ConstantRegistry::new();
        assert_eq!(reg.new_constant(), 0);
        assert_eq!(reg.new_constant(), 1);
        assert_eq!(reg.new_named("x").unwrap(), 2);
        assert_eq!(reg.last_defined(), Some(2));
        assert_eq!(reg.allocated(), 3);
        assert_eq!(reg.live(), &Segment::from([0, 1, 2]));
    }

    #[test]
    fn test_names_both_ways() {
        let mut reg = ConstantRegistry::new();
        let a = reg.new_named("alpha").unwrap();
        let b = reg.new_constant();

        assert_eq!(reg.lookup("alpha"), Some(a));
        assert_eq!(reg.name_of(a), Some("alpha"));
        assert_eq!(reg.name_of(b), None);
        assert_eq!(reg.interpret(&Segment::from([a, b])), vec!["alpha", "1!"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut reg = ConstantRegistry::new();
        reg.new_named("x").unwrap();
        let err = reg.new_named("x").unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateName {
                name: "x".to_string(),
                existing: 0
            }
        );
        // Failed registration allocates nothing
        assert_eq!(reg.allocated(), 1);
    }

    #[test]
    fn test_ensure_known() {
        let mut reg = ConstantRegistry::new();
        assert!(reg.ensure_known(&Segment::new()).is_ok());
        assert!(reg.ensure_known(&Segment::from([0])).is_err());

        reg.new_constants(3);
        assert!(reg.ensure_known(&Segment::from([0, 2])).is_ok());
        assert!(matches!(
            reg.ensure_known(&Segment::from([1, 5])),
            Err(RegistryError::UnknownConstant { constant: 5, .. })
        ));
    }

    #[test]
    fn test_retire_unused() {
        let mut reg = ConstantRegistry::new();
        reg.new_constants(5);

        let atoms = vec![Atom::new(Segment::from([0, 1]), 0, 0)];
        let union = vec![Atom::new(Segment::from([2]), 0, 0)];
        let duples = vec![Duple::positive(Segment::from([3]), Segment::from([3]))];

        let retired = reg.retire_unused(&atoms, &union, &duples);
        assert_eq!(retired, Segment::from([4]));
        assert_eq!(reg.live(), &Segment::from([0, 1, 2, 3]));

        // Ids are never reused
        assert_eq!(reg.new_constant(), 5);
    }
}
