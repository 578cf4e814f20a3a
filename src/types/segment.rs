//! Constant segments: value-semantics sets of small integers.
//!
//! A `Segment` is used in three roles that share one representation:
//!
//! - **upper**: the constant segment describing an atom
//! - **lower**: a term being tested against the atomization
//! - **generic**: any other set of constants (indicator sets, traces)
//!
//! The backend is a compressed roaring bitmap, so union, intersection,
//! difference, subset and disjointness cost is proportional to the number of
//! occupied containers rather than to the largest constant id.

use std::fmt;
use std::hash::{Hash, Hasher};

use rand::Rng;
use roaring::RoaringBitmap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use xxhash_rust::xxh64::Xxh64;

/// Integer identifier of a constant.
pub type Constant = u32;

/// A set of constants.
#[derive(Clone, Default)]
pub struct Segment(RoaringBitmap);

impl Segment {
    /// Create an empty segment.
    pub fn new() -> Self {
        Self(RoaringBitmap::new())
    }

    /// Create a segment holding one constant.
    pub fn singleton(c: Constant) -> Self {
        let mut bitmap = RoaringBitmap::new();
        bitmap.insert(c);
        Self(bitmap)
    }

    /// Create the segment `{0, 1, ..., n - 1}`, capped at `u32::MAX`
    /// constants.
    pub fn full(n: usize) -> Self {
        let mut bitmap = RoaringBitmap::new();
        bitmap.insert_range(0..capped(n));
        Self(bitmap)
    }

    /// Number of constants.
    pub fn len(&self) -> usize {
        self.0.len() as usize
    }

    /// Whether the segment has no constants.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Membership test.
    pub fn contains(&self, c: Constant) -> bool {
        self.0.contains(c)
    }

    /// Insert a constant. Returns `true` if it was not present.
    pub fn insert(&mut self, c: Constant) -> bool {
        self.0.insert(c)
    }

    /// Remove a constant. Returns `true` if it was present.
    pub fn remove(&mut self, c: Constant) -> bool {
        self.0.remove(c)
    }

    /// Smallest constant, if any.
    pub fn min(&self) -> Option<Constant> {
        self.0.min()
    }

    /// Largest constant, if any.
    pub fn max(&self) -> Option<Constant> {
        self.0.max()
    }

    /// Iterate constants in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Constant> + '_ {
        self.0.iter()
    }

    /// `self ∪ other` as a new segment.
    pub fn union(&self, other: &Segment) -> Segment {
        Segment(&self.0 | &other.0)
    }

    /// `self ∩ other` as a new segment.
    pub fn intersection(&self, other: &Segment) -> Segment {
        Segment(&self.0 & &other.0)
    }

    /// `self ∖ other` as a new segment.
    pub fn difference(&self, other: &Segment) -> Segment {
        Segment(&self.0 - &other.0)
    }

    /// In-place union.
    pub fn union_with(&mut self, other: &Segment) {
        self.0 |= &other.0;
    }

    /// In-place intersection.
    pub fn intersect_with(&mut self, other: &Segment) {
        self.0 &= &other.0;
    }

    /// In-place difference.
    pub fn difference_with(&mut self, other: &Segment) {
        self.0 -= &other.0;
    }

    /// Whether every constant of `self` is in `other`.
    pub fn is_subset(&self, other: &Segment) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Whether `self` and `other` share no constant.
    pub fn is_disjoint(&self, other: &Segment) -> bool {
        self.0.is_disjoint(&other.0)
    }

    /// Whether `self` and `other` share at least one constant.
    pub fn intersects(&self, other: &Segment) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    /// `|self ∩ other|` without materializing the intersection.
    pub fn intersection_len(&self, other: &Segment) -> usize {
        self.0.intersection_len(&other.0) as usize
    }

    /// The `n`-th smallest constant.
    pub fn nth(&self, n: usize) -> Option<Constant> {
        u32::try_from(n).ok().and_then(|n| self.0.select(n))
    }

    /// Pick a uniformly random constant.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Constant> {
        if self.is_empty() {
            return None;
        }
        self.nth(rng.random_range(0..self.len()))
    }

    /// Content hash (xxh64 over the sorted constants).
    ///
    /// Equal segments always produce equal hashes.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = Xxh64::new(0);
        hasher.write_u64(self.0.len());
        for c in self.0.iter() {
            hasher.write_u32(c);
        }
        hasher.finish()
    }

    /// Constants as a sorted vector.
    pub fn to_vec(&self) -> Vec<Constant> {
        self.0.iter().collect()
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Segment {}

impl Hash for Segment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.content_hash());
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<Constant> for Segment {
    fn from_iter<I: IntoIterator<Item = Constant>>(iter: I) -> Self {
        Segment(iter.into_iter().collect())
    }
}

impl Extend<Constant> for Segment {
    fn extend<I: IntoIterator<Item = Constant>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl<const N: usize> From<[Constant; N]> for Segment {
    fn from(constants: [Constant; N]) -> Self {
        constants.into_iter().collect()
    }
}

impl From<&[Constant]> for Segment {
    fn from(constants: &[Constant]) -> Self {
        constants.iter().copied().collect()
    }
}

impl<'a> IntoIterator for &'a Segment {
    type Item = Constant;
    type IntoIter = roaring::bitmap::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// Serialized as a sorted sequence of constants so snapshots stay readable and
// independent of the bitmap container layout.
impl Serialize for Segment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for Segment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let constants = Vec::<Constant>::deserialize(deserializer)?;
        Ok(constants.into_iter().collect())
    }
}

fn capped(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_algebra() {
        let a = Segment::from([1, 2, 3]);
        let b = Segment::from([3, 4]);

        assert_eq!(a.union(&b), Segment::from([1, 2, 3, 4]));
        assert_eq!(a.intersection(&b), Segment::from([3]));
        assert_eq!(a.difference(&b), Segment::from([1, 2]));
        assert_eq!(a.intersection_len(&b), 1);
    }

    #[test]
    fn test_in_place_ops_match_value_ops() {
        let a = Segment::from([0, 5, 9, 70_000]);
        let b = Segment::from([5, 6, 70_000]);

        let mut u = a.clone();
        u.union_with(&b);
        assert_eq!(u, a.union(&b));

        let mut i = a.clone();
        i.intersect_with(&b);
        assert_eq!(i, a.intersection(&b));

        let mut d = a.clone();
        d.difference_with(&b);
        assert_eq!(d, a.difference(&b));

        // The original is untouched by value ops
        assert_eq!(a, Segment::from([0, 5, 9, 70_000]));
    }

    #[test]
    fn test_subset_and_disjoint() {
        let a = Segment::from([1, 2]);
        let b = Segment::from([1, 2, 3]);
        let c = Segment::from([7]);

        assert!(a.is_subset(&b));
        assert!(!b.is_subset(&a));
        assert!(a.is_disjoint(&c));
        assert!(a.intersects(&b));
        assert!(Segment::new().is_subset(&c));
        assert!(Segment::new().is_disjoint(&Segment::new()));
    }

    #[test]
    fn test_full() {
        let f = Segment::full(4);
        assert_eq!(f, Segment::from([0, 1, 2, 3]));
        assert!(Segment::full(0).is_empty());
        assert_eq!(capped(7), 7);
        assert_eq!(capped(u32::MAX as usize), u32::MAX);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(capped(u32::MAX as usize + 5), u32::MAX);
    }

    #[test]
    fn test_equal_content_equal_hash() {
        let a: Segment = [3, 1, 2].into_iter().collect();
        let b = Segment::from([1, 2, 3]);

        assert_eq!(a, b);
        assert_eq!(a.content_hash(), b.content_hash());

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_nth_and_choose() {
        let s = Segment::from([10, 20, 30]);
        assert_eq!(s.nth(0), Some(10));
        assert_eq!(s.nth(2), Some(30));
        assert_eq!(s.nth(3), None);

        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            let c = s.choose(&mut rng).unwrap();
            assert!(s.contains(c));
        }
        assert_eq!(Segment::new().choose(&mut rng), None);
    }

    #[test]
    fn test_serde_as_sequence() {
        let s = Segment::from([4, 1]);
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, "[1,4]");

        let back: Segment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_display() {
        assert_eq!(Segment::from([2, 1]).to_string(), "{1, 2}");
        assert_eq!(Segment::new().to_string(), "{}");
    }
}
