//! Duples: inclusion and exclusion constraints between two terms.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::segment::Segment;

/// A constraint `left ≤ right` (positive) or `left ≰ right` (negative).
///
/// `region` groups duples for bookkeeping; region 0 duples are enforced but
/// never counted or stored across batches. Hypothesis duples are enforced
/// only when they do not conflict with the rest of the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duple {
    /// Left term.
    pub left: Segment,
    /// Right term.
    pub right: Segment,
    /// Inclusion (`true`) or exclusion (`false`).
    pub positive: bool,
    /// Generation at which the duple was created.
    pub generation: u64,
    /// Grouping tag.
    pub region: u32,
    /// Best-effort duple.
    pub hypothesis: bool,
    #[serde(skip)]
    pub(crate) last_union_update: Option<u64>,
}

impl Duple {
    /// Create a duple in region 1, generation 0.
    pub fn new(left: Segment, right: Segment, positive: bool) -> Self {
        Self {
            left,
            right,
            positive,
            generation: 0,
            region: 1,
            hypothesis: false,
            last_union_update: None,
        }
    }

    /// Create an inclusion constraint.
    pub fn positive(left: Segment, right: Segment) -> Self {
        Self::new(left, right, true)
    }

    /// Create an exclusion constraint.
    pub fn negative(left: Segment, right: Segment) -> Self {
        Self::new(left, right, false)
    }

    /// Set the generation.
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Set the region.
    pub fn with_region(mut self, region: u32) -> Self {
        self.region = region;
        self
    }

    /// Mark as hypothesis.
    pub fn as_hypothesis(mut self) -> Self {
        self.hypothesis = true;
        self
    }

    /// Union model update counter at which this duple last pruned the union
    /// model.
    pub fn last_union_update(&self) -> Option<u64> {
        self.last_union_update
    }
}

impl fmt::Display for Duple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = if self.positive { "<=" } else { "!<=" };
        write!(
            f,
            "{} {} {} (gen {}, region {}{})",
            self.left,
            op,
            self.right,
            self.generation,
            self.region,
            if self.hypothesis { ", hypothesis" } else { "" }
        )
    }
}
