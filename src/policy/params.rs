//! Crossing parameters.
//!
//! ## Float Normalization for Deterministic Hashing
//!
//! Floats are quantized to integers before hashing (multiplied by 1e6 and
//! rounded to i64), so a configuration hashes identically regardless of
//! float formatting.

use serde::{Deserialize, Serialize};

use super::Strictness;
use crate::canonical::canonical_hash_hex;
use crate::error::{EngineError, Result};
use crate::DEFAULT_PARAMS_VERSION;

/// Quantization factor for float normalization.
const FLOAT_QUANTIZATION_FACTOR: f64 = 1_000_000.0;

fn quantize_float(value: f32) -> i64 {
    ((value as f64) * FLOAT_QUANTIZATION_FACTOR).round() as i64
}

/// Parameters of the full crossing engine.
///
/// ## Parameters
///
/// - `calculate_redundancy`: run a redundancy pass after every crossing step
/// - `remove_repetitions`: deduplicate after every crossing step
/// - `sort_duples`: reorder pending duples by solvability before each step
/// - `binary`: cross only with singleton right atoms (see below)
/// - `reduction_batch`: product count triggering an in-step reduction
///
/// `binary` is only valid for embeddings where every duple has the same
/// single-constant left side, as in binary classification. It is never
/// enabled implicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullCrossingParams {
    /// Parameter set version.
    pub version: String,
    /// Redundancy pass after every crossing step.
    pub calculate_redundancy: bool,
    /// Deduplicate after every crossing step.
    pub remove_repetitions: bool,
    /// Sort pending duples by solvability.
    pub sort_duples: bool,
    /// Restrict the right side to singleton atoms.
    pub binary: bool,
    /// Product count triggering an intermediate reduction.
    pub reduction_batch: usize,
    /// Inconsistency handling.
    pub strictness: Strictness,
}

impl Default for FullCrossingParams {
    fn default() -> Self {
        Self {
            version: DEFAULT_PARAMS_VERSION.to_string(),
            calculate_redundancy: false,
            remove_repetitions: false,
            sort_duples: false,
            binary: false,
            reduction_batch: 1_000_000,
            strictness: Strictness::Raise,
        }
    }
}

impl FullCrossingParams {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.reduction_batch == 0 {
            return Err(EngineError::Configuration(
                "reduction_batch must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Deterministic hash of the parameters.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(self)
    }
}

/// Parameters of the sparse crossing engine.
///
/// ## Parameters
///
/// - `reduction_by_traces`: simplify the atomization through stored traces
/// - `use_simplify_from_terms`: simplify against every term instead of
///   every training constant (requires `reduction_by_traces`)
/// - `segregate_by_generation`: advance the model generation on each batch
/// - `enforce_trace_constraints`: seed atoms by trace closure; when off, a
///   fresh singleton is seeded for every constant on every batch
/// - `by_quotient`: repair negative duples with quotient atoms first
///   (requires `enforce_trace_constraints`)
/// - `store_positives`: carry crossed positives over to the next batch
/// - `use_reduce_indicators`: shrink indicators beyond the useful ones
/// - `negative_indicator_threshold`: below this fraction of plain indicators
///   the union model is thinned further for pinning (`None` disables)
/// - `static_constants`: never retire constants
/// - `simplify_threshold`: growth factor of the atomization triggering an
///   intermediate simplification
/// - `ignore_single_const_ucs`: measure growth on non-singleton atoms only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseCrossingParams {
    /// Parameter set version.
    pub version: String,
    /// Deduplicate after every crossing step.
    pub remove_repetitions: bool,
    /// Simplify through stored traces.
    pub reduction_by_traces: bool,
    /// Simplify against the term space.
    pub use_simplify_from_terms: bool,
    /// Advance the generation on each batch.
    pub segregate_by_generation: bool,
    /// Seed atoms by trace closure.
    pub enforce_trace_constraints: bool,
    /// Quotient repair of negative duples.
    pub by_quotient: bool,
    /// Keep crossed positives for the next batch.
    pub store_positives: bool,
    /// Reduce indicators beyond the useful ones.
    pub use_reduce_indicators: bool,
    /// Plain-indicator fraction threshold.
    pub negative_indicator_threshold: Option<f32>,
    /// Never retire constants.
    pub static_constants: bool,
    /// Growth factor triggering simplification.
    pub simplify_threshold: f32,
    /// Ignore singleton atoms when measuring growth.
    pub ignore_single_const_ucs: bool,
    /// Re-validate term traces against free traces.
    pub check_stored_traces: bool,
    /// Inconsistency handling.
    pub strictness: Strictness,
}

impl Default for SparseCrossingParams {
    fn default() -> Self {
        Self {
            version: DEFAULT_PARAMS_VERSION.to_string(),
            remove_repetitions: false,
            reduction_by_traces: true,
            use_simplify_from_terms: false,
            segregate_by_generation: true,
            enforce_trace_constraints: true,
            by_quotient: false,
            store_positives: true,
            use_reduce_indicators: false,
            negative_indicator_threshold: Some(0.1),
            static_constants: false,
            simplify_threshold: 1.5,
            ignore_single_const_ucs: true,
            check_stored_traces: false,
            strictness: Strictness::Raise,
        }
    }
}

/// Quantized sparse parameters for deterministic hashing.
#[derive(Serialize)]
struct QuantizedSparseParams<'a> {
    version: &'a str,
    remove_repetitions: bool,
    reduction_by_traces: bool,
    use_simplify_from_terms: bool,
    segregate_by_generation: bool,
    enforce_trace_constraints: bool,
    by_quotient: bool,
    store_positives: bool,
    use_reduce_indicators: bool,
    negative_indicator_threshold: Option<i64>,
    static_constants: bool,
    simplify_threshold: i64,
    ignore_single_const_ucs: bool,
    check_stored_traces: bool,
    strictness: Strictness,
}

impl SparseCrossingParams {
    /// Check ranges and parameter combinations.
    pub fn validate(&self) -> Result<()> {
        if !self.simplify_threshold.is_finite() || self.simplify_threshold < 1.0 {
            return Err(EngineError::Configuration(format!(
                "simplify_threshold must be a finite factor >= 1.0, got {}",
                self.simplify_threshold
            )));
        }
        if let Some(threshold) = self.negative_indicator_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(EngineError::Configuration(format!(
                    "negative_indicator_threshold must lie in [0, 1], got {}",
                    threshold
                )));
            }
        }
        if self.use_simplify_from_terms && !self.reduction_by_traces {
            return Err(EngineError::Configuration(
                "use_simplify_from_terms requires reduction_by_traces".to_string(),
            ));
        }
        if self.by_quotient && !self.enforce_trace_constraints {
            return Err(EngineError::Configuration(
                "by_quotient requires enforce_trace_constraints".to_string(),
            ));
        }
        Ok(())
    }

    /// Deterministic hash of the parameters.
    ///
    /// Floats are quantized first, so the hash does not depend on float
    /// formatting.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(&self.to_quantized())
    }

    fn to_quantized(&self) -> QuantizedSparseParams<'_> {
        QuantizedSparseParams {
            version: &self.version,
            remove_repetitions: self.remove_repetitions,
            reduction_by_traces: self.reduction_by_traces,
            use_simplify_from_terms: self.use_simplify_from_terms,
            segregate_by_generation: self.segregate_by_generation,
            enforce_trace_constraints: self.enforce_trace_constraints,
            by_quotient: self.by_quotient,
            store_positives: self.store_positives,
            use_reduce_indicators: self.use_reduce_indicators,
            negative_indicator_threshold: self.negative_indicator_threshold.map(quantize_float),
            static_constants: self.static_constants,
            simplify_threshold: quantize_float(self.simplify_threshold),
            ignore_single_const_ucs: self.ignore_single_const_ucs,
            check_stored_traces: self.check_stored_traces,
            strictness: self.strictness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(FullCrossingParams::default().validate().is_ok());
        assert!(SparseCrossingParams::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_combinations() {
        let mut p = SparseCrossingParams::default();
        p.reduction_by_traces = false;
        p.use_simplify_from_terms = true;
        assert!(matches!(p.validate(), Err(EngineError::Configuration(_))));

        let mut p = SparseCrossingParams::default();
        p.enforce_trace_constraints = false;
        p.by_quotient = true;
        assert!(p.validate().is_err());

        let mut p = SparseCrossingParams::default();
        p.simplify_threshold = 0.5;
        assert!(p.validate().is_err());

        let mut p = SparseCrossingParams::default();
        p.negative_indicator_threshold = Some(1.5);
        assert!(p.validate().is_err());

        let mut p = FullCrossingParams::default();
        p.reduction_batch = 0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_params_hash_determinism() {
        assert_eq!(
            SparseCrossingParams::default().params_hash(),
            SparseCrossingParams::default().params_hash()
        );
        assert_eq!(
            FullCrossingParams::default().params_hash(),
            FullCrossingParams::default().params_hash()
        );
    }

    #[test]
    fn test_params_hash_changes() {
        let p1 = SparseCrossingParams::default();
        let mut p2 = SparseCrossingParams::default();
        p2.simplify_threshold = 2.0;
        assert_ne!(p1.params_hash(), p2.params_hash());

        let mut p3 = SparseCrossingParams::default();
        p3.negative_indicator_threshold = None;
        assert_ne!(p1.params_hash(), p3.params_hash());
    }

    #[test]
    fn test_params_hash_ignores_float_noise() {
        let mut p1 = SparseCrossingParams::default();
        let mut p2 = SparseCrossingParams::default();
        p1.simplify_threshold = 1.5;
        p2.simplify_threshold = 1.500_000_1;
        assert_eq!(p1.params_hash(), p2.params_hash());
    }
}
