//! Error kinds surfaced by the kernel.
//!
//! | Kind | Meaning | Recovery |
//! |------|---------|----------|
//! | `LogicalInconsistency` | no atomization satisfies the duple set | halt batch, diagnose inputs |
//! | `InvariantViolation` | internal defect (cache, partition, zero atom) | none |
//! | `Configuration` | invalid parameter combination | fix params |
//! | `Registry` | unknown constant or duplicate name | fix embedding |
//!
//! Non-strict code paths report inconsistencies through flags on their
//! report structs instead of returning `LogicalInconsistency`.

use crate::types::constant::RegistryError;

/// Error type for kernel operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The enforced duples cannot be satisfied simultaneously.
    #[error("Logical inconsistency in {stage}: {detail}")]
    LogicalInconsistency {
        /// Operation that detected the inconsistency.
        stage: &'static str,
        /// Human readable description of the offending duple.
        detail: String,
    },
    /// An internal invariant was broken.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    /// Invalid parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Constant registry error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl EngineError {
    /// Create a logical inconsistency error.
    pub fn inconsistent(stage: &'static str, detail: impl Into<String>) -> Self {
        Self::LogicalInconsistency {
            stage,
            detail: detail.into(),
        }
    }

    /// Create an invariant violation error.
    pub fn invariant(detail: impl Into<String>) -> Self {
        Self::InvariantViolation(detail.into())
    }

    /// Whether this error reports unsatisfiable input rather than a defect.
    pub fn is_inconsistency(&self) -> bool {
        matches!(self, Self::LogicalInconsistency { .. })
    }
}

/// Result alias for kernel operations.
pub type Result<T> = std::result::Result<T, EngineError>;
